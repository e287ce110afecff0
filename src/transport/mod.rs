//! Transport module
//!
//! The HTTP collaborator that carries one chunk per request. The upload
//! coordinator only depends on the [`Transport`] trait; [`HttpTransport`]
//! is the `reqwest` implementation used outside of tests.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod http;

pub use http::HttpTransport;

/// Transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Response error: {0}")]
    ResponseError(String),
}

/// Progress of one in-flight request body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes of the chunk handed to the connection so far
    pub loaded: u64,
    /// Size of the chunk body
    pub total: u64,
    /// Whether `loaded` is byte-accurate
    pub length_computable: bool,
}

/// One chunk request, fully described
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Chunk bytes, sent as the multipart `file` part
    pub body: Bytes,
    pub file_name: String,
    pub content_type: Option<String>,
    /// Extra multipart fields
    pub fields: Arc<BTreeMap<String, String>>,
}

impl ChunkRequest {
    /// Look up a header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Response from the receiving endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

impl TransportResponse {
    /// Create a response with an empty body
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            body: Bytes::new(),
        }
    }

    /// Any status below 300 is accepted
    pub fn is_success(&self) -> bool {
        self.status < 300
    }
}

/// Sink for body progress updates
///
/// Cheap to clone; every clone feeds the same destination.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<dyn Fn(TransferProgress) + Send + Sync>,
}

impl ProgressReporter {
    /// Wrap a callback
    pub fn new<F>(sink: F) -> Self
    where
        F: Fn(TransferProgress) + Send + Sync + 'static,
    {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// A reporter that discards every update
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Forward one progress update
    pub fn report(&self, progress: TransferProgress) {
        (self.sink)(progress)
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter").finish_non_exhaustive()
    }
}

/// Sends a single chunk request
///
/// Dropping the returned future aborts the request.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: ChunkRequest,
        progress: ProgressReporter,
    ) -> Result<TransportResponse, TransportError>;
}
