//! Events observable by upload listeners

use super::{AttemptError, UploadSuccess};
use crate::transport::{TransferProgress, TransportResponse};

/// Something that happened to a single chunk
#[derive(Debug, Clone)]
pub enum ChunkEvent {
    /// Body progress of the current attempt
    Progress(TransferProgress),

    /// An attempt failed; a retry may follow
    AttemptError { attempt: u32, error: AttemptError },

    /// The attempt budget is spent
    PermanentFailure { attempts: u32, error: AttemptError },

    /// The endpoint accepted the chunk
    Success(TransportResponse),

    /// Fired after `Success` or `PermanentFailure`
    Complete,
}

/// Aggregate byte progress of a session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionProgress {
    pub loaded: u64,
    pub total: u64,
    /// `loaded / total`
    pub fraction: f64,
}

impl SessionProgress {
    pub fn new(loaded: u64, total: u64) -> Self {
        let fraction = if total == 0 {
            0.0
        } else {
            loaded as f64 / total as f64
        };
        Self {
            loaded,
            total,
            fraction,
        }
    }
}

/// Event delivered to listeners registered with
/// [`ChunkedUploader::on_event`](super::ChunkedUploader::on_event)
#[derive(Debug, Clone)]
pub enum UploadEvent {
    Chunk { index: usize, event: ChunkEvent },
    Progress(SessionProgress),
    Success(UploadSuccess),
    Failure {
        index: usize,
        attempts: u32,
        error: AttemptError,
    },
}

/// Listener callback. Runs on the session task, in registration order.
pub type EventListener = Box<dyn Fn(&UploadEvent) + Send + 'static>;
