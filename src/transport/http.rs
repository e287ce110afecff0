//! reqwest-backed transport
//!
//! Sends each chunk as a `multipart/form-data` body. The chunk bytes are
//! streamed in slices so the transport can report byte-granular progress.

use super::{
    ChunkRequest, ProgressReporter, TransferProgress, Transport, TransportError, TransportResponse,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream};
use reqwest::multipart::{Form, Part};
use std::time::Duration;

/// Size of the slices the chunk body is streamed in (64 KiB)
pub const PROGRESS_SLICE_SIZE: usize = 64 * 1024;

/// Name of the multipart field carrying the chunk bytes
pub const FILE_FIELD: &str = "file";

/// HTTP transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with an optional per-request timeout
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::ConfigError(e.to_string()))?;

        Ok(Self { client })
    }

    /// Create a transport around an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build_form(request: &ChunkRequest, progress: ProgressReporter) -> Result<Form, TransportError> {
        let length = request.body.len() as u64;
        let body = reqwest::Body::wrap_stream(progress_stream(request.body.clone(), progress));

        let mut part = Part::stream_with_length(body, length).file_name(request.file_name.clone());
        if let Some(content_type) = &request.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| TransportError::ConfigError(e.to_string()))?;
        }

        let mut form = Form::new().part(FILE_FIELD, part);
        for (name, value) in request.fields.iter() {
            form = form.text(name.clone(), value.clone());
        }

        Ok(form)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[tracing::instrument(
        name = "transport.send",
        skip(self, request, progress),
        fields(
            http.method = %request.method,
            http.url = %request.url,
            upload.bytes = request.body.len(),
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn send(
        &self,
        request: ChunkRequest,
        progress: ProgressReporter,
    ) -> Result<TransportResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| TransportError::ConfigError(e.to_string()))?;

        let form = Self::build_form(&request, progress)?;

        let mut builder = self.client.request(method, &request.url).multipart(form);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::RequestError(e.to_string()))?;

        let status = response.status().as_u16();
        tracing::Span::current().record("http.status_code", status);

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::ResponseError(e.to_string()))?;

        Ok(TransportResponse { status, body })
    }
}

/// Stream `body` in [`PROGRESS_SLICE_SIZE`] slices, reporting the running
/// byte count as each slice is handed to the connection.
fn progress_stream(
    body: Bytes,
    progress: ProgressReporter,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync + 'static {
    let total = body.len() as u64;
    let mut offset = 0usize;

    stream::iter(std::iter::from_fn(move || {
        if offset >= body.len() {
            return None;
        }

        let end = usize::min(offset + PROGRESS_SLICE_SIZE, body.len());
        let slice = body.slice(offset..end);
        offset = end;

        progress.report(TransferProgress {
            loaded: end as u64,
            total,
            length_computable: true,
        });

        Some(Ok(slice))
    }))
}
