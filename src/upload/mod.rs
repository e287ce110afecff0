//! Upload module
//!
//! Splits a source into byte-range chunks and transfers them concurrently,
//! finalizing with the terminal chunk once every other chunk is accepted.

use crate::config::ConfigError;
use crate::transport::{TransportError, TransportResponse};
use thiserror::Error;

pub mod chunk;
pub mod coordinator;
pub mod event;
pub mod source;
pub mod split;

pub use chunk::{ChunkStatus, ChunkTransfer};
pub use coordinator::{ChunkedUploader, SessionOutcome, UploadController, UploadHandle};
pub use event::{ChunkEvent, EventListener, SessionProgress, UploadEvent};
pub use source::{Blob, UploadSource};
pub use split::{split_ranges, ChunkRange};

/// Why a single attempt failed
#[derive(Error, Debug, Clone)]
pub enum AttemptError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Endpoint returned status {}", .0.status)]
    Status(TransportResponse),
}

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Chunked upload is not supported: source cannot be sliced into byte ranges")]
    SlicingUnsupported,

    #[error("Source is empty")]
    EmptySource,

    #[error("Transport setup failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Chunk {index} failed after {attempts} attempts: {error}")]
    ChunkFailed {
        index: usize,
        attempts: u32,
        error: AttemptError,
    },

    #[error("Upload session ended without an outcome")]
    Interrupted,
}

/// Result of a completed upload
#[derive(Debug, Clone)]
pub struct UploadSuccess {
    pub session_id: String,
    pub total_bytes: u64,
    pub chunk_count: usize,
    /// Response to the chunk that completed the upload
    pub response: TransportResponse,
}
