//! Chunkr Library
//!
//! Chunked HTTP uploader: splits a byte source into `Content-Range` chunks,
//! sends them with bounded concurrency and per-chunk retries, and sends the
//! terminal chunk last so the endpoint can assemble the file.
//!
//! # Features
//!
//! - **Bounded Concurrency**: at most `max_simultaneous` chunks in flight
//! - **Retries**: each chunk gets `max_attempts` tries before the upload fails
//! - **Ordered Finalization**: the chunk carrying the real total goes last
//! - **Stop/Resume**: pause an upload and continue it later
//!
//! # Example
//!
//! ```no_run
//! use chunkr::{Blob, ChunkedUploader, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let blob = Blob::from_path("movie.mp4").await?;
//!     let success = ChunkedUploader::new(blob, config.upload).start()?.await?;
//!     println!("{} bytes in {} chunks", success.total_bytes, success.chunk_count);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod logging;
pub mod metrics;
pub mod transport;
pub mod upload;

// Re-export commonly used types
pub use config::{Config, UploadConfig};
pub use upload::{Blob, ChunkedUploader, UploadError, UploadEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
