//! Upload sources
//!
//! A source is an immutable byte sequence of known length that can be cut
//! into byte ranges without copying.

use bytes::Bytes;
use std::ops::Range;
use std::path::Path;

/// File name used on the multipart part when none is known
pub const DEFAULT_FILE_NAME: &str = "blob";

/// Something that can be uploaded in chunks
pub trait UploadSource: Send + Sync + 'static {
    /// Total size in bytes
    fn len(&self) -> u64;

    /// Bytes in `range`. Callers only pass ranges inside `0..len()`.
    fn slice(&self, range: Range<u64>) -> Bytes;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `slice` can serve arbitrary ranges
    fn supports_slicing(&self) -> bool {
        true
    }

    fn content_type(&self) -> Option<&str> {
        None
    }

    fn file_name(&self) -> &str {
        DEFAULT_FILE_NAME
    }
}

/// In-memory source backed by [`Bytes`]
#[derive(Debug, Clone)]
pub struct Blob {
    data: Bytes,
    content_type: Option<String>,
    file_name: String,
}

impl Blob {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            content_type: None,
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }

    /// Read a whole file into a blob named after the file
    pub async fn from_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let mut blob = Self::new(data);
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            blob.file_name = name.to_string();
        }
        Ok(blob)
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }
}

impl UploadSource for Blob {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn slice(&self, range: Range<u64>) -> Bytes {
        self.data.slice(range.start as usize..range.end as usize)
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn file_name(&self) -> &str {
        &self.file_name
    }
}
