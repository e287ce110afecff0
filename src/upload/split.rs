//! Byte-range splitting

/// Sentinel sent in place of the total size on every non-terminal chunk
pub const UNKNOWN_TOTAL: i64 = -1;

/// One contiguous `[start, end)` segment of the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub index: usize,
    pub start: u64,
    pub end: u64,
    /// True iff `end` reaches the end of the source
    pub is_terminal: bool,
}

impl ChunkRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// `Content-Range` value for this segment.
    ///
    /// The end offset is inclusive. The total is only disclosed on the
    /// terminal chunk, which tells the receiver to finalize.
    pub fn content_range(&self, total_bytes: u64) -> String {
        let last = self.end.saturating_sub(1);
        if self.is_terminal {
            format!("bytes {}-{}/{}", self.start, last, total_bytes)
        } else {
            format!("bytes {}-{}/{}", self.start, last, UNKNOWN_TOTAL)
        }
    }
}

/// Split `[0, total_bytes)` into ranges of at most `max_chunk_size` bytes.
///
/// The last range is the only terminal one and may be shorter. An empty
/// source or a zero chunk size yields no ranges.
pub fn split_ranges(total_bytes: u64, max_chunk_size: u64) -> Vec<ChunkRange> {
    if total_bytes == 0 || max_chunk_size == 0 {
        return Vec::new();
    }

    let count = total_bytes.div_ceil(max_chunk_size) as usize;
    let mut ranges = Vec::with_capacity(count);
    let mut start = 0u64;

    while start < total_bytes {
        let end = u64::min(start.saturating_add(max_chunk_size), total_bytes);
        ranges.push(ChunkRange {
            index: ranges.len(),
            start,
            end,
            is_terminal: end == total_bytes,
        });
        start = end;
    }

    ranges
}
