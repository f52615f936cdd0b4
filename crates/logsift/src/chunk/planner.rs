//! Splits a file into byte ranges for parallel parsing.

/// A contiguous byte range `[start, end)` assigned to one parsing worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileChunk {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl FileChunk {
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How a file is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStrategy {
    /// One pass over the whole file on the calling thread.
    SinglePass,
    /// The file is split into this many ranges, each parsed on its own thread.
    Chunked(usize),
}

impl ProcessingStrategy {
    /// Files strictly larger than `threshold` are chunked.
    pub fn for_size(file_size: u64, threshold: u64, chunk_count: usize) -> Self {
        if is_large_file(file_size, threshold) && chunk_count > 1 {
            ProcessingStrategy::Chunked(chunk_count)
        } else {
            ProcessingStrategy::SinglePass
        }
    }

    pub fn chunk_count(&self) -> usize {
        match self {
            ProcessingStrategy::SinglePass => 1,
            ProcessingStrategy::Chunked(n) => *n,
        }
    }
}

/// The single size policy shared by queue routing and strategy selection.
pub fn is_large_file(file_size: u64, threshold: u64) -> bool {
    file_size > threshold
}

/// Divides `file_size` bytes into `chunk_count` equal ranges. The last range
/// absorbs the rounding remainder so the ranges always cover the whole file.
///
/// Ranges are byte-based; line alignment happens in the chunk processor.
pub fn plan_chunks(file_size: u64, chunk_count: usize) -> Vec<FileChunk> {
    let count = chunk_count.max(1);
    let chunk_size = file_size / count as u64;

    (0..count)
        .map(|index| {
            let start = index as u64 * chunk_size;
            let end = if index == count - 1 {
                file_size
            } else {
                start + chunk_size
            };
            FileChunk { index, start, end }
        })
        .collect()
}
