use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use crate::parser::{LineParser, LogEvent};

use super::error::ChunkError;
use super::planner::FileChunk;

/// Keyword → occurrence count.
pub type KeywordStats = BTreeMap<String, u64>;

/// Events and counters produced by one chunk.
#[derive(Debug, Clone, Default)]
pub struct ChunkResult {
    pub index: usize,
    /// Events in file order.
    pub events: Vec<LogEvent>,
    pub keyword_counts: KeywordStats,
    /// Number of events carrying a keyword.
    pub error_count: u64,
}

impl ChunkResult {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    pub fn push(&mut self, event: LogEvent) {
        if let Some(keyword) = &event.keyword {
            *self.keyword_counts.entry(keyword.clone()).or_insert(0) += 1;
            self.error_count += 1;
        }
        self.events.push(event);
    }
}

/// Parses every line whose first byte lies in `[chunk.start, chunk.end)`.
///
/// Opens its own descriptor so concurrent chunks never share a cursor. A
/// chunk that starts mid-line skips forward to the next line start; that line
/// belongs to the previous chunk, which reads past its own `end` to finish it.
pub fn process_chunk(
    path: &Path,
    chunk: FileChunk,
    parser: &LineParser,
    file_id: i64,
) -> Result<ChunkResult, ChunkError> {
    let mut result = ChunkResult::new(chunk.index);
    if chunk.is_empty() {
        return Ok(result);
    }

    let file = File::open(path).map_err(|e| ChunkError::io(chunk.index, "open scratch file", e))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let mut pos = if chunk.start > 0 {
        // Back up one byte: if it is a newline we are already on a line start
        // and only that byte gets discarded.
        reader
            .seek(SeekFrom::Start(chunk.start - 1))
            .map_err(|e| ChunkError::io(chunk.index, "seek to chunk start", e))?;
        let skipped = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| ChunkError::io(chunk.index, "find line boundary", e))?;
        chunk.start - 1 + skipped as u64
    } else {
        0
    };

    while pos < chunk.end {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| ChunkError::io(chunk.index, "read line", e))?;
        if read == 0 {
            break;
        }
        pos += read as u64;

        let line = String::from_utf8_lossy(trim_line_ending(&buf));
        if let Some(event) = parser.parse(&line, file_id) {
            result.push(event);
        }
    }

    Ok(result)
}

fn trim_line_ending(mut line: &[u8]) -> &[u8] {
    if let Some(rest) = line.strip_suffix(b"\n") {
        line = rest;
    }
    if let Some(rest) = line.strip_suffix(b"\r") {
        line = rest;
    }
    line
}
