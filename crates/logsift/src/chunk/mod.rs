//! Chunked parsing of a local log file.
//!
//! [`parse_file`] plans the byte ranges, runs one scoped thread per range and
//! waits for all of them before merging. A single failed chunk fails the file.

pub mod aggregator;
pub mod error;
pub mod planner;
pub mod processor;

use std::any::Any;
use std::path::Path;
use std::thread;

use log::debug;

use crate::parser::LineParser;

pub use aggregator::{Aggregator, JobStats};
pub use error::ChunkError;
pub use planner::{is_large_file, plan_chunks, FileChunk, ProcessingStrategy};
pub use processor::{process_chunk, ChunkResult, KeywordStats};

/// Parses the file at `path` according to `strategy`.
pub fn parse_file(
    path: &Path,
    file_size: u64,
    strategy: ProcessingStrategy,
    parser: &LineParser,
    file_id: i64,
) -> Result<JobStats, ChunkError> {
    let chunks = plan_chunks(file_size, strategy.chunk_count());
    let aggregator = Aggregator::new(chunks.len());

    if let [chunk] = chunks.as_slice() {
        aggregator.record(chunk.index, process_chunk(path, *chunk, parser, file_id));
        return aggregator.finish();
    }

    debug!(
        "Parsing {} bytes in {} chunks for file {}",
        file_size,
        chunks.len(),
        file_id
    );

    thread::scope(|scope| {
        let handles: Vec<_> = chunks
            .iter()
            .map(|&chunk| {
                let aggregator = &aggregator;
                let handle = scope.spawn(move || {
                    aggregator.record(chunk.index, process_chunk(path, chunk, parser, file_id));
                });
                (chunk.index, handle)
            })
            .collect();

        for (index, handle) in handles {
            if let Err(payload) = handle.join() {
                aggregator.record(
                    index,
                    Err(ChunkError::Panicked {
                        index,
                        message: panic_message(payload.as_ref()),
                    }),
                );
            }
        }
    });

    aggregator.finish()
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
