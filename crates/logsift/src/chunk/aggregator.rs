use std::sync::Mutex;

use log::warn;

use crate::parser::LogEvent;

use super::error::ChunkError;
use super::processor::{ChunkResult, KeywordStats};

/// Job-level result after every chunk has been merged.
#[derive(Debug, Clone, Default)]
pub struct JobStats {
    pub events: Vec<LogEvent>,
    pub keyword_counts: KeywordStats,
    pub error_count: u64,
    pub chunks: usize,
}

#[derive(Default)]
struct AggregateState {
    events: Vec<Option<Vec<LogEvent>>>,
    errors: Vec<Option<ChunkError>>,
    keyword_counts: KeywordStats,
    error_count: u64,
}

/// Collects chunk results as they complete, from any thread.
///
/// Counters are merged under the lock at record time. Event vectors are kept
/// per chunk and concatenated by ascending chunk index in [`finish`](Self::finish).
pub struct Aggregator {
    chunk_count: usize,
    state: Mutex<AggregateState>,
}

impl Aggregator {
    pub fn new(chunk_count: usize) -> Self {
        let mut state = AggregateState::default();
        state.events.resize_with(chunk_count, || None);
        state.errors.resize_with(chunk_count, || None);
        Self {
            chunk_count,
            state: Mutex::new(state),
        }
    }

    pub fn record(&self, index: usize, outcome: Result<ChunkResult, ChunkError>) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if index >= self.chunk_count {
            warn!("Ignoring result for out-of-range chunk {}", index);
            return;
        }

        match outcome {
            Ok(result) => {
                for (keyword, count) in result.keyword_counts {
                    *state.keyword_counts.entry(keyword).or_insert(0) += count;
                }
                state.error_count += result.error_count;
                state.events[index] = Some(result.events);
            }
            Err(err) => {
                state.errors[index] = Some(err);
            }
        }
    }

    /// Produces the merged result, or the failure of the lowest-indexed chunk
    /// that failed. Must only be called once every chunk has reported.
    pub fn finish(self) -> Result<JobStats, ChunkError> {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(err) = state.errors.into_iter().flatten().next() {
            return Err(err);
        }

        let total = state.events.iter().flatten().map(Vec::len).sum();
        let mut events = Vec::with_capacity(total);
        for (index, chunk_events) in state.events.into_iter().enumerate() {
            match chunk_events {
                Some(chunk_events) => events.extend(chunk_events),
                None => return Err(ChunkError::Missing { index }),
            }
        }

        Ok(JobStats {
            events,
            keyword_counts: state.keyword_counts,
            error_count: state.error_count,
            chunks: self.chunk_count,
        })
    }
}
