use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("chunk {index}: failed to {op}: {source}")]
    Io {
        index: usize,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("chunk {index}: worker panicked: {message}")]
    Panicked { index: usize, message: String },

    #[error("chunk {index} never reported a result")]
    Missing { index: usize },
}

impl ChunkError {
    pub(crate) fn io(index: usize, op: &'static str, source: std::io::Error) -> Self {
        ChunkError::Io { index, op, source }
    }

    pub fn index(&self) -> usize {
        match self {
            ChunkError::Io { index, .. }
            | ChunkError::Panicked { index, .. }
            | ChunkError::Missing { index } => *index,
        }
    }
}
