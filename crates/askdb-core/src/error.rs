use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No documents available")]
    EmptyCorpus,

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Store operation failed: {0}")]
    Store(String),

    #[error("Pipeline worker stopped")]
    WorkerStopped,
}

impl Error {
    /// Wraps a collaborator failure, keeping the full `anyhow` context chain.
    pub fn embedding(err: &anyhow::Error) -> Self {
        Self::Embedding(format!("{err:#}"))
    }

    pub fn generation(err: &anyhow::Error) -> Self {
        Self::Generation(format!("{err:#}"))
    }

    pub fn store(err: &anyhow::Error) -> Self {
        Self::Store(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
