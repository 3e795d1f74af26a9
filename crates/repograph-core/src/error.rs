use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepographError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Graph store unavailable: {0}")]
    Unavailable(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Path error: {0}")]
    Path(String),

    #[error("Detector {detector} failed: {message}")]
    Detector { detector: String, message: String },

    #[error("Graph algorithm unavailable: {0}")]
    AlgorithmUnavailable(String),

    #[error("Secret detected: {0}")]
    Secret(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl RepographError {
    /// Transient failures are retried by the graph store; everything else
    /// surfaces immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, RepographError::Connection(_))
    }
}

pub type Result<T> = std::result::Result<T, RepographError>;
