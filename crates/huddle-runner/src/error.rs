//! Error types for the container runner.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("container spawn error: {0}")]
    Spawn(String),

    #[error("container run timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("container output exceeded {max} bytes")]
    Oversize { max: usize },

    #[error("container exited with code {code}: {stderr}")]
    ExitError { code: i32, stderr: String },

    #[error("agent reported an error: {0}")]
    AgentError(String),

    #[error("container response was not valid JSON: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
