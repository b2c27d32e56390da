use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("store error: {0}")]
    Store(#[from] huddle_store::StoreError),

    #[error("container runner error: {0}")]
    Runner(String),

    #[error("transport send error: {0}")]
    Send(String),
}

pub type Result<T> = std::result::Result<T, IntakeError>;
