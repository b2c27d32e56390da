use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("store error: {0}")]
    Store(#[from] huddle_store::StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed payload: {0}")]
    InvalidPayload(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("handler error: {0}")]
    Handler(String),

    #[error("no handler registered for payload type {0:?}")]
    NoHandler(String),
}

pub type Result<T> = std::result::Result<T, IpcError>;
