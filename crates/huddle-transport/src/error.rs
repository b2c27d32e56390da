use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("explicit logout received")]
    LoggedOut,

    #[error("operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("store error: {0}")]
    Store(#[from] huddle_store::StoreError),
}

pub type Result<T> = std::result::Result<T, TransportError>;
