//! Error types for the tool handlers. Handlers report through
//! `IpcHandler::handle`'s `Result<(), String>`, but build up their own
//! richer error internally first so `Display` renders something a quarantined
//! payload's reviewer can act on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("store error: {0}")]
    Store(#[from] huddle_store::StoreError),

    #[error("runner error: {0}")]
    Runner(#[from] huddle_runner::RunnerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("chat sink error: {0}")]
    ChatSink(String),

    #[error("knowledge base error: {0}")]
    KnowledgeBase(String),

    #[error("unsupported payload type for this handler: {0}")]
    WrongPayload(&'static str),
}

pub type Result<T> = std::result::Result<T, ToolError>;

impl From<ToolError> for String {
    fn from(err: ToolError) -> String {
        err.to_string()
    }
}
