use thiserror::Error;

#[derive(Debug, Error)]
pub enum KbError {
    #[error("source already ingested: {0}")]
    AlreadyIngested(String),

    #[error("duplicate content in group")]
    DuplicateContent,

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("embeddings provider unavailable: {0}")]
    EmbeddingsUnavailable(String),

    #[error("source not found: {0}")]
    NotFound(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("store error: {0}")]
    Store(#[from] huddle_store::StoreError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, KbError>;
