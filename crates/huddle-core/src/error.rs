use thiserror::Error;

#[derive(Debug, Error)]
pub enum HuddleError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("group not registered: {jid}")]
    NotRegistered { jid: String },

    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("invalid schedule: {0}")]
    ScheduleParseError(String),

    #[error("container run timed out after {secs}s")]
    ContainerTimeout { secs: u64 },

    #[error("container output exceeded {max} bytes")]
    ContainerOversize { max: usize },

    #[error("container exited with status {code}: {stderr}")]
    ContainerExitError { code: i32, stderr: String },

    #[error("content extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("source already ingested: {0}")]
    AlreadyIngested(String),

    #[error("duplicate content hash: {0}")]
    DuplicateContent(String),

    #[error("embeddings provider unavailable: {0}")]
    EmbeddingsUnavailable(String),

    #[error("store I/O error: {0}")]
    StoreIOError(String),

    #[error("invalid IPC payload: {0}")]
    InvalidPayload(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HuddleError {
    /// Short error code, used in IPC error-quarantine records and logs.
    pub fn code(&self) -> &'static str {
        match self {
            HuddleError::Config(_) => "CONFIG_ERROR",
            HuddleError::TransportUnavailable(_) => "TRANSPORT_UNAVAILABLE",
            HuddleError::NotRegistered { .. } => "NOT_REGISTERED",
            HuddleError::Unauthorized { .. } => "UNAUTHORIZED",
            HuddleError::ScheduleParseError(_) => "SCHEDULE_PARSE_ERROR",
            HuddleError::ContainerTimeout { .. } => "CONTAINER_TIMEOUT",
            HuddleError::ContainerOversize { .. } => "CONTAINER_OVERSIZE",
            HuddleError::ContainerExitError { .. } => "CONTAINER_EXIT_ERROR",
            HuddleError::ExtractionFailed(_) => "EXTRACTION_FAILED",
            HuddleError::AlreadyIngested(_) => "ALREADY_INGESTED",
            HuddleError::DuplicateContent(_) => "DUPLICATE_CONTENT",
            HuddleError::EmbeddingsUnavailable(_) => "EMBEDDINGS_UNAVAILABLE",
            HuddleError::StoreIOError(_) => "STORE_IO_ERROR",
            HuddleError::InvalidPayload(_) => "INVALID_PAYLOAD",
            HuddleError::Serialization(_) => "SERIALIZATION_ERROR",
            HuddleError::Io(_) => "IO_ERROR",
            HuddleError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, HuddleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_matches_variant() {
        let e = HuddleError::NotRegistered {
            jid: "123@g.us".into(),
        };
        assert_eq!(e.code(), "NOT_REGISTERED");
    }
}
