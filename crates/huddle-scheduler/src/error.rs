use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("store error: {0}")]
    Store(#[from] huddle_store::StoreError),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("container runner error: {0}")]
    Runner(String),

    #[error("transport send error: {0}")]
    Send(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
