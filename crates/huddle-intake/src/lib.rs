pub mod context;
pub mod error;
pub mod loop_;
pub mod ports;
pub mod trigger;
pub mod urls;

pub use error::IntakeError;
pub use loop_::IntakeLoop;
pub use ports::{ChatSink, ContainerRunner, KnowledgeBase};
