//! Trait boundaries the scheduler depends on, kept local the same way
//! `huddle-intake::ports` isolates itself from the Container Runner and
//! Transport crates — lets the engine be driven against fakes in tests.

use async_trait::async_trait;
use huddle_core::types::{GroupFolder, Jid};

/// Outcome of one scheduled container run.
pub struct RunOutcome {
    pub result: String,
    pub new_session_id: Option<String>,
}

/// What the scheduler needs from the Container Runner. Unlike the Intake
/// Loop's port, session id flows both ways — `context_mode` decides
/// whether a fired task passes the group's session along at all.
#[async_trait]
pub trait ContainerRunner: Send + Sync {
    async fn run(
        &self,
        group_folder: &GroupFolder,
        chat_jid: &Jid,
        is_main: bool,
        prompt: &str,
        session_id: Option<String>,
    ) -> Result<RunOutcome, String>;
}

/// What the scheduler needs from the Transport Adapter.
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send(&self, jid: &str, text: &str) -> Result<(), String>;
}
