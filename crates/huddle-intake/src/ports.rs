//! Trait boundaries the Intake Loop depends on, satisfied by the Container
//! Runner (C5) and KB Pipeline (C4) crates. Kept local (rather than a direct
//! dependency on those crates) so the loop can be driven against fakes in
//! tests, the same way the teacher isolates `Channel` from its adapters.

use async_trait::async_trait;
use huddle_core::types::{GroupFolder, Jid, KbSearchHit};

/// What the Intake Loop needs from the Container Runner.
#[async_trait]
pub trait ContainerRunner: Send + Sync {
    async fn run(
        &self,
        group_folder: &GroupFolder,
        chat_jid: &Jid,
        is_main: bool,
        prompt: &str,
    ) -> Result<String, String>;
}

/// What the Intake Loop needs from the KB Pipeline.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Fire-and-forget ingest of a URL discovered in a message.
    async fn ingest_url(&self, group_folder: &GroupFolder, url: &str) -> Result<(), String>;

    /// Search for relevant chunks; returns hits above the pipeline's own
    /// similarity threshold.
    async fn search(&self, group_folder: &GroupFolder, query: &str) -> Result<Vec<KbSearchHit>, String>;
}

/// What the Intake Loop needs from the Transport Adapter.
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send(&self, jid: &str, text: &str) -> Result<(), String>;
    async fn set_typing(&self, jid: &str, typing: bool) -> Result<(), String>;
}
