//! Trait boundaries the tool handlers depend on, satisfied by the Transport
//! Adapter (C2) and KB Pipeline (C4) crates. Kept local the same way
//! `huddle-intake::ports` and `huddle-scheduler::ports` isolate themselves
//! from their collaborators, so handlers can be driven against fakes.

use async_trait::async_trait;
use huddle_core::types::{GroupFolder, KbSearchHit, KbSource};

/// What the tool handlers need from the Transport Adapter.
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send(&self, jid: &str, text: &str) -> Result<(), String>;
}

/// What the tool handlers need from the KB Pipeline.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn ingest_url(&self, folder: &GroupFolder, url: &str) -> Result<KbSource, String>;

    async fn ingest_text(
        &self,
        folder: &GroupFolder,
        title: &str,
        text: &str,
        tags: Vec<String>,
    ) -> Result<KbSource, String>;

    /// Looked up before `update`/`delete` so the handler can check the
    /// source actually belongs to the calling group.
    fn get_source(&self, source_id: &str) -> Result<Option<KbSource>, String>;

    async fn update(
        &self,
        source_id: &str,
        title: Option<String>,
        tags: Option<Vec<String>>,
        text: Option<String>,
    ) -> Result<(), String>;

    async fn delete(&self, source_id: &str) -> Result<(), String>;

    fn list_sources(&self, folder: &GroupFolder) -> Result<Vec<KbSource>, String>;

    async fn search(
        &self,
        folder: &GroupFolder,
        query: &str,
        limit: Option<usize>,
        min_similarity: Option<f32>,
        dedupe_by_source: bool,
    ) -> Result<Vec<KbSearchHit>, String>;
}
