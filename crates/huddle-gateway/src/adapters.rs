//! Adapter structs binding the concrete Store/Runner/Transport/KB Pipeline
//! crates to the narrow local port traits each consuming crate defines
//! (`huddle-intake::ports`, `huddle-scheduler::ports`, `huddle-tools::ports`,
//! `huddle-tools::handlers::group::GroupLister`). Kept in one file since
//! none carries enough logic on its own to warrant a module.

use std::sync::Arc;

use async_trait::async_trait;
use huddle_core::types::{ExtraMount, GroupFolder, Jid, KbSearchHit, KbSource};
use huddle_kb::KbPipeline;
use huddle_runner::{Runner, RunRequest};
use huddle_store::Store;
use huddle_transport::Transport;

/// Looks up a group's `extra_mounts` from its registration; `main` and
/// unregistered folders get none.
fn extra_mounts_for(store: &Store, folder: &GroupFolder) -> Vec<ExtraMount> {
    store
        .list_registered_groups()
        .ok()
        .and_then(|groups| groups.into_iter().find(|g| g.folder.as_str() == folder.as_str()))
        .map(|g| g.extra_mounts)
        .unwrap_or_default()
}

/// Satisfies `huddle-intake::ports::ContainerRunner`: loads the group's
/// session, fires the run, and persists whatever session id comes back.
pub struct IntakeRunnerAdapter {
    runner: Arc<Runner>,
    store: Arc<Store>,
}

impl IntakeRunnerAdapter {
    pub fn new(runner: Arc<Runner>, store: Arc<Store>) -> Self {
        Self { runner, store }
    }
}

#[async_trait]
impl huddle_intake::ports::ContainerRunner for IntakeRunnerAdapter {
    async fn run(
        &self,
        group_folder: &GroupFolder,
        chat_jid: &Jid,
        is_main: bool,
        prompt: &str,
    ) -> Result<String, String> {
        let session_id = self
            .store
            .get_session(group_folder)
            .map_err(|e| e.to_string())?
            .map(|s| s.session_id);

        let outcome = self
            .runner
            .run(RunRequest {
                group_folder: group_folder.clone(),
                chat_jid: chat_jid.clone(),
                is_main,
                prompt: prompt.to_string(),
                session_id,
                extra_mounts: extra_mounts_for(&self.store, group_folder),
            })
            .await
            .map_err(|e| e.to_string())?;

        if let Some(new_session_id) = outcome.new_session_id {
            self.store
                .set_session(group_folder, &new_session_id)
                .map_err(|e| e.to_string())?;
        }

        Ok(outcome.result)
    }
}

/// Satisfies `huddle-scheduler::ports::ContainerRunner`: session id flows
/// both ways here since `context_mode` decides whether the caller passes one
/// in at all (the scheduler owns persisting the updated session, not this
/// adapter).
pub struct SchedulerRunnerAdapter {
    runner: Arc<Runner>,
    store: Arc<Store>,
}

impl SchedulerRunnerAdapter {
    pub fn new(runner: Arc<Runner>, store: Arc<Store>) -> Self {
        Self { runner, store }
    }
}

#[async_trait]
impl huddle_scheduler::ports::ContainerRunner for SchedulerRunnerAdapter {
    async fn run(
        &self,
        group_folder: &GroupFolder,
        chat_jid: &Jid,
        is_main: bool,
        prompt: &str,
        session_id: Option<String>,
    ) -> Result<huddle_scheduler::ports::RunOutcome, String> {
        let outcome = self
            .runner
            .run(RunRequest {
                group_folder: group_folder.clone(),
                chat_jid: chat_jid.clone(),
                is_main,
                prompt: prompt.to_string(),
                session_id,
                extra_mounts: extra_mounts_for(&self.store, group_folder),
            })
            .await
            .map_err(|e| e.to_string())?;

        Ok(huddle_scheduler::ports::RunOutcome {
            result: outcome.result,
            new_session_id: outcome.new_session_id,
        })
    }
}

/// Satisfies every crate-local `ChatSink` shape (`huddle-intake`,
/// `huddle-scheduler`, `huddle-tools` all declare an identical `send`
/// method). Only ever held behind `Arc<dyn Trait>`, so the repeated method
/// name across these impls is never ambiguous at a call site.
pub struct TransportChatSink {
    transport: Arc<dyn Transport>,
}

impl TransportChatSink {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl huddle_intake::ports::ChatSink for TransportChatSink {
    async fn send(&self, jid: &str, text: &str) -> Result<(), String> {
        self.transport.send(jid, text).await.map_err(|e| e.to_string())
    }

    async fn set_typing(&self, jid: &str, typing: bool) -> Result<(), String> {
        self.transport
            .set_typing(jid, typing)
            .await
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl huddle_scheduler::ports::ChatSink for TransportChatSink {
    async fn send(&self, jid: &str, text: &str) -> Result<(), String> {
        self.transport.send(jid, text).await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl huddle_tools::ChatSink for TransportChatSink {
    async fn send(&self, jid: &str, text: &str) -> Result<(), String> {
        self.transport.send(jid, text).await.map_err(|e| e.to_string())
    }
}

/// Satisfies `huddle-tools::handlers::group::GroupLister`, the narrower port
/// `refresh_groups` uses to re-sync chat metadata.
pub struct TransportGroupLister {
    transport: Arc<dyn Transport>,
}

impl TransportGroupLister {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl huddle_tools::handlers::GroupLister for TransportGroupLister {
    async fn list_groups(&self) -> Result<Vec<huddle_transport::GroupInfo>, String> {
        self.transport.list_groups().await.map_err(|e| e.to_string())
    }
}

/// Satisfies `huddle-intake::ports::KnowledgeBase` (fire-and-forget ingest,
/// threshold search) and `huddle-tools::ports::KnowledgeBase` (full CRUD) on
/// the same underlying pipeline.
pub struct KbAdapter {
    pipeline: Arc<KbPipeline>,
    store: Arc<Store>,
}

impl KbAdapter {
    pub fn new(pipeline: Arc<KbPipeline>, store: Arc<Store>) -> Self {
        Self { pipeline, store }
    }
}

#[async_trait]
impl huddle_intake::ports::KnowledgeBase for KbAdapter {
    async fn ingest_url(&self, group_folder: &GroupFolder, url: &str) -> Result<(), String> {
        self.pipeline
            .ingest_url(group_folder, url)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn search(&self, group_folder: &GroupFolder, query: &str) -> Result<Vec<KbSearchHit>, String> {
        self.pipeline
            .search(group_folder, query, None, None, true)
            .await
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl huddle_tools::KnowledgeBase for KbAdapter {
    async fn ingest_url(&self, folder: &GroupFolder, url: &str) -> Result<KbSource, String> {
        self.pipeline.ingest_url(folder, url).await.map_err(|e| e.to_string())
    }

    async fn ingest_text(
        &self,
        folder: &GroupFolder,
        title: &str,
        text: &str,
        tags: Vec<String>,
    ) -> Result<KbSource, String> {
        self.pipeline
            .ingest_text(folder, title, text, tags)
            .await
            .map_err(|e| e.to_string())
    }

    fn get_source(&self, source_id: &str) -> Result<Option<KbSource>, String> {
        self.store.get_kb_source(source_id).map_err(|e| e.to_string())
    }

    async fn update(
        &self,
        source_id: &str,
        title: Option<String>,
        tags: Option<Vec<String>>,
        text: Option<String>,
    ) -> Result<(), String> {
        self.pipeline
            .update(source_id, title, tags, text)
            .await
            .map_err(|e| e.to_string())
    }

    async fn delete(&self, source_id: &str) -> Result<(), String> {
        self.pipeline.delete(source_id).await.map_err(|e| e.to_string())
    }

    fn list_sources(&self, folder: &GroupFolder) -> Result<Vec<KbSource>, String> {
        self.pipeline.list_sources(folder).map_err(|e| e.to_string())
    }

    async fn search(
        &self,
        folder: &GroupFolder,
        query: &str,
        limit: Option<usize>,
        min_similarity: Option<f32>,
        dedupe_by_source: bool,
    ) -> Result<Vec<KbSearchHit>, String> {
        self.pipeline
            .search(folder, query, limit, min_similarity, dedupe_by_source)
            .await
            .map_err(|e| e.to_string())
    }
}
