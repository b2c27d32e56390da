//! `kb_add`/`kb_search`/`kb_list`/`kb_update`/`kb_delete` — thin delegates
//! onto the KB Pipeline (C4), group-scoped.
//!
//! Grounded on `skynet-agent/src/tools/knowledge.rs`'s delegate-to-a-backing-
//! service pattern (there, a `KnowledgeBase` trait wraps a vector store;
//! here it wraps `huddle-kb::KbPipeline` through the local [`KnowledgeBase`]
//! port).

use std::sync::Arc;

use async_trait::async_trait;
use huddle_core::types::GroupFolder;
use huddle_ipc::{IpcHandler, IpcPayload};
use tracing::instrument;

use crate::error::ToolError;
use crate::ports::KnowledgeBase;

fn authorize_source_group(
    source_group: &GroupFolder,
    caller: &GroupFolder,
    is_main: bool,
) -> Result<(), ToolError> {
    if is_main || source_group.as_str() == caller.as_str() {
        Ok(())
    } else {
        Err(ToolError::Unauthorized(format!(
            "group {caller} may not operate on a KB source owned by {source_group}"
        )))
    }
}

pub struct KbAddHandler {
    kb: Arc<dyn KnowledgeBase>,
}

impl KbAddHandler {
    pub fn new(kb: Arc<dyn KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl IpcHandler for KbAddHandler {
    #[instrument(skip(self, payload), fields(source = %source))]
    async fn handle(&self, payload: &IpcPayload, source: &GroupFolder, _is_main: bool) -> Result<(), String> {
        let (url, text, title, tags) = match payload {
            IpcPayload::KbAdd { url, text, title, tags } => (url, text, title, tags),
            _ => return Err(ToolError::WrongPayload("kb_add").into()),
        };

        match (url, text) {
            (Some(url), _) => {
                self.kb.ingest_url(source, url).await.map_err(ToolError::KnowledgeBase)?;
            }
            (None, Some(text)) => {
                let title = title.clone().unwrap_or_else(|| "untitled".to_string());
                self.kb
                    .ingest_text(source, &title, text, tags.clone())
                    .await
                    .map_err(ToolError::KnowledgeBase)?;
            }
            (None, None) => {
                return Err(ToolError::InvalidPayload("kb_add requires url or text".to_string()).into());
            }
        }
        Ok(())
    }
}

pub struct KbSearchHandler {
    kb: Arc<dyn KnowledgeBase>,
}

impl KbSearchHandler {
    pub fn new(kb: Arc<dyn KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl IpcHandler for KbSearchHandler {
    async fn handle(&self, payload: &IpcPayload, source: &GroupFolder, _is_main: bool) -> Result<(), String> {
        let (query, limit, min_similarity, dedupe_by_source) = match payload {
            IpcPayload::KbSearch {
                query,
                limit,
                min_similarity,
                dedupe_by_source,
            } => (query, *limit, *min_similarity, dedupe_by_source.unwrap_or(true)),
            _ => return Err(ToolError::WrongPayload("kb_search").into()),
        };
        self.kb
            .search(source, query, limit, min_similarity, dedupe_by_source)
            .await
            .map_err(ToolError::KnowledgeBase)?;
        Ok(())
    }
}

pub struct KbListHandler {
    kb: Arc<dyn KnowledgeBase>,
}

impl KbListHandler {
    pub fn new(kb: Arc<dyn KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl IpcHandler for KbListHandler {
    async fn handle(&self, payload: &IpcPayload, source: &GroupFolder, _is_main: bool) -> Result<(), String> {
        if !matches!(payload, IpcPayload::KbList) {
            return Err(ToolError::WrongPayload("kb_list").into());
        }
        self.kb.list_sources(source).map_err(ToolError::KnowledgeBase)?;
        Ok(())
    }
}

pub struct KbUpdateHandler {
    kb: Arc<dyn KnowledgeBase>,
}

impl KbUpdateHandler {
    pub fn new(kb: Arc<dyn KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl IpcHandler for KbUpdateHandler {
    async fn handle(&self, payload: &IpcPayload, source: &GroupFolder, is_main: bool) -> Result<(), String> {
        let (source_id, title, tags, text) = match payload {
            IpcPayload::KbUpdate {
                source_id,
                title,
                tags,
                text,
            } => (source_id, title, tags, text),
            _ => return Err(ToolError::WrongPayload("kb_update").into()),
        };

        let existing = self
            .kb
            .get_source(source_id)
            .map_err(ToolError::KnowledgeBase)?
            .ok_or_else(|| ToolError::NotFound(format!("KB source {source_id}")))?;
        authorize_source_group(&existing.group_folder, source, is_main)?;

        self.kb
            .update(source_id, title.clone(), tags.clone(), text.clone())
            .await
            .map_err(ToolError::KnowledgeBase)?;
        Ok(())
    }
}

pub struct KbDeleteHandler {
    kb: Arc<dyn KnowledgeBase>,
}

impl KbDeleteHandler {
    pub fn new(kb: Arc<dyn KnowledgeBase>) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl IpcHandler for KbDeleteHandler {
    async fn handle(&self, payload: &IpcPayload, source: &GroupFolder, is_main: bool) -> Result<(), String> {
        let source_id = match payload {
            IpcPayload::KbDelete { source_id } => source_id,
            _ => return Err(ToolError::WrongPayload("kb_delete").into()),
        };

        let existing = self
            .kb
            .get_source(source_id)
            .map_err(ToolError::KnowledgeBase)?
            .ok_or_else(|| ToolError::NotFound(format!("KB source {source_id}")))?;
        authorize_source_group(&existing.group_folder, source, is_main)?;

        self.kb.delete(source_id).await.map_err(ToolError::KnowledgeBase)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::types::{KbSearchHit, KbSource, SourceType};
    use std::sync::Mutex as StdMutex;

    struct FakeKb {
        sources: StdMutex<Vec<KbSource>>,
    }

    fn sample_source(id: &str, folder: &str) -> KbSource {
        KbSource {
            id: id.to_string(),
            group_folder: GroupFolder::from(folder),
            url: None,
            title: "t".to_string(),
            source_type: SourceType::Text,
            raw_content: "hello".to_string(),
            content_hash: "hash".to_string(),
            tags: vec![],
            truncated: false,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[async_trait]
    impl KnowledgeBase for FakeKb {
        async fn ingest_url(&self, folder: &GroupFolder, url: &str) -> Result<KbSource, String> {
            let source = sample_source("s1", folder.as_str());
            let _ = url;
            self.sources.lock().unwrap().push(source.clone());
            Ok(source)
        }

        async fn ingest_text(
            &self,
            folder: &GroupFolder,
            _title: &str,
            _text: &str,
            _tags: Vec<String>,
        ) -> Result<KbSource, String> {
            let source = sample_source("s1", folder.as_str());
            self.sources.lock().unwrap().push(source.clone());
            Ok(source)
        }

        fn get_source(&self, source_id: &str) -> Result<Option<KbSource>, String> {
            Ok(self.sources.lock().unwrap().iter().find(|s| s.id == source_id).cloned())
        }

        async fn update(
            &self,
            _source_id: &str,
            _title: Option<String>,
            _tags: Option<Vec<String>>,
            _text: Option<String>,
        ) -> Result<(), String> {
            Ok(())
        }

        async fn delete(&self, source_id: &str) -> Result<(), String> {
            self.sources.lock().unwrap().retain(|s| s.id != source_id);
            Ok(())
        }

        fn list_sources(&self, folder: &GroupFolder) -> Result<Vec<KbSource>, String> {
            Ok(self
                .sources
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.group_folder.as_str() == folder.as_str())
                .cloned()
                .collect())
        }

        async fn search(
            &self,
            _folder: &GroupFolder,
            _query: &str,
            _limit: Option<usize>,
            _min_similarity: Option<f32>,
            _dedupe_by_source: bool,
        ) -> Result<Vec<KbSearchHit>, String> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn kb_add_requires_url_or_text() {
        let kb = Arc::new(FakeKb {
            sources: StdMutex::new(vec![]),
        });
        let handler = KbAddHandler::new(kb);
        let payload = IpcPayload::KbAdd {
            url: None,
            text: None,
            title: None,
            tags: vec![],
        };
        let result = handler.handle(&payload, &GroupFolder::from("acme"), false).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn kb_delete_rejects_cross_group_caller() {
        let kb = Arc::new(FakeKb {
            sources: StdMutex::new(vec![sample_source("s1", "acme")]),
        });
        let handler = KbDeleteHandler::new(kb.clone());
        let payload = IpcPayload::KbDelete {
            source_id: "s1".to_string(),
        };

        let result = handler.handle(&payload, &GroupFolder::from("other"), false).await;
        assert!(result.is_err());
        assert_eq!(kb.sources.lock().unwrap().len(), 1);

        handler
            .handle(&payload, &GroupFolder::from("acme"), false)
            .await
            .unwrap();
        assert!(kb.sources.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn kb_update_main_may_touch_any_group() {
        let kb = Arc::new(FakeKb {
            sources: StdMutex::new(vec![sample_source("s1", "acme")]),
        });
        let handler = KbUpdateHandler::new(kb);
        let payload = IpcPayload::KbUpdate {
            source_id: "s1".to_string(),
            title: Some("renamed".to_string()),
            tags: None,
            text: None,
        };

        handler
            .handle(&payload, &GroupFolder::from("main"), true)
            .await
            .unwrap();
    }
}
