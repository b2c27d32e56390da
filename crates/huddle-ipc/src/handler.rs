//! Handler trait and registry the broker dispatches into. Concrete handlers
//! (message send, task CRUD, group admin, KB ops, external CLI wrappers)
//! are implemented one crate over and registered here by `huddle-gateway`.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use huddle_core::types::GroupFolder;

use crate::payload::IpcPayload;

/// One IPC payload type's effect. Mirrors the teacher's `(payload) ->
/// ToolResult` shape but keyed by source group and authorization instead of
/// an LLM tool call.
#[async_trait]
pub trait IpcHandler: Send + Sync {
    async fn handle(
        &self,
        payload: &IpcPayload,
        source: &GroupFolder,
        is_main: bool,
    ) -> Result<(), String>;
}

/// Maps a payload's `type` tag to the handler that implements it.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<&'static str, Arc<dyn IpcHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, type_name: &'static str, handler: Arc<dyn IpcHandler>) {
        self.handlers.insert(type_name, handler);
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<dyn IpcHandler>> {
        self.handlers.get(type_name).map(|h| h.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl IpcHandler for EchoHandler {
        async fn handle(
            &self,
            _payload: &IpcPayload,
            _source: &GroupFolder,
            _is_main: bool,
        ) -> Result<(), String> {
            Ok(())
        }
    }

    #[test]
    fn registry_resolves_registered_handler_by_type_name() {
        let registry = HandlerRegistry::new();
        registry.register("kb_list", Arc::new(EchoHandler));
        assert!(registry.get("kb_list").is_some());
        assert!(registry.get("unregistered_type").is_none());
    }
}
