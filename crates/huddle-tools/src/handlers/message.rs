//! `message` — sends `text` to `chatJid` via the Transport Adapter.
//!
//! Grounded on `skynet-agent/src/tools/send_message.rs`: there, the tool
//! checks the caller-declared channel against `ctx.connected_channels()`
//! before sending. Here the equivalent check is that `chat_jid` names the
//! caller's own registered group (or the caller is `main`), since a
//! payload's source directory — not a free-text channel id — is the
//! identity being authorized.

use std::sync::Arc;

use async_trait::async_trait;
use huddle_core::types::GroupFolder;
use huddle_ipc::{IpcHandler, IpcPayload};
use huddle_store::Store;
use tracing::instrument;

use crate::error::ToolError;
use crate::ports::ChatSink;

pub struct MessageHandler {
    store: Arc<Store>,
    chat: Arc<dyn ChatSink>,
}

impl MessageHandler {
    pub fn new(store: Arc<Store>, chat: Arc<dyn ChatSink>) -> Self {
        Self { store, chat }
    }
}

#[async_trait]
impl IpcHandler for MessageHandler {
    #[instrument(skip(self, payload), fields(source = %source, is_main))]
    async fn handle(&self, payload: &IpcPayload, source: &GroupFolder, is_main: bool) -> Result<(), String> {
        let (chat_jid, text) = match payload {
            IpcPayload::Message { chat_jid, text } => (chat_jid, text),
            _ => return Err(ToolError::WrongPayload("message").into()),
        };

        if !is_main {
            let registered = self
                .store
                .list_registered_groups()
                .map_err(ToolError::from)?;
            let owns_chat = registered
                .iter()
                .any(|g| g.folder.as_str() == source.as_str() && g.jid.as_str() == chat_jid);
            if !owns_chat {
                return Err(ToolError::Unauthorized(format!(
                    "group {source} may not send to {chat_jid}"
                ))
                .into());
            }
        }

        self.chat
            .send(chat_jid, text)
            .await
            .map_err(ToolError::ChatSink)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use huddle_core::types::{Jid, RegisteredGroup};
    use std::sync::Mutex as StdMutex;

    struct FakeChat {
        sent: StdMutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ChatSink for FakeChat {
        async fn send(&self, jid: &str, text: &str) -> Result<(), String> {
            self.sent
                .lock()
                .unwrap()
                .push((jid.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn registered(folder: &str, jid: &str) -> RegisteredGroup {
        RegisteredGroup {
            jid: Jid::from(jid),
            name: "Acme".to_string(),
            folder: GroupFolder::from(folder),
            trigger: "@bot".to_string(),
            added_at: Utc::now(),
            extra_mounts: vec![],
        }
    }

    fn message_payload(jid: &str, text: &str) -> IpcPayload {
        IpcPayload::Message {
            chat_jid: jid.to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn own_group_may_message_its_own_chat() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.register_group(&registered("acme", "123@g.us")).unwrap();
        let chat = Arc::new(FakeChat {
            sent: StdMutex::new(vec![]),
        });
        let handler = MessageHandler::new(store, chat.clone());

        handler
            .handle(&message_payload("123@g.us", "hi"), &GroupFolder::from("acme"), false)
            .await
            .unwrap();

        assert_eq!(chat.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn non_main_cannot_message_a_chat_it_does_not_own() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.register_group(&registered("acme", "123@g.us")).unwrap();
        let chat = Arc::new(FakeChat {
            sent: StdMutex::new(vec![]),
        });
        let handler = MessageHandler::new(store, chat.clone());

        let result = handler
            .handle(&message_payload("999@g.us", "hi"), &GroupFolder::from("acme"), false)
            .await;

        assert!(result.is_err());
        assert!(chat.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn main_may_message_any_chat() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let chat = Arc::new(FakeChat {
            sent: StdMutex::new(vec![]),
        });
        let handler = MessageHandler::new(store, chat.clone());

        handler
            .handle(&message_payload("999@g.us", "hi"), &GroupFolder::from("main"), true)
            .await
            .unwrap();

        assert_eq!(chat.sent.lock().unwrap().len(), 1);
    }
}
