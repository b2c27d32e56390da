//! Chat/message persistence policy for inbound transport events
//! (spec.md §4.2): every observed chat's metadata is persisted, but full
//! message bodies are stored only for registered groups — unregistered
//! chats stay discoverable by metadata alone.

use huddle_core::types::{Chat, Jid, Message, RegisteredGroup};
use huddle_store::Store;

use crate::error::Result;
use crate::jid::JidMap;

/// One inbound event as reported by the transport, before normalization.
pub struct RawInboundMessage {
    pub jid: String,
    pub display_name: String,
    pub sender_name: String,
    pub from_assistant: bool,
    pub content: String,
    pub message_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Normalize, persist chat metadata, and persist the message body if (and
/// only if) `jid` names a registered group. Returns the canonical `Jid`.
pub fn observe(
    store: &Store,
    jid_map: &JidMap,
    registered: &[RegisteredGroup],
    raw: RawInboundMessage,
) -> Result<Jid> {
    let canonical = jid_map.normalize(&raw.jid);
    let jid = Jid::from(canonical);

    store.upsert_chat(&Chat {
        jid: jid.clone(),
        display_name: raw.display_name,
        last_message_time: raw.timestamp,
    })?;

    let is_registered = registered.iter().any(|g| g.jid == jid);
    if is_registered {
        store.store_message(&Message {
            id: raw.message_id,
            chat_jid: jid.clone(),
            sender_name: raw.sender_name,
            from_assistant: raw.from_assistant,
            content: raw.content,
            timestamp: raw.timestamp,
        })?;
    }

    Ok(jid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_chat_gets_metadata_but_no_message_body() {
        let store = Store::open_in_memory().unwrap();
        let jid_map = JidMap::new();
        let now = chrono::Utc::now();

        let jid = observe(
            &store,
            &jid_map,
            &[],
            RawInboundMessage {
                jid: "999@g.us".to_string(),
                display_name: "Random Group".to_string(),
                sender_name: "alice".to_string(),
                from_assistant: false,
                content: "hi".to_string(),
                message_id: "m1".to_string(),
                timestamp: now,
            },
        )
        .unwrap();

        assert_eq!(jid.as_str(), "999@g.us");
        assert_eq!(store.list_chats().unwrap().len(), 1);
        let msgs = store
            .get_messages_since(&jid, now - chrono::Duration::seconds(1), &[])
            .unwrap();
        assert!(msgs.is_empty());
    }

    #[test]
    fn registered_chat_persists_message_body() {
        let store = Store::open_in_memory().unwrap();
        let jid_map = JidMap::new();
        let now = chrono::Utc::now();
        let jid = Jid::from("123@g.us");
        let group = RegisteredGroup {
            jid: jid.clone(),
            name: "Team".to_string(),
            folder: huddle_core::types::GroupFolder::from("team"),
            trigger: "@Alfred".to_string(),
            added_at: now,
            extra_mounts: vec![],
        };

        observe(
            &store,
            &jid_map,
            &[group],
            RawInboundMessage {
                jid: "123@g.us".to_string(),
                display_name: "Team".to_string(),
                sender_name: "bob".to_string(),
                from_assistant: false,
                content: "hello".to_string(),
                message_id: "m2".to_string(),
                timestamp: now,
            },
        )
        .unwrap();

        let msgs = store
            .get_messages_since(&jid, now - chrono::Duration::seconds(1), &[])
            .unwrap();
        assert_eq!(msgs.len(), 1);
    }
}
