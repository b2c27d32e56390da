use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use huddle_core::types::Jid;
use huddle_store::Store;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::context::{build_context_window, build_knowledge_base_block};
use crate::ports::{ChatSink, ContainerRunner, KnowledgeBase};
use crate::trigger::matches_trigger;
use crate::urls::{extract_urls, looks_like_question};

const LAST_GLOBAL_TS_MARKER: &str = "last_global_ts";

/// Polls the store for newly observed messages and drives them through
/// trigger filtering, KB ingest, context assembly, and a Container Runner
/// invocation (spec.md §4.3).
pub struct IntakeLoop {
    store: Arc<Store>,
    runner: Arc<dyn ContainerRunner>,
    kb: Arc<dyn KnowledgeBase>,
    chat: Arc<dyn ChatSink>,
    assistant_name: String,
    bot_prefixes: Vec<String>,
    poll_interval: Duration,
    last_agent_ts: DashMap<Jid, chrono::DateTime<chrono::Utc>>,
    guard: huddle_transport::StartGuard,
}

impl IntakeLoop {
    pub fn new(
        store: Arc<Store>,
        runner: Arc<dyn ContainerRunner>,
        kb: Arc<dyn KnowledgeBase>,
        chat: Arc<dyn ChatSink>,
        assistant_name: String,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            runner,
            kb,
            chat,
            bot_prefixes: vec![assistant_name.clone()],
            assistant_name,
            poll_interval,
            last_agent_ts: DashMap::new(),
            guard: huddle_transport::StartGuard::new(),
        }
    }

    /// Runs until `shutdown` signals true. Guarded against being started
    /// twice concurrently (spec.md §4.2's duplicate-start requirement
    /// applies to every long-running loop, not just the transport).
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if !self.guard.try_start() {
            warn!("intake loop already running, refusing duplicate start");
            return;
        }
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "intake tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("intake loop shutting down");
                        break;
                    }
                }
            }
        }
        self.guard.reset();
    }

    #[instrument(skip(self))]
    async fn tick(&self) -> crate::error::Result<()> {
        let since = self.last_global_ts()?;
        let registered = self.store.list_registered_groups()?;
        if registered.is_empty() {
            return Ok(());
        }
        let jids: Vec<Jid> = registered.iter().map(|g| g.jid.clone()).collect();
        let messages = self
            .store
            .get_new_messages(&jids, since, &self.bot_prefixes)?;

        for m in messages {
            let group = match registered.iter().find(|g| g.jid == m.chat_jid) {
                Some(g) => g,
                None => {
                    self.advance_global_ts(m.timestamp)?;
                    continue;
                }
            };

            if !group.is_main() && !matches_trigger(&group.trigger, &m.content) {
                debug!(jid = %m.chat_jid, "message did not match trigger, ignoring");
                self.advance_global_ts(m.timestamp)?;
                continue;
            }

            for url in extract_urls(&m.content) {
                let kb = Arc::clone(&self.kb);
                let folder = group.folder.clone();
                tokio::spawn(async move {
                    if let Err(e) = kb.ingest_url(&folder, &url).await {
                        warn!(url, error = %e, "fire-and-forget KB ingest failed");
                    }
                });
            }

            let agent_since = self
                .last_agent_ts
                .get(&m.chat_jid)
                .map(|v| *v)
                .unwrap_or(m.timestamp - chrono::Duration::days(1));
            let window_messages = self.store.get_messages_since(
                &m.chat_jid,
                agent_since,
                &self.bot_prefixes,
            )?;
            let mut prompt = build_context_window(&window_messages);

            if looks_like_question(&m.content) {
                if let Ok(hits) = self.kb.search(&group.folder, &m.content).await {
                    if !hits.is_empty() {
                        let snippets: Vec<String> = hits.into_iter().map(|h| h.content).collect();
                        prompt = format!("{}\n{}", build_knowledge_base_block(&snippets), prompt);
                    }
                }
            }

            let _ = self.chat.set_typing(m.chat_jid.as_str(), true).await;
            let run_result = self
                .runner
                .run(&group.folder, &m.chat_jid, group.is_main(), &prompt)
                .await;
            let _ = self.chat.set_typing(m.chat_jid.as_str(), false).await;

            match run_result {
                Ok(reply) => {
                    let prefixed = format!("{}: {}", self.assistant_name, reply);
                    if let Err(e) = self.chat.send(m.chat_jid.as_str(), &prefixed).await {
                        error!(error = %e, jid = %m.chat_jid, "failed to send reply, stopping batch");
                        break;
                    }
                    self.last_agent_ts.insert(m.chat_jid.clone(), m.timestamp);
                    self.advance_global_ts(m.timestamp)?;
                }
                Err(e) => {
                    error!(error = %e, jid = %m.chat_jid, "container run failed, stopping batch for retry");
                    break;
                }
            }
        }

        Ok(())
    }

    fn last_global_ts(&self) -> crate::error::Result<chrono::DateTime<chrono::Utc>> {
        Ok(self
            .store
            .get_marker(LAST_GLOBAL_TS_MARKER)?
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|| chrono::DateTime::from_timestamp(0, 0).unwrap()))
    }

    fn advance_global_ts(&self, ts: chrono::DateTime<chrono::Utc>) -> crate::error::Result<()> {
        self.store.set_marker(LAST_GLOBAL_TS_MARKER, &ts.to_rfc3339())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use huddle_core::types::{Chat, GroupFolder, KbSearchHit, Message, RegisteredGroup};
    use std::sync::Mutex as StdMutex;

    struct FakeRunner {
        reply: String,
    }

    #[async_trait]
    impl ContainerRunner for FakeRunner {
        async fn run(
            &self,
            _group_folder: &GroupFolder,
            _chat_jid: &Jid,
            _is_main: bool,
            _prompt: &str,
        ) -> Result<String, String> {
            Ok(self.reply.clone())
        }
    }

    struct FakeKb;

    #[async_trait]
    impl KnowledgeBase for FakeKb {
        async fn ingest_url(&self, _folder: &GroupFolder, _url: &str) -> Result<(), String> {
            Ok(())
        }
        async fn search(
            &self,
            _folder: &GroupFolder,
            _query: &str,
        ) -> Result<Vec<KbSearchHit>, String> {
            Ok(vec![])
        }
    }

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
        async fn set_typing(&self, _jid: &str, _typing: bool) -> Result<(), String> {
            Ok(())
        }
    }

    fn make_loop(store: Arc<Store>, reply: &str) -> (Arc<IntakeLoop>, Arc<FakeChat>) {
        let chat = Arc::new(FakeChat {
            sent: StdMutex::new(vec![]),
        });
        let loop_ = Arc::new(IntakeLoop::new(
            store,
            Arc::new(FakeRunner {
                reply: reply.to_string(),
            }),
            Arc::new(FakeKb),
            chat.clone(),
            "Huddle".to_string(),
            Duration::from_millis(10),
        ));
        (loop_, chat)
    }

    #[tokio::test]
    async fn ignores_messages_from_unregistered_chats() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let now = chrono::Utc::now();
        store
            .upsert_chat(&Chat {
                jid: Jid::from("999@g.us"),
                display_name: "Unknown".into(),
                last_message_time: now,
            })
            .unwrap();
        store
            .store_message(&Message {
                id: "m1".into(),
                chat_jid: Jid::from("999@g.us"),
                sender_name: "alice".into(),
                from_assistant: false,
                content: "hello".into(),
                timestamp: now,
            })
            .unwrap();

        let (loop_, chat) = make_loop(store, "ok");
        loop_.tick().await.unwrap();
        assert!(chat.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn main_group_bypasses_trigger_gate() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let now = chrono::Utc::now();
        let jid = Jid::from("1@g.us");
        store
            .register_group(&RegisteredGroup {
                jid: jid.clone(),
                name: "Main".into(),
                folder: GroupFolder::main(),
                trigger: "@Alfred".into(),
                added_at: now,
                extra_mounts: vec![],
            })
            .unwrap();
        store
            .store_message(&Message {
                id: "m1".into(),
                chat_jid: jid.clone(),
                sender_name: "alice".into(),
                from_assistant: false,
                content: "no trigger here".into(),
                timestamp: now,
            })
            .unwrap();

        let (loop_, chat) = make_loop(store, "done");
        loop_.tick().await.unwrap();
        assert_eq!(chat.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn non_main_group_requires_trigger() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let now = chrono::Utc::now();
        let jid = Jid::from("2@g.us");
        store
            .register_group(&RegisteredGroup {
                jid: jid.clone(),
                name: "Team".into(),
                folder: GroupFolder::from("team"),
                trigger: "@Alfred".into(),
                added_at: now,
                extra_mounts: vec![],
            })
            .unwrap();
        store
            .store_message(&Message {
                id: "m1".into(),
                chat_jid: jid.clone(),
                sender_name: "alice".into(),
                from_assistant: false,
                content: "no trigger here".into(),
                timestamp: now,
            })
            .unwrap();

        let (loop_, chat) = make_loop(store, "done");
        loop_.tick().await.unwrap();
        assert!(chat.sent.lock().unwrap().is_empty());
    }
}
