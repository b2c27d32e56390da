//! Polls `ipc/<group>/{messages,tasks}/*.json`, authorizes by source
//! directory, dispatches to a registered handler, and quarantines anything
//! that fails to parse or handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use huddle_core::types::GroupFolder;
use huddle_store::Store;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::error::Result;
use crate::handler::HandlerRegistry;
use crate::payload::Envelope;

const SUBDIRS: [&str; 2] = ["messages", "tasks"];

pub struct IpcBroker {
    store: Arc<Store>,
    ipc_root: PathBuf,
    registry: Arc<HandlerRegistry>,
    poll_interval: Duration,
    guard: huddle_transport::StartGuard,
}

impl IpcBroker {
    pub fn new(
        store: Arc<Store>,
        ipc_root: impl Into<PathBuf>,
        registry: Arc<HandlerRegistry>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            ipc_root: ipc_root.into(),
            registry,
            poll_interval,
            guard: huddle_transport::StartGuard::new(),
        }
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if !self.guard.try_start() {
            warn!("ipc broker already running, refusing duplicate start");
            return;
        }
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "ipc broker tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("ipc broker shutting down");
                        break;
                    }
                }
            }
        }
        self.guard.reset();
    }

    #[instrument(skip(self))]
    async fn tick(&self) -> Result<()> {
        let registered = self.store.list_registered_groups()?;
        let Ok(mut group_dirs) = tokio::fs::read_dir(&self.ipc_root).await else {
            return Ok(());
        };

        while let Some(entry) = group_dirs.next_entry().await? {
            let file_type = entry.file_type().await?;
            if !file_type.is_dir() {
                continue;
            }
            let source_name = entry.file_name().to_string_lossy().into_owned();
            if source_name == "errors" {
                continue;
            }
            let source = GroupFolder::from(source_name.as_str());
            let is_registered = source.is_main()
                || registered.iter().any(|g| g.folder.as_str() == source.as_str());
            if !is_registered {
                debug!(source = %source, "ipc source directory has no registered group, skipping");
                continue;
            }

            for subdir in SUBDIRS {
                self.drain_subdir(&entry.path().join(subdir), &source).await?;
            }
        }

        Ok(())
    }

    async fn drain_subdir(&self, dir: &Path, source: &GroupFolder) -> Result<()> {
        let Ok(mut files) = tokio::fs::read_dir(dir).await else {
            return Ok(());
        };

        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            self.process_file(&path, source).await?;
        }

        Ok(())
    }

    #[instrument(skip(self, path), fields(source = %source, file = %path.display()))]
    async fn process_file(&self, path: &Path, source: &GroupFolder) -> Result<()> {
        let is_main = source.is_main();
        let raw = tokio::fs::read_to_string(path).await?;

        let envelope: Envelope = match serde_json::from_str(&raw) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "ipc payload failed to parse, quarantining");
                self.quarantine(path, source).await?;
                return Ok(());
            }
        };

        let type_name = envelope.payload.type_name();
        let Some(handler) = self.registry.get(type_name) else {
            warn!(type_name, "no handler registered for ipc payload type, quarantining");
            self.quarantine(path, source).await?;
            return Ok(());
        };

        match handler.handle(&envelope.payload, source, is_main).await {
            Ok(()) => {
                tokio::fs::remove_file(path).await?;
            }
            Err(e) => {
                error!(error = %e, type_name, "ipc handler failed, quarantining");
                self.quarantine(path, source).await?;
            }
        }

        Ok(())
    }

    async fn quarantine(&self, path: &Path, source: &GroupFolder) -> Result<()> {
        let errors_dir = self.ipc_root.join("errors");
        tokio::fs::create_dir_all(&errors_dir).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown.json".to_string());
        let dest = errors_dir.join(format!("{}-{}", source.as_str(), file_name));
        tokio::fs::rename(path, dest).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::IpcHandler;
    use crate::payload::IpcPayload;
    use async_trait::async_trait;
    use huddle_core::types::RegisteredGroup;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl IpcHandler for CountingHandler {
        async fn handle(
            &self,
            _payload: &IpcPayload,
            _source: &GroupFolder,
            _is_main: bool,
        ) -> std::result::Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err("boom".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn write_payload(dir: &Path, name: &str, json: serde_json::Value) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(name), serde_json::to_string(&json).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn successful_handling_deletes_the_file() {
        let tmp = tempfile_dir();
        let ipc_root = tmp.join("ipc");
        write_payload(
            &ipc_root.join("main/tasks"),
            "a.json",
            serde_json::json!({"type": "kb_list", "timestamp": "2026-01-01T00:00:00Z"}),
        );

        let store = Arc::new(Store::open_in_memory().unwrap());
        let registry = Arc::new(HandlerRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));
        registry.register(
            "kb_list",
            Arc::new(CountingHandler {
                calls: calls.clone(),
                fail: false,
            }),
        );

        let broker = IpcBroker::new(store, ipc_root.clone(), registry, Duration::from_secs(1));
        broker.tick().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!ipc_root.join("main/tasks/a.json").exists());
    }

    #[tokio::test]
    async fn handler_failure_quarantines_into_errors_dir() {
        let tmp = tempfile_dir();
        let ipc_root = tmp.join("ipc");
        write_payload(
            &ipc_root.join("main/tasks"),
            "b.json",
            serde_json::json!({"type": "kb_list", "timestamp": "2026-01-01T00:00:00Z"}),
        );

        let store = Arc::new(Store::open_in_memory().unwrap());
        let registry = Arc::new(HandlerRegistry::new());
        registry.register(
            "kb_list",
            Arc::new(CountingHandler {
                calls: Arc::new(AtomicUsize::new(0)),
                fail: true,
            }),
        );

        let broker = IpcBroker::new(store, ipc_root.clone(), registry, Duration::from_secs(1));
        broker.tick().await.unwrap();

        assert!(!ipc_root.join("main/tasks/b.json").exists());
        assert!(ipc_root.join("errors/main-b.json").exists());
    }

    #[tokio::test]
    async fn unregistered_source_directory_is_skipped() {
        let tmp = tempfile_dir();
        let ipc_root = tmp.join("ipc");
        write_payload(
            &ipc_root.join("rogue/tasks"),
            "c.json",
            serde_json::json!({"type": "kb_list", "timestamp": "2026-01-01T00:00:00Z"}),
        );

        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .register_group(&RegisteredGroup {
                jid: huddle_core::types::Jid::from("acme@g.us"),
                name: "Acme".to_string(),
                folder: GroupFolder::from("acme"),
                trigger: "@Alfred".to_string(),
                added_at: chrono::Utc::now(),
                extra_mounts: vec![],
            })
            .unwrap();
        let registry = Arc::new(HandlerRegistry::new());
        registry.register(
            "kb_list",
            Arc::new(CountingHandler {
                calls: Arc::new(AtomicUsize::new(0)),
                fail: false,
            }),
        );

        let broker = IpcBroker::new(store, ipc_root.clone(), registry, Duration::from_secs(1));
        broker.tick().await.unwrap();

        assert!(ipc_root.join("rogue/tasks/c.json").exists());
    }

    fn tempfile_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "huddle-ipc-test-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
