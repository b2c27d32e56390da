//! Concrete [`huddle_transport::Transport`]: a long-running subprocess that
//! speaks newline-delimited JSON on stdin/stdout. The chat protocol itself
//! (pairing, session crypto, reconnect handshakes) is out of scope here —
//! that lives entirely inside the bridge process this adapter launches and
//! supervises. Grounded on `huddle-runner::exec`'s spawn/drain shape, but
//! long-lived rather than one-shot: the child is kept around across calls
//! instead of being spawned per request.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use huddle_core::types::RegisteredGroup;
use huddle_store::Store;
use huddle_transport::jid::JidMap;
use huddle_transport::sync::{observe, RawInboundMessage};
use huddle_transport::{GroupInfo, Transport, TransportError, TransportStatus};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{error, info, warn};

/// One line written to the bridge's stdin: an outbound command.
#[derive(serde::Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeRequest<'a> {
    Send { jid: &'a str, text: &'a str },
    SetTyping { jid: &'a str, typing: bool },
    ListGroups,
}

/// One line read from the bridge's stdout: either an inbound chat event or
/// the reply to a previously issued `ListGroups` request.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeEvent {
    Message {
        jid: String,
        #[serde(rename = "displayName")]
        display_name: String,
        #[serde(rename = "senderName")]
        sender_name: String,
        #[serde(rename = "fromAssistant", default)]
        from_assistant: bool,
        content: String,
        #[serde(rename = "messageId")]
        message_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    ListGroupsResult {
        groups: Vec<GroupInfo>,
    },
    Status {
        connected: bool,
    },
}

struct Inner {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
}

type PendingListGroups = Arc<AsyncMutex<Option<oneshot::Sender<Vec<GroupInfo>>>>>;

/// Launches `program` once at [`Transport::connect`] and keeps talking to it
/// for the life of the process.
pub struct BridgeTransport {
    program: String,
    args: Vec<String>,
    store: Arc<Store>,
    jid_map: Arc<JidMap>,
    inner: AsyncMutex<Inner>,
    status: Arc<StdMutex<TransportStatus>>,
    pending_list_groups: PendingListGroups,
}

impl BridgeTransport {
    pub fn new(program: String, args: Vec<String>, store: Arc<Store>, jid_map: Arc<JidMap>) -> Self {
        Self {
            program,
            args,
            store,
            jid_map,
            inner: AsyncMutex::new(Inner {
                child: None,
                stdin: None,
            }),
            status: Arc::new(StdMutex::new(TransportStatus::Disconnected)),
            pending_list_groups: Arc::new(AsyncMutex::new(None)),
        }
    }

    fn set_status(&self, status: TransportStatus) {
        *self.status.lock().unwrap() = status;
    }

    async fn write_request(&self, req: &BridgeRequest<'_>) -> Result<(), TransportError> {
        let mut line = serde_json::to_string(req).map_err(|e| TransportError::SendFailed(e.to_string()))?;
        line.push('\n');
        let mut guard = self.inner.lock().await;
        let stdin = guard
            .stdin
            .as_mut()
            .ok_or_else(|| TransportError::SendFailed("bridge not connected".to_string()))?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        Ok(())
    }

    fn spawn_reader(&self, stdout: tokio::process::ChildStdout) {
        let store = self.store.clone();
        let jid_map = self.jid_map.clone();
        let pending = self.pending_list_groups.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if let Err(e) = handle_event(&line, &store, &jid_map, &pending).await {
                            warn!(error = %e, "failed to handle bridge event");
                        }
                    }
                    Ok(None) => {
                        warn!("bridge stdout closed");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "error reading bridge stdout");
                        break;
                    }
                }
            }
        });
    }
}

#[async_trait]
impl Transport for BridgeTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.set_status(TransportStatus::Connecting);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::ConnectionFailed("bridge has no stdout".to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::ConnectionFailed("bridge has no stdin".to_string()))?;

        {
            let mut guard = self.inner.lock().await;
            guard.child = Some(child);
            guard.stdin = Some(stdin);
        }

        self.set_status(TransportStatus::Connected);
        self.spawn_reader(stdout);
        info!(program = %self.program, "bridge transport connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut guard = self.inner.lock().await;
        guard.stdin = None;
        if let Some(mut child) = guard.child.take() {
            let _ = child.kill().await;
        }
        self.set_status(TransportStatus::Disconnected);
        Ok(())
    }

    async fn send(&self, jid: &str, text: &str) -> Result<(), TransportError> {
        self.write_request(&BridgeRequest::Send { jid, text }).await
    }

    async fn set_typing(&self, jid: &str, typing: bool) -> Result<(), TransportError> {
        self.write_request(&BridgeRequest::SetTyping { jid, typing }).await
    }

    async fn list_groups(&self) -> Result<Vec<GroupInfo>, TransportError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending_list_groups.lock().await;
            *pending = Some(tx);
        }
        self.write_request(&BridgeRequest::ListGroups).await?;
        rx.await
            .map_err(|_| TransportError::SendFailed("bridge closed before replying to list_groups".to_string()))
    }

    fn status(&self) -> TransportStatus {
        self.status.lock().unwrap().clone()
    }
}

async fn handle_event(
    line: &str,
    store: &Arc<Store>,
    jid_map: &Arc<JidMap>,
    pending: &PendingListGroups,
) -> Result<(), String> {
    let event: BridgeEvent = serde_json::from_str(line).map_err(|e| e.to_string())?;
    match event {
        BridgeEvent::Message {
            jid,
            display_name,
            sender_name,
            from_assistant,
            content,
            message_id,
            timestamp,
        } => {
            let registered: Vec<RegisteredGroup> = store.list_registered_groups().map_err(|e| e.to_string())?;
            observe(
                store,
                jid_map,
                &registered,
                RawInboundMessage {
                    jid,
                    display_name,
                    sender_name,
                    from_assistant,
                    content,
                    message_id,
                    timestamp,
                },
            )
            .map_err(|e| e.to_string())?;
            Ok(())
        }
        BridgeEvent::ListGroupsResult { groups } => {
            if let Some(tx) = pending.lock().await.take() {
                let _ = tx.send(groups);
            }
            Ok(())
        }
        BridgeEvent::Status { connected } => {
            info!(connected, "bridge reported status change");
            Ok(())
        }
    }
}
