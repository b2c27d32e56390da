//! `github_pr`/`github_issue`/`sugar_deploy`/`sugar_status` — external CLI
//! wrappers. Reuses `huddle-runner::exec_bounded` (spec.md §4.8's
//! "reuse the bounded-exec primitive" requirement) instead of spawning its
//! own subprocess path.
//!
//! Grounded on `skynet-agent/src/tools/execute_command.rs`'s argv-only
//! execution and fixed timeout; restricted to `main` since, unlike
//! `ExecuteCommandTool`'s per-call safety-checker, there is no per-group
//! allowlist of CLI projects wired up yet (see DESIGN.md).

use std::sync::Arc;

use async_trait::async_trait;
use huddle_core::types::GroupFolder;
use huddle_ipc::{IpcHandler, IpcPayload};
use huddle_runner::exec_bounded;
use tracing::instrument;

use crate::error::ToolError;
use crate::ports::ChatSink;

/// External CLI run timeout (spec.md §5: "CLI 30s").
const CLI_TIMEOUT_SECS: u64 = 30;
const CLI_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Shared machinery for the four `github_*`/`sugar_*` handlers: resolve the
/// reply destination from the caller's own registration, run the declared
/// program with the payload's argv, and send stdout back.
pub struct ExternalCliHandler {
    program: &'static str,
    type_name: &'static str,
    store: Arc<huddle_store::Store>,
    chat: Arc<dyn ChatSink>,
}

impl ExternalCliHandler {
    pub fn new(
        program: &'static str,
        type_name: &'static str,
        store: Arc<huddle_store::Store>,
        chat: Arc<dyn ChatSink>,
    ) -> Self {
        Self {
            program,
            type_name,
            store,
            chat,
        }
    }

    fn extract_args<'a>(&self, payload: &'a IpcPayload) -> Result<&'a [String], ToolError> {
        match payload {
            IpcPayload::GithubPr { args }
            | IpcPayload::GithubIssue { args }
            | IpcPayload::SugarDeploy { args }
            | IpcPayload::SugarStatus { args } => Ok(args.as_slice()),
            _ => Err(ToolError::WrongPayload(self.type_name)),
        }
    }
}

#[async_trait]
impl IpcHandler for ExternalCliHandler {
    #[instrument(skip(self, payload), fields(program = self.program, source = %source))]
    async fn handle(&self, payload: &IpcPayload, source: &GroupFolder, is_main: bool) -> Result<(), String> {
        if !is_main {
            return Err(ToolError::Unauthorized(format!("{} is restricted to the main group", self.type_name)).into());
        }
        let args = self.extract_args(payload)?.to_vec();

        let output = exec_bounded(self.program, &args, None, CLI_TIMEOUT_SECS, CLI_MAX_OUTPUT_BYTES)
            .await
            .map_err(ToolError::from)?;

        let reply = if output.exit_code == 0 {
            String::from_utf8_lossy(&output.stdout).into_owned()
        } else {
            format!(
                "{} exited with code {}: {}",
                self.program,
                output.exit_code,
                String::from_utf8_lossy(&output.stderr)
            )
        };

        let group = self
            .store
            .list_registered_groups()
            .map_err(ToolError::from)?
            .into_iter()
            .find(|g| g.folder.as_str() == source.as_str())
            .ok_or_else(|| ToolError::NotFound(format!("group {source} is not registered")))?;

        self.chat
            .send(group.jid.as_str(), &reply)
            .await
            .map_err(ToolError::ChatSink)?;

        if output.exit_code != 0 {
            return Err(ToolError::InvalidPayload(format!("{} exited non-zero", self.program)).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
            added_at: chrono::Utc::now(),
            extra_mounts: vec![],
        }
    }

    #[tokio::test]
    async fn non_main_caller_is_rejected() {
        let store = Arc::new(huddle_store::Store::open_in_memory().unwrap());
        let chat = Arc::new(FakeChat {
            sent: StdMutex::new(vec![]),
        });
        let handler = ExternalCliHandler::new("echo", "github_pr", store, chat);

        let result = handler
            .handle(
                &IpcPayload::GithubPr { args: vec![] },
                &GroupFolder::from("acme"),
                false,
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn wrong_payload_type_is_rejected() {
        let store = Arc::new(huddle_store::Store::open_in_memory().unwrap());
        let chat = Arc::new(FakeChat {
            sent: StdMutex::new(vec![]),
        });
        let handler = ExternalCliHandler::new("echo", "github_pr", store, chat);

        let result = handler
            .handle(&IpcPayload::KbList, &GroupFolder::from("main"), true)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn runs_declared_program_and_replies_to_the_caller_group() {
        let store = Arc::new(huddle_store::Store::open_in_memory().unwrap());
        store.register_group(&registered("main", "1@g.us")).unwrap();
        let chat = Arc::new(FakeChat {
            sent: StdMutex::new(vec![]),
        });
        let handler = ExternalCliHandler::new("echo", "github_pr", store, chat.clone());

        handler
            .handle(
                &IpcPayload::GithubPr {
                    args: vec!["hello".to_string()],
                },
                &GroupFolder::from("main"),
                true,
            )
            .await
            .unwrap();

        let sent = chat.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "1@g.us");
        assert_eq!(sent[0].1.trim(), "hello");
    }
}
