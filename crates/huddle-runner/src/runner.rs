//! The sandbox process launcher: argv-built mount mediation, bounded output
//! capture with kill-on-oversize, and per-group exclusivity.
//!
//! Grounded on `TerminalManager::exec`'s spawn+race-timeout+SIGKILL-by-pid
//! shape, but the output path can't reuse `wait_with_output` — the contract
//! here requires killing the child mid-stream once it exceeds the output
//! cap, not truncating after the fact. The actual spawn/drain/kill
//! mechanics live in `exec::exec_bounded`, shared with plain argv-style CLI
//! wrappers elsewhere in the workspace.

use std::sync::Arc;

use dashmap::DashMap;
use huddle_core::types::GroupFolder;
use tokio::sync::Mutex as AsyncMutex;
use tracing::instrument;

use crate::error::{Result, RunnerError};
use crate::exec::exec_bounded;
use crate::mounts::{build_mounts, MountAllowlist};
use crate::types::{
    ContainerRequest, ContainerResponse, ContainerStatus, MountSpec, RunOutcome, RunRequest,
};

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub image_tag: String,
    pub timeout_secs: u64,
    pub memory_mb: u64,
    pub max_output_bytes: usize,
    pub project_root: String,
    pub groups_dir: String,
    pub ipc_dir: String,
}

/// Launches the sandbox container image via argv (never shell string
/// interpolation) and serializes runs per group behind an in-process lock.
pub struct Runner {
    config: RunnerConfig,
    allowlist: MountAllowlist,
    locks: DashMap<GroupFolder, Arc<AsyncMutex<()>>>,
}

impl Runner {
    pub fn new(config: RunnerConfig, allowlist: MountAllowlist) -> Self {
        Self {
            config,
            allowlist,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, folder: &GroupFolder) -> Arc<AsyncMutex<()>> {
        self.locks
            .entry(folder.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    #[instrument(skip(self, req), fields(folder = %req.group_folder, chat = %req.chat_jid, is_main = req.is_main))]
    pub async fn run(&self, req: RunRequest) -> Result<RunOutcome> {
        let lock = self.lock_for(&req.group_folder);
        let _guard = lock.lock().await;

        let group_host_path = format!("{}/{}", self.config.groups_dir, req.group_folder.as_str());
        let ipc_host_path = format!("{}/{}", self.config.ipc_dir, req.group_folder.as_str());
        let mounts = build_mounts(
            &group_host_path,
            &self.config.project_root,
            &ipc_host_path,
            req.is_main,
            &req.extra_mounts,
            &self.allowlist,
        );

        let request_line = serde_json::to_string(&ContainerRequest {
            prompt: &req.prompt,
            session_id: req.session_id.as_deref(),
            group_folder: req.group_folder.as_str(),
            chat_jid: req.chat_jid.as_str(),
            is_main: req.is_main,
        })?;

        let args = build_argv(&self.config, &mounts);

        let output = exec_bounded(
            "docker",
            &args,
            Some(&request_line),
            self.config.timeout_secs,
            self.config.max_output_bytes,
        )
        .await?;

        if output.exit_code != 0 {
            return Err(RunnerError::ExitError {
                code: output.exit_code,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let line = String::from_utf8_lossy(&output.stdout);
        let response: ContainerResponse =
            serde_json::from_str(line.trim()).map_err(|e| RunnerError::InvalidResponse(e.to_string()))?;

        match response.status {
            ContainerStatus::Ok => Ok(RunOutcome {
                result: response.result.unwrap_or_default(),
                new_session_id: response.new_session_id,
            }),
            ContainerStatus::Error => Err(RunnerError::AgentError(
                response.error.unwrap_or_else(|| "unknown agent error".to_string()),
            )),
        }
    }
}

fn build_argv(config: &RunnerConfig, mounts: &[MountSpec]) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--rm".to_string(),
        "-i".to_string(),
        "--memory".to_string(),
        format!("{}m", config.memory_mb),
    ];
    for m in mounts {
        let mode = if m.readonly { "ro" } else { "rw" };
        args.push("-v".to_string());
        args.push(format!("{}:{}:{mode}", m.host_path, m.container_path));
    }
    args.push(config.image_tag.clone());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mounts::MountAllowlist;

    fn sample_config() -> RunnerConfig {
        RunnerConfig {
            image_tag: "huddle-agent:latest".to_string(),
            timeout_secs: 300,
            memory_mb: 2048,
            max_output_bytes: 1024,
            project_root: "/proj".to_string(),
            groups_dir: "/data/groups".to_string(),
            ipc_dir: "/data/ipc".to_string(),
        }
    }

    #[test]
    fn argv_includes_memory_limit_and_image_tag() {
        let config = sample_config();
        let mounts = vec![MountSpec {
            host_path: "/data/groups/acme".to_string(),
            container_path: "/workspace/group".to_string(),
            readonly: false,
        }];
        let args = build_argv(&config, &mounts);
        assert!(args.contains(&"--memory".to_string()));
        assert!(args.contains(&"2048m".to_string()));
        assert_eq!(args.last().unwrap(), &config.image_tag);
        assert!(args.iter().any(|a| a == "/data/groups/acme:/workspace/group:rw"));
    }

    #[test]
    fn runner_constructs_with_default_allowlist() {
        let _runner = Runner::new(sample_config(), MountAllowlist::default());
    }
}
