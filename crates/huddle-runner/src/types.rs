//! Wire types for the Container Runner's stdin/stdout protocol and its
//! mount mediation.

use huddle_core::types::{ExtraMount, GroupFolder, Jid};
use serde::{Deserialize, Serialize};

/// One invocation of the sandbox process: everything a caller supplies.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub group_folder: GroupFolder,
    pub chat_jid: Jid,
    pub is_main: bool,
    pub prompt: String,
    /// Loaded by the caller from the sessions table; `None` starts fresh.
    pub session_id: Option<String>,
    /// Caller-declared extra mounts; filtered against the allowlist before
    /// being handed to the sandbox.
    pub extra_mounts: Vec<ExtraMount>,
}

/// Written to the sandbox process's stdin as a single JSON line.
#[derive(Debug, Serialize)]
pub struct ContainerRequest<'a> {
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<&'a str>,
    pub group_folder: &'a str,
    pub chat_jid: &'a str,
    pub is_main: bool,
}

/// Parsed from the sandbox process's single-line stdout response.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerResponse {
    pub status: ContainerStatus,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub new_session_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Ok,
    Error,
}

/// Successful outcome of a run: the agent's reply text, and a new session id
/// if the agent started or continued one.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub result: String,
    pub new_session_id: Option<String>,
}

/// One mount passed to the sandbox process's launch argv.
#[derive(Debug, Clone)]
pub struct MountSpec {
    pub host_path: String,
    pub container_path: String,
    pub readonly: bool,
}
