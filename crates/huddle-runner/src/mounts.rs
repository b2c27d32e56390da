//! Mount mediation: builds the fixed mount set for a group's sandbox and
//! filters caller-declared `extra_mounts` against an allowlist file that
//! lives outside the project root and is itself never mounted in.

use std::collections::HashSet;

use huddle_core::types::ExtraMount;
use serde::Deserialize;
use tracing::warn;

use crate::error::Result;
use crate::types::MountSpec;

pub const GROUP_MOUNT_PATH: &str = "/workspace/group";
pub const PROJECT_ROOT_MOUNT_PATH: &str = "/workspace/project";
pub const IPC_MOUNT_PATH: &str = "/workspace/ipc";

#[derive(Debug, Default, Deserialize)]
struct AllowlistFile {
    #[serde(default)]
    allowed_host_paths: Vec<String>,
}

/// Host paths an `extra_mounts` entry is permitted to reference, loaded
/// once at startup from a file outside the project root.
#[derive(Debug, Clone, Default)]
pub struct MountAllowlist {
    allowed: HashSet<String>,
}

impl MountAllowlist {
    pub fn load(path: &str) -> Result<Self> {
        if !std::path::Path::new(path).exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let parsed: AllowlistFile = serde_json::from_str(&raw)?;
        Ok(Self {
            allowed: parsed.allowed_host_paths.into_iter().collect(),
        })
    }

    pub fn is_allowed(&self, host_path: &str) -> bool {
        self.allowed
            .iter()
            .any(|prefix| host_path == prefix || host_path.starts_with(&format!("{prefix}/")))
    }
}

/// Builds the full mount list for one run: the group's own folder
/// read-write, the project root read-write for `main` only, a per-group IPC
/// directory, and any `extra_mounts` that pass the allowlist. Non-allowlisted
/// mounts are dropped and logged rather than failing the run — the caller
/// asked for something outside policy, not something malformed.
pub fn build_mounts(
    group_folder_host_path: &str,
    project_root_host_path: &str,
    ipc_host_path: &str,
    is_main: bool,
    extra_mounts: &[ExtraMount],
    allowlist: &MountAllowlist,
) -> Vec<MountSpec> {
    let mut mounts = vec![MountSpec {
        host_path: group_folder_host_path.to_string(),
        container_path: GROUP_MOUNT_PATH.to_string(),
        readonly: false,
    }];

    if is_main {
        mounts.push(MountSpec {
            host_path: project_root_host_path.to_string(),
            container_path: PROJECT_ROOT_MOUNT_PATH.to_string(),
            readonly: false,
        });
    }

    mounts.push(MountSpec {
        host_path: ipc_host_path.to_string(),
        container_path: IPC_MOUNT_PATH.to_string(),
        readonly: false,
    });

    for (i, extra) in extra_mounts.iter().enumerate() {
        if allowlist.is_allowed(&extra.host_path) {
            mounts.push(MountSpec {
                host_path: extra.host_path.clone(),
                container_path: extra.container_path.clone(),
                readonly: extra.readonly,
            });
        } else {
            warn!(
                host_path = %extra.host_path,
                "extra mount rejected: not present in mount allowlist"
            );
            let _ = i;
        }
    }

    mounts
}
