//! `register_group`/`refresh_groups` — group-admin operations, `main`-only.
//!
//! No direct teacher counterpart (the teacher has no notion of a privileged
//! control chat); grounded on the snapshot-writing shape in
//! `huddle-store::snapshot` and the transport's `list_groups` sync already
//! used by `huddle-intake`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use huddle_core::types::{Chat, GroupFolder, RegisteredGroup};
use huddle_ipc::{IpcHandler, IpcPayload};
use huddle_store::{snapshot, Store};
use tracing::{instrument, warn};

use crate::error::ToolError;
use crate::ports::ChatSink;

fn require_main(is_main: bool, type_name: &'static str) -> Result<(), ToolError> {
    if is_main {
        Ok(())
    } else {
        Err(ToolError::Unauthorized(format!("{type_name} is restricted to the main group")))
    }
}

/// What `refresh_groups` needs from the Transport Adapter to re-sync chat
/// metadata. Separate from [`ChatSink`] since `message` only ever sends.
#[async_trait]
pub trait GroupLister: Send + Sync {
    async fn list_groups(&self) -> Result<Vec<huddle_transport::GroupInfo>, String>;
}

pub struct RegisterGroupHandler {
    store: Arc<Store>,
    groups_dir: PathBuf,
}

impl RegisterGroupHandler {
    pub fn new(store: Arc<Store>, groups_dir: PathBuf) -> Self {
        Self { store, groups_dir }
    }
}

#[async_trait]
impl IpcHandler for RegisterGroupHandler {
    #[instrument(skip(self, payload))]
    async fn handle(&self, payload: &IpcPayload, _source: &GroupFolder, is_main: bool) -> Result<(), String> {
        require_main(is_main, "register_group")?;

        let (jid, name, folder, trigger, extra_mounts) = match payload {
            IpcPayload::RegisterGroup {
                jid,
                name,
                folder,
                trigger,
                extra_mounts,
            } => (jid, name, folder, trigger, extra_mounts),
            _ => return Err(ToolError::WrongPayload("register_group").into()),
        };

        let group = RegisteredGroup {
            jid: jid.as_str().into(),
            name: name.clone(),
            folder: GroupFolder::from(folder.clone()),
            trigger: trigger.clone(),
            added_at: chrono::Utc::now(),
            extra_mounts: extra_mounts.clone(),
        };

        std::fs::create_dir_all(self.groups_dir.join(folder)).map_err(ToolError::from)?;
        self.store.register_group(&group).map_err(ToolError::from)?;
        Ok(())
    }
}

pub struct RefreshGroupsHandler {
    store: Arc<Store>,
    transport: Arc<dyn GroupLister>,
    ipc_dir: PathBuf,
}

impl RefreshGroupsHandler {
    pub fn new(store: Arc<Store>, transport: Arc<dyn GroupLister>, ipc_dir: PathBuf) -> Self {
        Self {
            store,
            transport,
            ipc_dir,
        }
    }
}

#[async_trait]
impl IpcHandler for RefreshGroupsHandler {
    #[instrument(skip(self, payload))]
    async fn handle(&self, payload: &IpcPayload, _source: &GroupFolder, is_main: bool) -> Result<(), String> {
        require_main(is_main, "refresh_groups")?;
        if !matches!(payload, IpcPayload::RefreshGroups) {
            return Err(ToolError::WrongPayload("refresh_groups").into());
        }

        let groups = self.transport.list_groups().await.map_err(ToolError::ChatSink)?;
        let known_times: std::collections::HashMap<String, chrono::DateTime<chrono::Utc>> = self
            .store
            .list_chats()
            .map_err(ToolError::from)?
            .into_iter()
            .map(|c| (c.jid.as_str().to_string(), c.last_message_time))
            .collect();

        for g in &groups {
            let last_message_time = known_times
                .get(&g.jid)
                .copied()
                .unwrap_or_else(chrono::Utc::now);
            self.store
                .upsert_chat(&Chat {
                    jid: g.jid.as_str().into(),
                    display_name: g.name.clone(),
                    last_message_time,
                })
                .map_err(ToolError::from)?;
        }

        std::fs::create_dir_all(&self.ipc_dir).map_err(ToolError::from)?;
        snapshot::write_available_groups(&self.store, &self.ipc_dir).map_err(ToolError::from)?;

        for registered in self.store.list_registered_groups().map_err(ToolError::from)? {
            let group_dir = self.ipc_dir.join(registered.folder.as_str());
            if let Err(e) = std::fs::create_dir_all(&group_dir) {
                warn!(error = %e, folder = %registered.folder, "failed to create group ipc dir during refresh");
                continue;
            }
            if let Err(e) = snapshot::write_current_tasks(&self.store, &group_dir, &registered.folder) {
                warn!(error = %e, folder = %registered.folder, "failed to write current_tasks snapshot");
            }
        }

        Ok(())
    }
}
