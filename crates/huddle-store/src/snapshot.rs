//! Snapshot files consumed by the sandboxed agent container (spec.md §6):
//! `available_groups.json` and `current_tasks.json`, written via a
//! `tmp`-then-`rename` so a reader never observes a half-written file.

use std::path::Path;

use huddle_core::types::GroupFolder;

use crate::error::Result;
use crate::types::{AvailableGroupEntry, AvailableGroupsSnapshot, CurrentTasksSnapshot};

/// Serialize `value` and atomically publish it at `path`.
pub fn write_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(value)?;
    std::fs::write(&tmp_path, body)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Build and publish `data/ipc/available_groups.json` from the current chat
/// and registration tables.
pub fn write_available_groups(store: &crate::Store, dir: &Path) -> Result<()> {
    let chats = store.list_chats()?;
    let registered: std::collections::HashSet<String> = store
        .list_registered_groups()?
        .into_iter()
        .map(|g| g.jid.as_str().to_string())
        .collect();

    let groups = chats
        .into_iter()
        .map(|c| AvailableGroupEntry {
            jid: c.jid.as_str().to_string(),
            name: c.display_name,
            last_activity: c.last_message_time,
            is_registered: registered.contains(c.jid.as_str()),
        })
        .collect();

    let snapshot = AvailableGroupsSnapshot {
        groups,
        last_sync: chrono::Utc::now(),
    };
    write_atomic(&dir.join("available_groups.json"), &snapshot)
}

/// Build and publish `data/ipc/current_tasks.json`, filtered by
/// authorization: `main` sees every task, any other group sees only its own.
pub fn write_current_tasks(
    store: &crate::Store,
    dir: &Path,
    requesting_folder: &GroupFolder,
) -> Result<()> {
    let tasks = if requesting_folder.is_main() {
        store.list_all_tasks()?
    } else {
        store.list_tasks_for_group(requesting_folder)?
    };
    write_atomic(&dir.join("current_tasks.json"), &CurrentTasksSnapshot(tasks))
}
