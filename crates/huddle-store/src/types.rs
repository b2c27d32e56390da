use serde::{Deserialize, Serialize};

/// One entry of `data/ipc/available_groups.json` (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableGroupEntry {
    pub jid: String,
    pub name: String,
    pub last_activity: chrono::DateTime<chrono::Utc>,
    pub is_registered: bool,
}

/// `data/ipc/available_groups.json` snapshot body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableGroupsSnapshot {
    pub groups: Vec<AvailableGroupEntry>,
    pub last_sync: chrono::DateTime<chrono::Utc>,
}

/// `data/ipc/current_tasks.json` snapshot body: tasks visible to the
/// requesting group, filtered by authorization (`main` sees all others see
/// only their own, per spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentTasksSnapshot(pub Vec<huddle_core::types::Task>);
