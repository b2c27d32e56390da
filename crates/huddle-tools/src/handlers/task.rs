//! `schedule_task`/`pause_task`/`resume_task`/`cancel_task` — scheduled-run
//! CRUD over `huddle-store`'s `tasks` table.
//!
//! Grounded on `skynet-agent/src/tools/reminder.rs`'s `ReminderAction`
//! schedule-CRUD shape, adapted from a single multi-action tool into one
//! `IpcHandler` per action since dispatch here happens by wire `type`, not
//! by an LLM-chosen action field.

use std::sync::Arc;

use async_trait::async_trait;
use huddle_core::types::{ContextMode, GroupFolder, Task, TaskStatus};
use huddle_ipc::{IpcHandler, IpcPayload};
use huddle_scheduler::compute_next_run;
use huddle_store::Store;
use tracing::instrument;
use uuid::Uuid;

use crate::error::ToolError;

/// `schedule_task` — resolves the firing `chat_jid` from the source group's
/// own registration; the payload never names a target jid or group.
pub struct ScheduleTaskHandler {
    store: Arc<Store>,
}

impl ScheduleTaskHandler {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IpcHandler for ScheduleTaskHandler {
    #[instrument(skip(self, payload), fields(source = %source))]
    async fn handle(&self, payload: &IpcPayload, source: &GroupFolder, _is_main: bool) -> Result<(), String> {
        let (prompt, schedule_type, schedule_value, timezone, context_mode) = match payload {
            IpcPayload::ScheduleTask {
                prompt,
                schedule_type,
                schedule_value,
                timezone,
                context_mode,
            } => (prompt, *schedule_type, schedule_value, timezone, *context_mode),
            _ => return Err(ToolError::WrongPayload("schedule_task").into()),
        };

        let group = self
            .store
            .list_registered_groups()
            .map_err(ToolError::from)?
            .into_iter()
            .find(|g| g.folder.as_str() == source.as_str())
            .ok_or_else(|| ToolError::NotFound(format!("group {source} is not registered")))?;

        let mut task = Task {
            id: Uuid::new_v4().to_string(),
            group_folder: source.clone(),
            chat_jid: group.jid,
            prompt: prompt.clone(),
            schedule_type,
            schedule_value: schedule_value.clone(),
            timezone: timezone.clone(),
            context_mode,
            next_run: None,
            status: TaskStatus::Active,
            created_at: chrono::Utc::now(),
        };
        task.next_run = compute_next_run(&task, chrono::Utc::now())
            .map_err(|e| ToolError::InvalidPayload(e.to_string()))?;

        self.store.create_task(&task).map_err(ToolError::from)?;
        Ok(())
    }
}

/// Shared scoping rule for `pause_task`/`resume_task`/`cancel_task`: the
/// task's owning group must match the source unless the caller is `main`.
fn authorize_task(task: &Task, source: &GroupFolder, is_main: bool) -> Result<(), ToolError> {
    if is_main || task.group_folder.as_str() == source.as_str() {
        Ok(())
    } else {
        Err(ToolError::Unauthorized(format!(
            "group {source} may not modify task owned by {}",
            task.group_folder
        )))
    }
}

macro_rules! task_status_handler {
    ($name:ident, $payload_variant:ident, $type_name:literal, $target_status:expr) => {
        #[doc = concat!("`", $type_name, "` — mutates a task's status; scoped to the caller's own tasks unless `is_main`.")]
        pub struct $name {
            store: Arc<Store>,
        }

        impl $name {
            pub fn new(store: Arc<Store>) -> Self {
                Self { store }
            }
        }

        #[async_trait]
        impl IpcHandler for $name {
            async fn handle(&self, payload: &IpcPayload, source: &GroupFolder, is_main: bool) -> Result<(), String> {
                let task_id = match payload {
                    IpcPayload::$payload_variant { task_id } => task_id,
                    _ => return Err(ToolError::WrongPayload($type_name).into()),
                };

                let task = self
                    .store
                    .get_task(task_id)
                    .map_err(ToolError::from)?
                    .ok_or_else(|| ToolError::NotFound(format!("task {task_id}")))?;

                authorize_task(&task, source, is_main)?;

                self.store
                    .update_task_status(task_id, $target_status)
                    .map_err(ToolError::from)?;
                Ok(())
            }
        }
    };
}

task_status_handler!(PauseTaskHandler, PauseTask, "pause_task", TaskStatus::Paused);
task_status_handler!(ResumeTaskHandler, ResumeTask, "resume_task", TaskStatus::Active);
task_status_handler!(CancelTaskHandler, CancelTask, "cancel_task", TaskStatus::Done);

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::types::{Jid, RegisteredGroup, ScheduleType};

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
    async fn schedule_task_resolves_jid_from_registered_group() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.register_group(&registered("acme", "123@g.us")).unwrap();
        let handler = ScheduleTaskHandler::new(store.clone());

        let payload = IpcPayload::ScheduleTask {
            prompt: "good morning".to_string(),
            schedule_type: ScheduleType::Cron,
            schedule_value: "0 9 * * *".to_string(),
            timezone: "UTC".to_string(),
            context_mode: ContextMode::Group,
        };

        handler
            .handle(&payload, &GroupFolder::from("acme"), false)
            .await
            .unwrap();

        let tasks = store.list_tasks_for_group(&GroupFolder::from("acme")).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].chat_jid.as_str(), "123@g.us");
    }

    #[tokio::test]
    async fn schedule_task_fails_for_an_unregistered_group() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let handler = ScheduleTaskHandler::new(store);

        let payload = IpcPayload::ScheduleTask {
            prompt: "good morning".to_string(),
            schedule_type: ScheduleType::Once,
            schedule_value: chrono::Utc::now().to_rfc3339(),
            timezone: "UTC".to_string(),
            context_mode: ContextMode::Isolated,
        };

        let result = handler
            .handle(&payload, &GroupFolder::from("ghost"), false)
            .await;
        assert!(result.is_err());
    }

    fn sample_task(folder: &str) -> Task {
        Task {
            id: "task-1".to_string(),
            group_folder: GroupFolder::from(folder),
            chat_jid: Jid::from("123@g.us"),
            prompt: "ping".to_string(),
            schedule_type: ScheduleType::Interval,
            schedule_value: "60000".to_string(),
            timezone: "UTC".to_string(),
            context_mode: ContextMode::Group,
            next_run: Some(chrono::Utc::now()),
            status: TaskStatus::Active,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn pause_task_owned_by_caller_succeeds() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let task = sample_task("acme");
        store.create_task(&task).unwrap();
        let handler = PauseTaskHandler::new(store.clone());

        handler
            .handle(
                &IpcPayload::PauseTask {
                    task_id: task.id.clone(),
                },
                &GroupFolder::from("acme"),
                false,
            )
            .await
            .unwrap();

        assert_eq!(store.get_task(&task.id).unwrap().unwrap().status, TaskStatus::Paused);
    }

    #[tokio::test]
    async fn pause_task_owned_by_another_group_is_rejected_unless_main() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let task = sample_task("acme");
        store.create_task(&task).unwrap();
        let handler = PauseTaskHandler::new(store.clone());

        let result = handler
            .handle(
                &IpcPayload::PauseTask {
                    task_id: task.id.clone(),
                },
                &GroupFolder::from("other"),
                false,
            )
            .await;
        assert!(result.is_err());

        handler
            .handle(
                &IpcPayload::PauseTask {
                    task_id: task.id.clone(),
                },
                &GroupFolder::from("main"),
                true,
            )
            .await
            .unwrap();

        assert_eq!(store.get_task(&task.id).unwrap().unwrap().status, TaskStatus::Paused);
    }

    #[tokio::test]
    async fn cancel_task_marks_it_done() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let task = sample_task("acme");
        store.create_task(&task).unwrap();
        let handler = CancelTaskHandler::new(store.clone());

        handler
            .handle(
                &IpcPayload::CancelTask {
                    task_id: task.id.clone(),
                },
                &GroupFolder::from("acme"),
                false,
            )
            .await
            .unwrap();

        assert_eq!(store.get_task(&task.id).unwrap().unwrap().status, TaskStatus::Done);
    }
}
