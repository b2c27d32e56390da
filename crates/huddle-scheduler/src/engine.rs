//! Wakes every ~60s, materializes due tasks from the store, fires each
//! through the Container Runner, and reschedules. Tick shape ported from
//! `SchedulerEngine::tick`/`run`; the teacher's private `jobs` table is
//! replaced by `huddle-store`'s `tasks` table, since persistence is
//! centralized there.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use huddle_core::types::{ContextMode, TaskStatus};
use huddle_store::Store;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::error::Result;
use crate::ports::{ChatSink, ContainerRunner};
use crate::schedule::compute_next_run;

/// How far a transiently-failed task's `next_run` is pushed back before
/// the next retry attempt.
const TRANSIENT_FAILURE_BACKOFF: chrono::Duration = chrono::Duration::minutes(5);

pub struct Scheduler {
    store: Arc<Store>,
    runner: Arc<dyn ContainerRunner>,
    chat: Arc<dyn ChatSink>,
    assistant_name: String,
    poll_interval: Duration,
    guard: huddle_transport::StartGuard,
}

impl Scheduler {
    pub fn new(
        store: Arc<Store>,
        runner: Arc<dyn ContainerRunner>,
        chat: Arc<dyn ChatSink>,
        assistant_name: String,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            runner,
            chat,
            assistant_name,
            poll_interval,
            guard: huddle_transport::StartGuard::new(),
        }
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if !self.guard.try_start() {
            warn!("scheduler already running, refusing duplicate start");
            return;
        }
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "scheduler tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler shutting down");
                        break;
                    }
                }
            }
        }
        self.guard.reset();
    }

    #[instrument(skip(self))]
    async fn tick(&self) -> Result<()> {
        let now = Utc::now();
        let due = self.store.list_due_tasks(now)?;
        let registered = self.store.list_registered_groups()?;

        for task in due {
            let still_registered = task.group_folder.is_main()
                || registered
                    .iter()
                    .any(|g| g.folder.as_str() == task.group_folder.as_str());

            if !still_registered {
                warn!(task_id = %task.id, folder = %task.group_folder, "task's group no longer registered, failing task");
                self.store.update_task_status(&task.id, TaskStatus::Failed)?;
                continue;
            }

            self.fire(&task, now).await?;
        }

        Ok(())
    }

    #[instrument(skip(self, task), fields(task_id = %task.id, folder = %task.group_folder))]
    async fn fire(&self, task: &huddle_core::types::Task, now: chrono::DateTime<Utc>) -> Result<()> {
        let session_id = if task.context_mode == ContextMode::Group {
            self.store
                .get_session(&task.group_folder)?
                .map(|s| s.session_id)
        } else {
            None
        };

        let is_main = task.group_folder.is_main();
        let run_result = self
            .runner
            .run(&task.group_folder, &task.chat_jid, is_main, &task.prompt, session_id)
            .await;

        match run_result {
            Ok(outcome) => {
                let reply = format!("{}: {}", self.assistant_name, outcome.result);
                if let Err(e) = self.chat.send(task.chat_jid.as_str(), &reply).await {
                    error!(error = %e, "failed to deliver scheduled task reply");
                }

                if task.context_mode == ContextMode::Group {
                    if let Some(new_session_id) = outcome.new_session_id {
                        self.store.set_session(&task.group_folder, &new_session_id)?;
                    }
                }

                self.reschedule(task, now)?;
            }
            Err(e) => {
                warn!(error = %e, "scheduled container run failed, backing off for retry");
                self.store
                    .update_task_next_run(&task.id, Some(now + TRANSIENT_FAILURE_BACKOFF))?;
            }
        }

        Ok(())
    }

    fn reschedule(&self, task: &huddle_core::types::Task, now: chrono::DateTime<Utc>) -> Result<()> {
        match compute_next_run(task, now) {
            Ok(Some(next)) => {
                self.store.update_task_next_run(&task.id, Some(next))?;
            }
            Ok(None) => {
                self.store.update_task_status(&task.id, TaskStatus::Done)?;
            }
            Err(e) => {
                error!(error = %e, task_id = %task.id, "schedule became unparseable, failing task");
                self.store.update_task_status(&task.id, TaskStatus::Failed)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use huddle_core::types::{GroupFolder, Jid, ScheduleType, Task};
    use std::sync::Mutex as StdMutex;

    struct FakeRunner {
        result: String,
    }

    #[async_trait]
    impl ContainerRunner for FakeRunner {
        async fn run(
            &self,
            _group_folder: &GroupFolder,
            _chat_jid: &Jid,
            _is_main: bool,
            _prompt: &str,
            _session_id: Option<String>,
        ) -> std::result::Result<crate::ports::RunOutcome, String> {
            Ok(crate::ports::RunOutcome {
                result: self.result.clone(),
                new_session_id: Some("sess-2".to_string()),
            })
        }
    }

    struct FailingRunner;

    #[async_trait]
    impl ContainerRunner for FailingRunner {
        async fn run(
            &self,
            _group_folder: &GroupFolder,
            _chat_jid: &Jid,
            _is_main: bool,
            _prompt: &str,
            _session_id: Option<String>,
        ) -> std::result::Result<crate::ports::RunOutcome, String> {
            Err("container timed out".to_string())
        }
    }

    struct FakeChat {
        sent: StdMutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ChatSink for FakeChat {
        async fn send(&self, jid: &str, text: &str) -> std::result::Result<(), String> {
            self.sent
                .lock()
                .unwrap()
                .push((jid.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn once_task_due_now() -> Task {
        Task {
            id: "task-1".to_string(),
            group_folder: GroupFolder::from("main"),
            chat_jid: Jid::from("123@g.us"),
            prompt: "remind me".to_string(),
            schedule_type: ScheduleType::Once,
            schedule_value: Utc::now().to_rfc3339(),
            timezone: "UTC".to_string(),
            context_mode: ContextMode::Group,
            next_run: Some(Utc::now() - chrono::Duration::seconds(1)),
            status: TaskStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn firing_a_once_task_marks_it_done_and_sends_the_reply() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let task = once_task_due_now();
        store.create_task(&task).unwrap();

        let chat = Arc::new(FakeChat {
            sent: StdMutex::new(vec![]),
        });
        let scheduler = Scheduler::new(
            store.clone(),
            Arc::new(FakeRunner {
                result: "done".to_string(),
            }),
            chat.clone(),
            "Alfred".to_string(),
            Duration::from_secs(60),
        );

        scheduler.tick().await.unwrap();

        let reloaded = store.get_task(&task.id).unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::Done);
        assert_eq!(chat.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_run_leaves_task_active_and_backs_off_next_run() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let task = once_task_due_now();
        store.create_task(&task).unwrap();

        let chat = Arc::new(FakeChat {
            sent: StdMutex::new(vec![]),
        });
        let scheduler = Scheduler::new(
            store.clone(),
            Arc::new(FailingRunner),
            chat,
            "Alfred".to_string(),
            Duration::from_secs(60),
        );

        scheduler.tick().await.unwrap();

        let reloaded = store.get_task(&task.id).unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::Active);
        assert!(reloaded.next_run.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn task_in_unregistered_group_is_marked_failed() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let mut task = once_task_due_now();
        task.group_folder = GroupFolder::from("ghost");
        store.create_task(&task).unwrap();

        let chat = Arc::new(FakeChat {
            sent: StdMutex::new(vec![]),
        });
        let scheduler = Scheduler::new(
            store.clone(),
            Arc::new(FakeRunner {
                result: "done".to_string(),
            }),
            chat,
            "Alfred".to_string(),
            Duration::from_secs(60),
        );

        scheduler.tick().await.unwrap();

        let reloaded = store.get_task(&task.id).unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::Failed);
    }
}
