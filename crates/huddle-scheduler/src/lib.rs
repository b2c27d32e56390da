//! huddle-scheduler — the recurring/one-shot task runner (C7). Materializes
//! due tasks from `huddle-store`'s `tasks` table, fires them through the
//! Container Runner, and reschedules via `cron`/interval/once arithmetic.
//!
//! # Schedule types
//!
//! | Variant    | `schedule_value`                  | Behaviour                    |
//! |------------|------------------------------------|-------------------------------|
//! | `once`     | ISO-8601 timestamp                 | Single fire, then `done`      |
//! | `interval` | milliseconds                       | Repeats every N ms            |
//! | `cron`     | 5-field crontab expression          | Next match in `task.timezone` |

pub mod engine;
pub mod error;
pub mod ports;
pub mod schedule;

pub use engine::Scheduler;
pub use error::{Result, SchedulerError};
pub use ports::{ChatSink, ContainerRunner, RunOutcome};
pub use schedule::compute_next_run;
