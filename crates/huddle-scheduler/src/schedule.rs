//! `compute_next_run` — ported from the teacher's `Interval`/`Once`
//! arithmetic, extended to finish the teacher's documented-stub `Cron`
//! variant with a real cron expression parser in the task's configured
//! timezone.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use huddle_core::types::{ScheduleType, Task};

use crate::error::{Result, SchedulerError};

/// Computes the next UTC firing time for `task` after `from`.
///
/// Returns `Ok(None)` when the schedule is exhausted (a `once` task whose
/// instant has already passed). Returns `Err` only for a malformed
/// `schedule_value` or an unknown timezone — a fatal, not transient, fault.
pub fn compute_next_run(task: &Task, from: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    match task.schedule_type {
        ScheduleType::Once => {
            let at = DateTime::parse_from_rfc3339(&task.schedule_value)
                .map_err(|e| SchedulerError::InvalidSchedule(format!("bad once timestamp: {e}")))?
                .with_timezone(&Utc);
            Ok(if at > from { Some(at) } else { None })
        }

        ScheduleType::Interval => {
            let millis: i64 = task
                .schedule_value
                .parse()
                .map_err(|e| SchedulerError::InvalidSchedule(format!("bad interval millis: {e}")))?;
            Ok(Some(from + chrono::Duration::milliseconds(millis)))
        }

        ScheduleType::Cron => {
            let tz: chrono_tz::Tz = task
                .timezone
                .parse()
                .map_err(|_| SchedulerError::InvalidSchedule(format!("unknown timezone: {}", task.timezone)))?;
            let schedule = cron::Schedule::from_str(&with_seconds_field(&task.schedule_value))
                .map_err(|e| SchedulerError::InvalidSchedule(format!("bad cron expression: {e}")))?;
            let from_tz = from.with_timezone(&tz);
            let next = schedule.after(&from_tz).next().map(|dt| dt.with_timezone(&Utc));
            Ok(next)
        }
    }
}

/// The `cron` crate requires a leading seconds field; task authors write
/// the standard 5-field crontab form, so a 5-field expression gets `"0 "`
/// prepended before parsing.
fn with_seconds_field(expr: &str) -> String {
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}
