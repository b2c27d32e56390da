//! The tagged-union wire format dropped into `ipc/<group>/{messages,tasks}/*.json`.
//!
//! Every payload carries a `timestamp` alongside its `type`-tagged body —
//! pulled out into an [`Envelope`] via `#[serde(flatten)]` rather than
//! repeated on every variant.

use huddle_core::types::{ContextMode, ExtraMount, ScheduleType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub payload: IpcPayload,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcPayload {
    Message {
        #[serde(rename = "chatJid")]
        chat_jid: String,
        text: String,
    },
    ScheduleTask {
        prompt: String,
        #[serde(rename = "scheduleType")]
        schedule_type: ScheduleType,
        #[serde(rename = "scheduleValue")]
        schedule_value: String,
        #[serde(default = "default_timezone")]
        timezone: String,
        #[serde(rename = "contextMode", default = "default_context_mode")]
        context_mode: ContextMode,
    },
    PauseTask {
        #[serde(rename = "taskId")]
        task_id: String,
    },
    ResumeTask {
        #[serde(rename = "taskId")]
        task_id: String,
    },
    CancelTask {
        #[serde(rename = "taskId")]
        task_id: String,
    },
    RegisterGroup {
        jid: String,
        name: String,
        folder: String,
        trigger: String,
        #[serde(default)]
        extra_mounts: Vec<ExtraMount>,
    },
    RefreshGroups,
    KbAdd {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        tags: Vec<String>,
    },
    KbSearch {
        query: String,
        #[serde(default)]
        limit: Option<usize>,
        #[serde(default)]
        min_similarity: Option<f32>,
        #[serde(default)]
        dedupe_by_source: Option<bool>,
    },
    KbList,
    KbUpdate {
        #[serde(rename = "sourceId")]
        source_id: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        tags: Option<Vec<String>>,
        #[serde(default)]
        text: Option<String>,
    },
    KbDelete {
        #[serde(rename = "sourceId")]
        source_id: String,
    },
    GithubPr {
        args: Vec<String>,
    },
    GithubIssue {
        args: Vec<String>,
    },
    SugarDeploy {
        args: Vec<String>,
    },
    SugarStatus {
        args: Vec<String>,
    },
}

impl IpcPayload {
    /// The `type` tag's wire name, for logging and the errors directory
    /// filename prefix.
    pub fn type_name(&self) -> &'static str {
        match self {
            IpcPayload::Message { .. } => "message",
            IpcPayload::ScheduleTask { .. } => "schedule_task",
            IpcPayload::PauseTask { .. } => "pause_task",
            IpcPayload::ResumeTask { .. } => "resume_task",
            IpcPayload::CancelTask { .. } => "cancel_task",
            IpcPayload::RegisterGroup { .. } => "register_group",
            IpcPayload::RefreshGroups => "refresh_groups",
            IpcPayload::KbAdd { .. } => "kb_add",
            IpcPayload::KbSearch { .. } => "kb_search",
            IpcPayload::KbList => "kb_list",
            IpcPayload::KbUpdate { .. } => "kb_update",
            IpcPayload::KbDelete { .. } => "kb_delete",
            IpcPayload::GithubPr { .. } => "github_pr",
            IpcPayload::GithubIssue { .. } => "github_issue",
            IpcPayload::SugarDeploy { .. } => "sugar_deploy",
            IpcPayload::SugarStatus { .. } => "sugar_status",
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_context_mode() -> ContextMode {
    ContextMode::Group
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_payload_round_trips_through_json() {
        let raw = serde_json::json!({
            "type": "message",
            "timestamp": "2026-01-01T00:00:00Z",
            "chatJid": "123@g.us",
            "text": "hello"
        });
        let envelope: Envelope = serde_json::from_value(raw).unwrap();
        match envelope.payload {
            IpcPayload::Message { chat_jid, text } => {
                assert_eq!(chat_jid, "123@g.us");
                assert_eq!(text, "hello");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn schedule_task_defaults_timezone_and_context_mode() {
        let raw = serde_json::json!({
            "type": "schedule_task",
            "timestamp": "2026-01-01T00:00:00Z",
            "prompt": "good morning",
            "scheduleType": "cron",
            "scheduleValue": "0 9 * * *"
        });
        let envelope: Envelope = serde_json::from_value(raw).unwrap();
        match envelope.payload {
            IpcPayload::ScheduleTask {
                timezone,
                context_mode,
                ..
            } => {
                assert_eq!(timezone, "UTC");
                assert_eq!(context_mode, ContextMode::Group);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let raw = serde_json::json!({
            "type": "not_a_real_type",
            "timestamp": "2026-01-01T00:00:00Z",
        });
        let result: std::result::Result<Envelope, _> = serde_json::from_value(raw);
        assert!(result.is_err());
    }

    #[test]
    fn type_name_matches_wire_tag() {
        assert_eq!(IpcPayload::KbList.type_name(), "kb_list");
        assert_eq!(IpcPayload::RefreshGroups.type_name(), "refresh_groups");
    }
}
