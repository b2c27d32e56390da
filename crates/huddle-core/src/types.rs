use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque transport-assigned chat identifier (the WhatsApp-style JID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Jid(pub String);

impl Jid {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Jid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Jid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Stable filesystem-safe slug identifying a registered group.
///
/// `"main"` is the privileged folder: it bypasses the trigger-word gate and
/// is the only group allowed to register/refresh other groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupFolder(pub String);

impl GroupFolder {
    pub const MAIN: &'static str = "main";

    pub fn main() -> Self {
        Self(Self::MAIN.to_string())
    }

    pub fn is_main(&self) -> bool {
        self.0 == Self::MAIN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for GroupFolder {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GroupFolder {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A chat as observed through the transport. Upserted on first observed
/// message and on each group metadata sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub jid: Jid,
    pub display_name: String,
    pub last_message_time: chrono::DateTime<chrono::Utc>,
}

/// An immutable, append-only message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Transport-assigned, globally unique.
    pub id: String,
    pub chat_jid: Jid,
    pub sender_name: String,
    pub from_assistant: bool,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// An additional mount point exposed to a group's sandbox, beyond the
/// group's own workspace directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraMount {
    pub host_path: String,
    pub container_path: String,
    #[serde(default)]
    pub readonly: bool,
}

/// A chat group registered to receive agent runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredGroup {
    pub jid: Jid,
    pub name: String,
    pub folder: GroupFolder,
    pub trigger: String,
    pub added_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub extra_mounts: Vec<ExtraMount>,
}

impl RegisteredGroup {
    pub fn is_main(&self) -> bool {
        self.folder.is_main()
    }
}

/// Persisted session-continuation mapping: one row per group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub folder: GroupFolder,
    pub session_id: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// How a scheduled task determines its firing times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    Cron,
    Interval,
    Once,
}

impl fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleType::Cron => write!(f, "cron"),
            ScheduleType::Interval => write!(f, "interval"),
            ScheduleType::Once => write!(f, "once"),
        }
    }
}

impl std::str::FromStr for ScheduleType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cron" => Ok(ScheduleType::Cron),
            "interval" => Ok(ScheduleType::Interval),
            "once" => Ok(ScheduleType::Once),
            other => Err(format!("unknown schedule type: {other}")),
        }
    }
}

/// Whether a fired task continues the group's shared session or runs in
/// isolation with a throwaway one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    Group,
    Isolated,
}

impl fmt::Display for ContextMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextMode::Group => write!(f, "group"),
            ContextMode::Isolated => write!(f, "isolated"),
        }
    }
}

impl std::str::FromStr for ContextMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "group" => Ok(ContextMode::Group),
            "isolated" => Ok(ContextMode::Isolated),
            other => Err(format!("unknown context mode: {other}")),
        }
    }
}

/// Lifecycle state of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Active,
    Paused,
    Done,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Active => write!(f, "active"),
            TaskStatus::Paused => write!(f, "paused"),
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(TaskStatus::Active),
            "paused" => Ok(TaskStatus::Paused),
            "done" => Ok(TaskStatus::Done),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// A scheduled agent run. `schedule_value` holds a cron expression, a
/// millisecond interval, or an ISO-8601 timestamp depending on
/// `schedule_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub group_folder: GroupFolder,
    pub chat_jid: Jid,
    pub prompt: String,
    pub schedule_type: ScheduleType,
    pub schedule_value: String,
    /// IANA timezone name (e.g. "Asia/Kolkata"); used for `Cron` schedules.
    pub timezone: String,
    pub context_mode: ContextMode,
    pub next_run: Option<chrono::DateTime<chrono::Utc>>,
    pub status: TaskStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// What kind of content a KB source was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Article,
    Video,
    Pdf,
    Text,
    Tweet,
    Other,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Article => write!(f, "article"),
            SourceType::Video => write!(f, "video"),
            SourceType::Pdf => write!(f, "pdf"),
            SourceType::Text => write!(f, "text"),
            SourceType::Tweet => write!(f, "tweet"),
            SourceType::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "article" => Ok(SourceType::Article),
            "video" => Ok(SourceType::Video),
            "pdf" => Ok(SourceType::Pdf),
            "text" => Ok(SourceType::Text),
            "tweet" => Ok(SourceType::Tweet),
            "other" => Ok(SourceType::Other),
            other => Err(format!("unknown source type: {other}")),
        }
    }
}

/// A knowledge-base source document: one per ingested URL or pasted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbSource {
    pub id: String,
    pub group_folder: GroupFolder,
    pub url: Option<String>,
    pub title: String,
    pub source_type: SourceType,
    pub raw_content: String,
    pub content_hash: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub truncated: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A chunk of a KB source: the unit of embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbChunk {
    pub id: String,
    pub source_id: String,
    pub chunk_index: u32,
    pub content: String,
    /// `None` when the embeddings provider was unavailable at ingest time.
    pub embedding: Option<Vec<f32>>,
    pub embedding_dim: Option<u32>,
    pub embedding_provider: Option<String>,
    pub embedding_model: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A single search hit returned by the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbSearchHit {
    pub chunk_id: String,
    pub source_id: String,
    pub url: Option<String>,
    pub title: String,
    pub source_type: SourceType,
    pub content: String,
    pub similarity: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn group_folder_main_is_privileged() {
        let g = GroupFolder::main();
        assert!(g.is_main());
        assert_eq!(g.as_str(), "main");
        assert!(!GroupFolder::from("other").is_main());
    }

    #[test]
    fn task_status_roundtrips_through_display_and_from_str() {
        for s in [
            TaskStatus::Active,
            TaskStatus::Paused,
            TaskStatus::Done,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::from_str(&s.to_string()).unwrap(), s);
        }
        assert!(TaskStatus::from_str("bogus").is_err());
    }

    #[test]
    fn schedule_type_roundtrips() {
        for s in [ScheduleType::Cron, ScheduleType::Interval, ScheduleType::Once] {
            assert_eq!(ScheduleType::from_str(&s.to_string()).unwrap(), s);
        }
    }
}
