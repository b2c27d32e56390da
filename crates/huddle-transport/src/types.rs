use serde::{Deserialize, Serialize};

/// A chat group as reported by `Transport::list_groups`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfo {
    pub jid: String,
    pub name: String,
}

/// Runtime connection state of the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportStatus {
    Connected,
    Connecting,
    Disconnected,
    Error(String),
}
