use async_trait::async_trait;

use crate::{
    error::TransportError,
    types::{GroupInfo, TransportStatus},
};

/// Common interface implemented by the chat transport adapter.
///
/// There is exactly one live implementation in a running process (unlike the
/// multi-adapter registries some chat bridges carry): Huddle talks to a
/// single chat session. The trait boundary exists so the Intake Loop and
/// Tool Handlers can be tested against a fake implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the connection. Implementations transition to
    /// [`TransportStatus::Connected`] on success.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Gracefully close the connection.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Deliver a text message to `jid`.
    async fn send(&self, jid: &str, text: &str) -> Result<(), TransportError>;

    /// Toggle the typing indicator for `jid`.
    async fn set_typing(&self, jid: &str, typing: bool) -> Result<(), TransportError>;

    /// List every chat group the transport currently knows about.
    async fn list_groups(&self) -> Result<Vec<GroupInfo>, TransportError>;

    /// Current connection status, without blocking.
    fn status(&self) -> TransportStatus;
}
