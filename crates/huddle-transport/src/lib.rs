pub mod error;
pub mod guard;
pub mod jid;
pub mod reconnect;
pub mod sync;
pub mod transport;
pub mod types;

pub use error::TransportError;
pub use guard::StartGuard;
pub use jid::JidMap;
pub use transport::Transport;
pub use types::{GroupInfo, TransportStatus};
