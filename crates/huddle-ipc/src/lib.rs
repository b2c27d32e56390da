//! huddle-ipc — the file-drop IPC broker (C6): polls the `ipc/` directory
//! tree, authorizes by source directory identity, and dispatches
//! tagged-union payloads to registered handlers.

pub mod broker;
pub mod error;
pub mod handler;
pub mod payload;

pub use broker::IpcBroker;
pub use error::{IpcError, Result};
pub use handler::{HandlerRegistry, IpcHandler};
pub use payload::{Envelope, IpcPayload};
