//! huddle-tools — Tool Handlers (C8): the effects the IPC Broker dispatches
//! into. One [`huddle_ipc::IpcHandler`] per wire `type` — message send, task
//! CRUD, group admin, KB delegation, external CLI wrappers — registered into
//! a [`huddle_ipc::HandlerRegistry`] by `huddle-gateway`.
//!
//! Every handler receives `(payload, source_group, is_main)` and is
//! responsible for its own authorization: the source directory is the
//! identity (see `huddle-ipc::broker`), so a handler never trusts a
//! payload-declared target group.

pub mod error;
pub mod handlers;
pub mod ports;

pub use error::{Result, ToolError};
pub use ports::{ChatSink, KnowledgeBase};
