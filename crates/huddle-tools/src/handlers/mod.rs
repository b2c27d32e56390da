//! One `IpcHandler` implementation per wire `type`, registered into
//! `huddle-ipc::HandlerRegistry` by `huddle-gateway`.

pub mod external_cli;
pub mod group;
pub mod kb;
pub mod message;
pub mod task;

pub use external_cli::ExternalCliHandler;
pub use group::{GroupLister, RefreshGroupsHandler, RegisterGroupHandler};
pub use kb::{KbAddHandler, KbDeleteHandler, KbListHandler, KbSearchHandler, KbUpdateHandler};
pub use message::MessageHandler;
pub use task::{CancelTaskHandler, PauseTaskHandler, ResumeTaskHandler, ScheduleTaskHandler};
