//! huddle-runner — sandboxed one-shot execution of the agent container.
//!
//! Launches the agent image as a subprocess per invocation: a JSON request
//! on stdin, a single JSON-line response on stdout, bounded output with
//! kill-on-oversize, a timeout race, and per-group run exclusivity. No PTY,
//! no interactive sessions, no background job tracking — one request in,
//! one response out.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use huddle_runner::{Runner, RunnerConfig, RunRequest, MountAllowlist};
//! use huddle_core::types::{GroupFolder, Jid};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RunnerConfig {
//!         image_tag: "huddle-agent:latest".to_string(),
//!         timeout_secs: 300,
//!         memory_mb: 2048,
//!         max_output_bytes: 10 * 1024 * 1024,
//!         project_root: "/srv/huddle/project".to_string(),
//!         groups_dir: "/srv/huddle/groups".to_string(),
//!         ipc_dir: "/srv/huddle/ipc".to_string(),
//!     };
//!     let runner = Runner::new(config, MountAllowlist::default());
//!     let req = RunRequest {
//!         group_folder: GroupFolder::from("main"),
//!         chat_jid: Jid::from("123@g.us"),
//!         is_main: true,
//!         prompt: "hello".to_string(),
//!         session_id: None,
//!         extra_mounts: vec![],
//!     };
//!     let outcome = runner.run(req).await.unwrap();
//!     println!("{}", outcome.result);
//! }
//! ```

pub mod error;
pub mod exec;
pub mod mounts;
pub mod runner;
pub mod types;

pub use error::{Result, RunnerError};
pub use exec::{exec_bounded, ExecOutput};
pub use mounts::MountAllowlist;
pub use runner::{Runner, RunnerConfig};
pub use types::{ContainerRequest, ContainerResponse, ContainerStatus, MountSpec, RunOutcome, RunRequest};
