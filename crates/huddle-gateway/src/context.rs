//! Wires the eight components together: one shared `Store`, one concrete
//! `Transport`, one `Runner`, one `KbPipeline`, and the adapters binding them
//! into each consumer's local ports, then the long-running loops themselves
//! and the IPC handler registry they dispatch into.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use huddle_core::config::HuddleConfig;
use huddle_intake::IntakeLoop;
use huddle_ipc::{HandlerRegistry, IpcBroker};
use huddle_kb::{Embedder, HttpEmbedder, KbPipeline};
use huddle_runner::{MountAllowlist, Runner, RunnerConfig};
use huddle_scheduler::Scheduler;
use huddle_store::Store;
use huddle_tools::handlers::{
    CancelTaskHandler, ExternalCliHandler, KbAddHandler, KbDeleteHandler, KbListHandler, KbSearchHandler,
    KbUpdateHandler, MessageHandler, PauseTaskHandler, RefreshGroupsHandler, RegisterGroupHandler,
    ResumeTaskHandler, ScheduleTaskHandler,
};
use huddle_transport::{JidMap, Transport, TransportStatus};

use crate::adapters::{IntakeRunnerAdapter, KbAdapter, SchedulerRunnerAdapter, TransportChatSink, TransportGroupLister};
use crate::bridge::BridgeTransport;

/// Everything `main` needs to spawn the supervised loops and serve `/healthz`.
pub struct Context {
    pub store: Arc<Store>,
    pub transport: Arc<dyn Transport>,
    pub intake: Arc<IntakeLoop>,
    pub scheduler: Arc<Scheduler>,
    pub ipc_broker: Arc<IpcBroker>,
    pub assistant_name: String,
}

impl Context {
    pub fn build(config: &HuddleConfig, bridge_program: &str, bridge_args: Vec<String>) -> anyhow::Result<Self> {
        let store = Arc::new(Store::open(&config.database.path)?);
        let jid_map = Arc::new(JidMap::new());

        let transport: Arc<dyn Transport> = Arc::new(BridgeTransport::new(
            bridge_program.to_string(),
            bridge_args,
            store.clone(),
            jid_map,
        ));
        let chat_sink = Arc::new(TransportChatSink::new(transport.clone()));

        let allowlist_path = format!("{}/mount-allowlist.json", config.paths.data_dir);
        let allowlist = MountAllowlist::load(&allowlist_path)?;
        let runner = Arc::new(Runner::new(
            RunnerConfig {
                image_tag: config.container.image_tag.clone(),
                timeout_secs: config.container.timeout_secs,
                memory_mb: config.container.memory_mb,
                max_output_bytes: config.container.max_output_bytes,
                project_root: std::env::current_dir()?.to_string_lossy().into_owned(),
                groups_dir: config.paths.groups_dir.clone(),
                ipc_dir: format!("{}/ipc", config.paths.data_dir),
            },
            allowlist,
        ));

        let embedder: Option<Arc<dyn Embedder>> = config.embeddings.endpoint.clone().map(|endpoint| {
            Arc::new(HttpEmbedder::new(
                endpoint,
                config.embeddings.api_key.clone().unwrap_or_default(),
                config.embeddings.model.clone(),
            )) as Arc<dyn Embedder>
        });
        let kb_pipeline = Arc::new(KbPipeline::new(store.clone(), embedder));
        let kb_adapter = Arc::new(KbAdapter::new(kb_pipeline, store.clone()));

        let intake = Arc::new(IntakeLoop::new(
            store.clone(),
            Arc::new(IntakeRunnerAdapter::new(runner.clone(), store.clone())),
            kb_adapter.clone(),
            chat_sink.clone(),
            config.assistant.display_name.clone(),
            Duration::from_millis(config.polling.intake_interval_ms),
        ));

        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            Arc::new(SchedulerRunnerAdapter::new(runner.clone(), store.clone())),
            chat_sink.clone(),
            config.assistant.display_name.clone(),
            Duration::from_secs(config.scheduling.poll_interval_secs),
        ));

        let ipc_dir = PathBuf::from(format!("{}/ipc", config.paths.data_dir));
        let groups_dir = PathBuf::from(config.paths.groups_dir.clone());
        let registry = Arc::new(HandlerRegistry::new());
        register_handlers(&registry, &store, &chat_sink, &kb_adapter, &transport, &groups_dir, &ipc_dir);

        let ipc_broker = Arc::new(IpcBroker::new(
            store.clone(),
            ipc_dir,
            registry,
            Duration::from_millis(config.polling.ipc_interval_ms),
        ));

        Ok(Self {
            store,
            transport,
            intake,
            scheduler,
            ipc_broker,
            assistant_name: config.assistant.display_name.clone(),
        })
    }

    pub fn transport_status(&self) -> TransportStatus {
        self.transport.status()
    }
}

#[allow(clippy::too_many_arguments)]
fn register_handlers(
    registry: &HandlerRegistry,
    store: &Arc<Store>,
    chat_sink: &Arc<TransportChatSink>,
    kb_adapter: &Arc<KbAdapter>,
    transport: &Arc<dyn Transport>,
    groups_dir: &std::path::Path,
    ipc_dir: &std::path::Path,
)  {
    registry.register("message", Arc::new(MessageHandler::new(store.clone(), chat_sink.clone())));
    registry.register("schedule_task", Arc::new(ScheduleTaskHandler::new(store.clone())));
    registry.register("pause_task", Arc::new(PauseTaskHandler::new(store.clone())));
    registry.register("resume_task", Arc::new(ResumeTaskHandler::new(store.clone())));
    registry.register("cancel_task", Arc::new(CancelTaskHandler::new(store.clone())));

    registry.register(
        "register_group",
        Arc::new(RegisterGroupHandler::new(store.clone(), groups_dir.to_path_buf())),
    );
    registry.register(
        "refresh_groups",
        Arc::new(RefreshGroupsHandler::new(
            store.clone(),
            Arc::new(TransportGroupLister::new(transport.clone())),
            ipc_dir.to_path_buf(),
        )),
    );

    registry.register("kb_add", Arc::new(KbAddHandler::new(kb_adapter.clone())));
    registry.register("kb_search", Arc::new(KbSearchHandler::new(kb_adapter.clone())));
    registry.register("kb_list", Arc::new(KbListHandler::new(kb_adapter.clone())));
    registry.register("kb_update", Arc::new(KbUpdateHandler::new(kb_adapter.clone())));
    registry.register("kb_delete", Arc::new(KbDeleteHandler::new(kb_adapter.clone())));

    registry.register(
        "github_pr",
        Arc::new(ExternalCliHandler::new("gh", "github_pr", store.clone(), chat_sink.clone())),
    );
    registry.register(
        "github_issue",
        Arc::new(ExternalCliHandler::new("gh", "github_issue", store.clone(), chat_sink.clone())),
    );
    registry.register(
        "sugar_deploy",
        Arc::new(ExternalCliHandler::new("sugar", "sugar_deploy", store.clone(), chat_sink.clone())),
    );
    registry.register(
        "sugar_status",
        Arc::new(ExternalCliHandler::new("sugar", "sugar_status", store.clone(), chat_sink.clone())),
    );
}
