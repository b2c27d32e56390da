use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

mod adapters;
mod bridge;
mod context;
mod http;

use context::Context;
use huddle_core::config::HuddleConfig;
use huddle_transport::reconnect::connect_with_backoff;

/// Huddle — per-chat AI-agent router and orchestrator.
#[derive(Parser, Debug)]
#[command(name = "huddle-gateway", version)]
struct Cli {
    /// Path to huddle.toml. Defaults to ~/.huddle/huddle.toml.
    #[arg(long)]
    config: Option<String>,

    /// Program that speaks the chat bridge's newline-JSON protocol on
    /// stdin/stdout. The bridge owns pairing, auth, and reconnect handshakes
    /// for whatever chat platform it fronts.
    #[arg(long, default_value = "huddle-chat-bridge")]
    bridge: String,

    /// Extra arguments passed through to the bridge program.
    #[arg(long = "bridge-arg")]
    bridge_args: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle_gateway=info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = HuddleConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config load failed, using defaults");
        HuddleConfig::default()
    });

    let ctx = Arc::new(Context::build(&config, &cli.bridge, cli.bridge_args)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if let Err(e) = connect_with_backoff(ctx.transport.as_ref()).await {
        error!(error = %e, "transport failed to connect after exhausting retries, exiting");
        return Err(anyhow::anyhow!(e));
    }

    let intake_handle = tokio::spawn({
        let loop_ = ctx.intake.clone();
        let shutdown = shutdown_rx.clone();
        async move { loop_.run(shutdown).await }
    });

    let scheduler_handle = tokio::spawn({
        let scheduler = ctx.scheduler.clone();
        let shutdown = shutdown_rx.clone();
        async move { scheduler.run(shutdown).await }
    });

    let ipc_handle = tokio::spawn({
        let broker = ctx.ipc_broker.clone();
        let shutdown = shutdown_rx.clone();
        async move { broker.run(shutdown).await }
    });

    let health_state = Arc::new(http::HealthState {
        context: ctx.clone(),
        started_at: Instant::now(),
    });
    let router = http::build_router(health_state);
    let addr: SocketAddr = format!("{}:{}", config.health.bind, config.health.port).parse()?;
    info!(%addr, "huddle-gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let mut health_shutdown = shutdown_rx.clone();
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = health_shutdown.changed().await;
    });

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!(error = %e, "health server exited with an error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(intake_handle, scheduler_handle, ipc_handle);
    let _ = ctx.transport.disconnect().await;

    Ok(())
}
