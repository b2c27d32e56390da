//! `GET /healthz` — the liveness probe every binary here ships (spec.md's
//! Non-goals exclude an operator dashboard, not basic liveness reporting).
//! Shape grounded on the teacher's own `GET /health` handler: status,
//! version, git sha, and the transport's live connection state.

use std::sync::Arc;
use std::time::Instant;

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::context::Context;

const GIT_SHA: &str = env!("HUDDLE_GIT_SHA");

pub struct HealthState {
    pub context: Arc<Context>,
    pub started_at: Instant,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    git_sha: &'static str,
    uptime_secs: u64,
    assistant: String,
    transport_status: String,
}

pub fn build_router(state: Arc<HealthState>) -> Router {
    Router::new().route("/healthz", get(healthz)).with_state(state)
}

async fn healthz(axum::extract::State(state): axum::extract::State<Arc<HealthState>>) -> Json<HealthResponse> {
    let transport_status = format!("{:?}", state.context.transport_status());
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        git_sha: GIT_SHA,
        uptime_secs: state.started_at.elapsed().as_secs(),
        assistant: state.context.assistant_name.clone(),
        transport_status,
    })
}
