//! Exponential backoff with jitter for reconnecting the transport, adapted
//! from the teacher's channel manager to a single always-on connection
//! rather than a registry of named adapters.

use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::error::TransportError;
use crate::transport::Transport;

const BACKOFF_BASE_SECS: u64 = 5;
const BACKOFF_MAX_SECS: u64 = 300;
const MAX_ATTEMPTS: u32 = 10;
const JITTER_FRACTION: f64 = 0.10;

/// Connect `transport` with exponential backoff (5s → 10s → … → 300s cap),
/// up to `MAX_ATTEMPTS` tries. An explicit logout is not retried — it
/// propagates immediately so the caller can terminate the process per
/// spec.md §4.2.
pub async fn connect_with_backoff(transport: &dyn Transport) -> Result<(), TransportError> {
    let mut delay_secs = BACKOFF_BASE_SECS;

    for attempt in 1..=MAX_ATTEMPTS {
        match transport.connect().await {
            Ok(()) => {
                info!(attempt, "transport connected");
                return Ok(());
            }
            Err(TransportError::LoggedOut) => {
                error!("explicit logout received, not retrying");
                return Err(TransportError::LoggedOut);
            }
            Err(e) if attempt == MAX_ATTEMPTS => {
                return Err(e);
            }
            Err(e) => {
                let jitter = jitter_secs(delay_secs);
                let total = delay_secs + jitter;
                warn!(
                    attempt,
                    max = MAX_ATTEMPTS,
                    error = %e,
                    retry_after_secs = total,
                    "transport connect failed, retrying with backoff"
                );
                sleep(Duration::from_secs(total)).await;
                delay_secs = (delay_secs * 2).min(BACKOFF_MAX_SECS);
            }
        }
    }

    unreachable!("backoff loop exited without returning")
}

fn jitter_secs(base_secs: u64) -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let max_jitter = ((base_secs as f64) * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return 0;
    }
    (nanos as u64) % max_jitter
}
