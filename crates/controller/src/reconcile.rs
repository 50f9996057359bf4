//! Periodic reconciliation against the backend scheduler.
//!
//! Polls the full scheduler snapshot at a fixed cadence and feeds it into
//! the controller loop, which overwrites matching rows — the backend is
//! authoritative, local protocol responses only bridge the gap until the
//! next tick. There is no backoff and no cancellation short of teardown:
//! a failed poll is logged and skipped, the next tick retries
//! unconditionally.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use xharvest_api_client::ApiClient;

use crate::engine::ControllerEvent;

pub async fn run_reconciliation(
    client: Arc<ApiClient>,
    period: Duration,
    events: mpsc::UnboundedSender<ControllerEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match client.scheduler_state().await {
                    Ok(snapshot) => {
                        if events.send(ControllerEvent::SnapshotReceived { snapshot }).is_err() {
                            debug!("controller gone, stopping reconciliation");
                            break;
                        }
                    }
                    Err(e) => debug!("reconciliation poll failed, will retry: {e}"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Reconciliation shutting down");
                    break;
                }
            }
        }
    }
}
