//! Fallback polling of the pool info endpoint.
//!
//! A deployment can run this instead of, or alongside, the event stream:
//! both paths feed the same [`BlockTracker`], whose atomic evaluate keeps
//! them from double-announcing a height. Fetch errors skip the tick;
//! payloads missing an expected field skip the tick and are reported once
//! per distinct cause.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::types::PoolInfo;
use super::ObserverClient;
use crate::announcer::Notice;
use crate::log_gate::LogGate;
use crate::tracker::{BlockTracker, Outcome};

/// Extract the sidechain tip height, reporting each missing layer of the
/// payload at most once.
fn tip_height(info: &PoolInfo, gate: &mut LogGate) -> Option<u64> {
    let Some(sidechain) = &info.sidechain else {
        if gate.first("no-sidechain") {
            warn!("Pool info payload has no `sidechain` section; skipping poll ticks until it returns.");
        }
        return None;
    };
    let Some(block) = &sidechain.last_block else {
        if gate.first("no-last-block") {
            warn!("Pool info payload has no `last_block`; skipping poll ticks until it returns.");
        }
        return None;
    };
    let Some(height) = block.side_height else {
        if gate.first("no-side-height") {
            warn!("Sidechain tip carries no `side_height`; skipping poll ticks until it returns.");
        }
        return None;
    };
    Some(height)
}

/// Task polling the observer on a fixed interval until shutdown.
pub async fn task(
    client: ObserverClient,
    tracker: Arc<BlockTracker>,
    notices: mpsc::Sender<Notice>,
    period: Duration,
    running: CancellationToken,
) {
    trace!("Task started.");
    let mut gate = LogGate::new("poller");
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = running.cancelled() => break,
        }

        let info = match client.pool_info().await {
            Ok(info) => info,
            Err(e) => {
                error!(error = %e, "Failed to fetch pool info; skipping this check.");
                continue;
            }
        };

        let Some(height) = tip_height(&info, &mut gate) else {
            continue;
        };

        match tracker.evaluate(height) {
            Outcome::Initialized => {
                info!(height, "Initialized last known side height from poll.");
            }
            Outcome::NewBlock { delta } => {
                info!(height, delta, "New block detected by poll.");
                if notices.send(Notice::Polled(info)).await.is_err() {
                    warn!("Announcer is gone; dropping notification.");
                }
            }
            Outcome::NoChange => {
                debug!(height, "No new block.");
            }
            Outcome::Regression { delta } => {
                warn!(
                    height,
                    delta, "Height regressed; possible reorg. Resynchronized to polled value."
                );
            }
        }
    }

    trace!("Task stopped.");
}
