//! Heartbeat ping/pong liveness monitoring.
//!
//! One server-wide task sweeps every connection per interval: a connection
//! that has not answered the previous probe is torn down, every other one is
//! marked unanswered and probed again.
//!
//! A probe that cannot be queued because the outbound queue is full still
//! leaves the connection unanswered. A client that stays backlogged for a
//! whole interval is treated as dead and evicted on the next sweep.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::broadcast::BroadcastManager;
use super::connection::ConnectionId;
use crate::metrics::{WS_HEARTBEAT_EVICTIONS_TOTAL, WS_HEARTBEAT_PING_FAILURES_TOTAL};

/// Outcome of the monitor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// The monitor was cancelled externally.
    Cancelled,
}

/// Run one liveness pass over a snapshot of the active connections.
///
/// Returns the IDs evicted in this pass.
pub fn sweep(broadcast: &BroadcastManager) -> Vec<ConnectionId> {
    let mut evicted = Vec::new();
    for conn in broadcast.connections() {
        if conn.check_alive() {
            if !conn.ping() && !conn.is_closed() {
                warn!(
                    conn_id = %conn.id,
                    dropped = conn.drop_count(),
                    "heartbeat probe not queued (outbound queue full)"
                );
                counter!(WS_HEARTBEAT_PING_FAILURES_TOTAL).increment(1);
            }
        } else if broadcast.teardown(conn.id) {
            info!(conn_id = %conn.id, "client missed heartbeat, terminating");
            counter!(WS_HEARTBEAT_EVICTIONS_TOTAL).increment(1);
            evicted.push(conn.id);
        }
    }
    evicted
}

/// Sweep every `interval` until `cancel` fires.
///
/// The first sweep happens one full interval after start, so fresh
/// connections always get a chance to answer.
pub async fn run_liveness_monitor(
    broadcast: Arc<BroadcastManager>,
    interval: Duration,
    cancel: CancellationToken,
) -> MonitorExit {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    // Skip the immediate first tick
    let _ = ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = sweep(&broadcast);
                debug!(
                    evicted = evicted.len(),
                    remaining = broadcast.connection_count(),
                    "heartbeat sweep"
                );
            }
            () = cancel.cancelled() => {
                debug!("liveness monitor stopped");
                return MonitorExit::Cancelled;
            }
        }
    }
}
