//! Graceful shutdown coordination via `CancellationToken`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default timeout for graceful shutdown before aborting stragglers.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// How a graceful shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every tracked task finished in time.
    Drained,
    /// The timeout elapsed; `aborted` tasks were still running.
    TimedOut {
        /// Tasks aborted after the deadline.
        aborted: usize,
    },
}

/// Coordinates graceful shutdown across server tasks: the HTTP listener,
/// the liveness monitor and every WebSocket session observe the same token.
#[derive(Clone, Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token, then wait up to `timeout` (default
    /// [`DEFAULT_SHUTDOWN_TIMEOUT`]) for `handles`. Tasks still running at
    /// the deadline are aborted.
    pub async fn graceful_shutdown(
        &self,
        handles: Vec<JoinHandle<()>>,
        timeout: Option<Duration>,
    ) -> ShutdownOutcome {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        self.shutdown();
        info!(
            task_count = handles.len(),
            timeout_ms = timeout.as_millis(),
            "waiting for tasks to complete"
        );

        let aborters: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        let drain = futures::future::join_all(handles);

        if tokio::time::timeout(timeout, drain).await.is_ok() {
            info!("shutdown complete");
            return ShutdownOutcome::Drained;
        }

        let aborted = aborters.iter().filter(|h| !h.is_finished()).count();
        for handle in &aborters {
            handle.abort();
        }
        warn!(aborted, "shutdown timed out after {timeout:?}, aborting remaining tasks");
        ShutdownOutcome::TimedOut { aborted }
    }
}
