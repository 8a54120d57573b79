//! WebSocket client connection state.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

use crate::events::{MatchId, ServerMessage};

/// Stable identifier of one connection; the element stored in registry sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh, time-ordered identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// A unit of work for the connection's writer task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundFrame {
    /// A serialized JSON text message.
    Text(Arc<String>),
    /// A heartbeat probe (WebSocket Ping).
    Ping,
}

/// Represents a connected WebSocket client.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Bounded queue feeding the client's WebSocket write task.
    tx: mpsc::Sender<OutboundFrame>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has answered the last heartbeat probe.
    is_alive: AtomicBool,
    /// Set once at teardown; a closed connection takes no new subscriptions.
    closed: AtomicBool,
    /// Matches this connection wants events for. Mirrors the registry.
    subscriptions: Mutex<HashSet<MatchId>>,
    /// Count of messages dropped due to a full or closed queue.
    dropped_messages: AtomicU64,
    /// Cancelled to force the session to end.
    cancel: CancellationToken,
}

impl ClientConnection {
    /// Create a new connection.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<OutboundFrame>) -> Self {
        Self {
            id,
            tx,
            connected_at: Instant::now(),
            is_alive: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            subscriptions: Mutex::new(HashSet::new()),
            dropped_messages: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        }
    }

    /// Enqueue a text message for the client without waiting.
    ///
    /// Returns `false` if the connection is closed or its queue is full or
    /// gone. Queue failures on an open connection count as drops.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.is_closed() {
            return false;
        }
        if self.tx.try_send(OutboundFrame::Text(message)).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize a server message and enqueue it.
    pub fn send_message(&self, message: &ServerMessage<'_>) -> bool {
        match serde_json::to_string(message) {
            Ok(json) => self.send(Arc::new(json)),
            Err(_) => false,
        }
    }

    /// Enqueue a heartbeat probe.
    pub fn ping(&self) -> bool {
        !self.is_closed() && self.tx.try_send(OutboundFrame::Ping).is_ok()
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (heartbeat ack received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
    }

    /// Clear the alive flag, returning whether it was set.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Whether the connection has been torn down.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Set the closed flag. Returns `true` only for the first caller.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Force the session serving this connection to end.
    pub fn terminate(&self) {
        self.cancel.cancel();
    }

    /// Whether [`terminate`](Self::terminate) has been called.
    pub fn is_terminated(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the connection is terminated.
    pub fn terminated(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Snapshot of the subscribed match ids.
    pub fn subscriptions(&self) -> HashSet<MatchId> {
        self.subscriptions.lock().clone()
    }

    /// Whether the connection is subscribed to `match_id`.
    pub fn is_subscribed(&self, match_id: MatchId) -> bool {
        self.subscriptions.lock().contains(&match_id)
    }

    /// Mutable access for the registry, which holds its own lock while
    /// editing so both sides change together.
    pub(crate) fn subscriptions_mut(&self) -> MutexGuard<'_, HashSet<MatchId>> {
        self.subscriptions.lock()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::fixtures::match_id;

    fn make_connection() -> (ClientConnection, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(32);
        let conn = ClientConnection::new(ConnectionId::new(), tx);
        (conn, rx)
    }

    #[test]
    fn create_connection() {
        let (conn, _rx) = make_connection();
        assert!(conn.subscriptions().is_empty());
        assert!(!conn.is_closed());
        assert!(!conn.is_terminated());
        assert_eq!(conn.drop_count(), 0);
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[tokio::test]
    async fn send_message_success() {
        let (conn, mut rx) = make_connection();
        assert!(conn.send(Arc::new("hello".into())));
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame, OutboundFrame::Text(Arc::new("hello".into())));
    }

    #[tokio::test]
    async fn send_to_closed_channel_counts_drop() {
        let (tx, rx) = mpsc::channel(32);
        let conn = ClientConnection::new(ConnectionId::new(), tx);
        drop(rx);
        assert!(!conn.send(Arc::new("hello".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn send_to_full_channel_returns_false() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = ClientConnection::new(ConnectionId::new(), tx);
        assert!(conn.send(Arc::new("msg1".into())));
        assert!(!conn.send(Arc::new("msg2".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn closed_connection_skips_without_counting() {
        let (conn, mut rx) = make_connection();
        assert!(conn.mark_closed());
        assert!(!conn.send(Arc::new("late".into())));
        assert!(!conn.ping());
        assert_eq!(conn.drop_count(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn mark_closed_only_once() {
        let (conn, _rx) = make_connection();
        assert!(conn.mark_closed());
        assert!(!conn.mark_closed());
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn send_message_serializes() {
        let (conn, mut rx) = make_connection();
        assert!(conn.send_message(&ServerMessage::Subscribed { match_id: match_id(42) }));
        let OutboundFrame::Text(text) = rx.recv().await.unwrap() else {
            panic!("expected text frame");
        };
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["type"], "subscribed");
        assert_eq!(parsed["matchId"], 42);
    }

    #[tokio::test]
    async fn ping_enqueues_probe() {
        let (conn, mut rx) = make_connection();
        assert!(conn.ping());
        assert_eq!(rx.recv().await.unwrap(), OutboundFrame::Ping);
    }

    #[test]
    fn check_alive_resets_flag() {
        let (conn, _rx) = make_connection();
        // Initially alive
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }

    #[tokio::test]
    async fn terminate_resolves_future() {
        let (conn, _rx) = make_connection();
        conn.terminate();
        conn.terminated().await;
        assert!(conn.is_terminated());
    }

    #[test]
    fn connection_age_increases() {
        let (conn, _rx) = make_connection();
        let age1 = conn.age();
        std::thread::sleep(Duration::from_millis(10));
        assert!(conn.age() > age1);
    }
}
