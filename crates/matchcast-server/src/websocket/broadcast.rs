//! Event fan-out to connected WebSocket clients.
//!
//! Broadcasts serialise once, snapshot recipients under a read lock and push
//! with `try_send` after the lock is released, so a slow client never blocks
//! delivery to the others.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::counter;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::connection::{ClientConnection, ConnectionId};
use super::registry::SubscriptionRegistry;
use crate::events::{MatchId, ServerMessage};
use crate::metrics::WS_BROADCAST_DROPS_TOTAL;

/// Connections that have dropped this many messages are torn down.
pub const MAX_TOTAL_DROPS: u64 = 100;

/// Manages the active connection table and event broadcasting.
pub struct BroadcastManager {
    /// Connected clients indexed by connection ID.
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
    /// Match subscriptions shared with the protocol handler.
    registry: Arc<SubscriptionRegistry>,
    /// Cached `connections.len()` for lock-free reads.
    active_count: AtomicUsize,
}

impl BroadcastManager {
    /// Create a new broadcast manager with an empty registry.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(SubscriptionRegistry::new()))
    }

    /// Create a broadcast manager over an existing registry.
    pub fn with_registry(registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            registry,
            active_count: AtomicUsize::new(0),
        }
    }

    /// Add a connection.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write();
        if conns.insert(connection.id, connection).is_none() {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Tear a connection down: remove it from the table, drop all of its
    /// subscriptions and terminate its session.
    ///
    /// Only the first call for a given ID does anything; returns whether this
    /// call performed the teardown.
    pub fn teardown(&self, connection_id: ConnectionId) -> bool {
        let removed = self.connections.write().remove(&connection_id);
        let Some(connection) = removed else {
            return false;
        };
        let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
        let dropped = self.registry.drop_all(&connection);
        connection.terminate();
        debug!(conn_id = %connection_id, subscriptions = dropped, "connection torn down");
        true
    }

    /// Broadcast a message to every open connection.
    ///
    /// Returns the number of connections the message was enqueued for.
    pub fn broadcast_all(&self, message: &ServerMessage<'_>) -> usize {
        let Some(json) = serialize(message) else {
            return 0;
        };
        let recipients: Vec<Arc<ClientConnection>> =
            self.connections.read().values().cloned().collect();
        debug!(
            message_type = message.kind(),
            recipients = recipients.len(),
            "broadcast to all"
        );
        self.deliver(&recipients, &json)
    }

    /// Broadcast a message to the connections subscribed to `match_id`.
    ///
    /// A match with no subscribers is a silent no-op. Returns the number of
    /// connections the message was enqueued for.
    pub fn broadcast_to_match(&self, match_id: MatchId, message: &ServerMessage<'_>) -> usize {
        let ids = self.registry.connections_for(match_id);
        if ids.is_empty() {
            return 0;
        }
        let Some(json) = serialize(message) else {
            return 0;
        };
        let recipients: Vec<Arc<ClientConnection>> = {
            let conns = self.connections.read();
            ids.iter().filter_map(|id| conns.get(id).cloned()).collect()
        };
        debug!(
            message_type = message.kind(),
            %match_id,
            recipients = recipients.len(),
            "broadcast to match"
        );
        self.deliver(&recipients, &json)
    }

    /// Push `json` to each recipient; evict those that keep dropping.
    fn deliver(&self, recipients: &[Arc<ClientConnection>], json: &Arc<String>) -> usize {
        let mut delivered = 0;
        let mut slow = Vec::new();
        for conn in recipients {
            if conn.send(Arc::clone(json)) {
                delivered += 1;
            } else if !conn.is_closed() {
                counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                if conn.drop_count() >= MAX_TOTAL_DROPS {
                    slow.push(conn.id);
                } else {
                    warn!(conn_id = %conn.id, "failed to enqueue broadcast for client");
                }
            }
        }
        for id in slow {
            if self.teardown(id) {
                info!(conn_id = %id, max = MAX_TOTAL_DROPS, "evicting slow client");
            }
        }
        delivered
    }

    /// Number of active connections.
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Snapshot of all active connections.
    pub fn connections(&self) -> Vec<Arc<ClientConnection>> {
        self.connections.read().values().cloned().collect()
    }

    /// Look up an active connection.
    pub fn get(&self, connection_id: ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.read().get(&connection_id).cloned()
    }

    /// The subscription registry.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}

fn serialize(message: &ServerMessage<'_>) -> Option<Arc<String>> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Arc::new(json)),
        Err(e) => {
            warn!(message_type = message.kind(), error = %e, "failed to serialize message");
            None
        }
    }
}
