//! Match subscription registry: `MatchId → {ConnectionId}`.
//!
//! Every mutation edits the registry entry and the connection's own
//! subscription set under the registry write lock, so a connection is listed
//! under a match exactly when that match is in its set. Lock order is
//! registry, then connection.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tracing::debug;

use super::connection::{ClientConnection, ConnectionId};
use crate::events::MatchId;

/// Process-wide mapping from match to interested connections.
#[derive(Default)]
pub struct SubscriptionRegistry {
    matches: RwLock<HashMap<MatchId, HashSet<ConnectionId>>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `connection` to `match_id`.
    ///
    /// Idempotent. Returns `true` if the subscription was added, `false` if
    /// it already existed or the connection is closed.
    pub fn subscribe(&self, match_id: MatchId, connection: &ClientConnection) -> bool {
        let mut matches = self.matches.write();
        if connection.is_closed() {
            return false;
        }
        let added = matches
            .entry(match_id)
            .or_default()
            .insert(connection.id);
        let _ = connection.subscriptions_mut().insert(match_id);
        added
    }

    /// Unsubscribe `connection` from `match_id`, pruning the entry when it
    /// becomes empty.
    ///
    /// Idempotent. Returns `true` if a subscription was removed.
    pub fn unsubscribe(&self, match_id: MatchId, connection: &ClientConnection) -> bool {
        let mut matches = self.matches.write();
        let _ = connection.subscriptions_mut().remove(&match_id);
        remove_member(&mut matches, match_id, connection.id)
    }

    /// Remove `connection` from every match it is subscribed to and close it
    /// for further subscriptions.
    ///
    /// The connection's own set is the list of entries to visit. Returns the
    /// number of matches it was removed from; zero on repeat calls.
    pub fn drop_all(&self, connection: &ClientConnection) -> usize {
        let mut matches = self.matches.write();
        let _ = connection.mark_closed();
        let owned: Vec<MatchId> = connection.subscriptions_mut().drain().collect();
        let removed = owned
            .into_iter()
            .filter(|&match_id| remove_member(&mut matches, match_id, connection.id))
            .count();
        if removed > 0 {
            debug!(conn_id = %connection.id, removed, "dropped all subscriptions");
        }
        removed
    }

    /// Snapshot of the connections subscribed to `match_id` (possibly empty).
    pub fn connections_for(&self, match_id: MatchId) -> Vec<ConnectionId> {
        self.matches
            .read()
            .get(&match_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of subscribers for `match_id`.
    pub fn subscriber_count(&self, match_id: MatchId) -> usize {
        self.matches.read().get(&match_id).map_or(0, HashSet::len)
    }

    /// Number of matches with at least one subscriber.
    pub fn match_count(&self) -> usize {
        self.matches.read().len()
    }

    /// Whether `connection_id` is listed under `match_id`.
    pub fn contains(&self, match_id: MatchId, connection_id: ConnectionId) -> bool {
        self.matches
            .read()
            .get(&match_id)
            .is_some_and(|set| set.contains(&connection_id))
    }
}

/// Remove one member; drop the key when its set empties.
fn remove_member(
    matches: &mut HashMap<MatchId, HashSet<ConnectionId>>,
    match_id: MatchId,
    connection_id: ConnectionId,
) -> bool {
    let Some(set) = matches.get_mut(&match_id) else {
        return false;
    };
    let removed = set.remove(&connection_id);
    if set.is_empty() {
        let _ = matches.remove(&match_id);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::fixtures::match_id;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn conn() -> ClientConnection {
        let (tx, _rx) = mpsc::channel(8);
        ClientConnection::new(ConnectionId::new(), tx)
    }

    /// The registry and the connection's own set agree.
    fn assert_consistent(reg: &SubscriptionRegistry, c: &ClientConnection, ids: &[u64]) {
        for &raw in ids {
            let m = match_id(raw);
            assert_eq!(reg.contains(m, c.id), c.is_subscribed(m), "mismatch on match {raw}");
        }
    }

    #[test]
    fn subscribe_creates_entry_lazily() {
        let reg = SubscriptionRegistry::new();
        let c = conn();
        assert_eq!(reg.match_count(), 0);
        assert!(reg.subscribe(match_id(1), &c));
        assert_eq!(reg.match_count(), 1);
        assert_eq!(reg.connections_for(match_id(1)), vec![c.id]);
        assert!(c.is_subscribed(match_id(1)));
    }

    #[test]
    fn subscribe_is_idempotent() {
        let reg = SubscriptionRegistry::new();
        let c = conn();
        assert!(reg.subscribe(match_id(5), &c));
        assert!(!reg.subscribe(match_id(5), &c));
        assert_eq!(reg.subscriber_count(match_id(5)), 1);
        assert_eq!(c.subscriptions().len(), 1);
    }

    #[test]
    fn unsubscribe_absent_is_noop() {
        let reg = SubscriptionRegistry::new();
        let c = conn();
        assert!(!reg.unsubscribe(match_id(9), &c));
        assert_eq!(reg.match_count(), 0);

        assert!(reg.subscribe(match_id(1), &c));
        assert!(!reg.unsubscribe(match_id(2), &c));
        assert_eq!(reg.subscriber_count(match_id(1)), 1);
    }

    #[test]
    fn unsubscribe_prunes_empty_entry() {
        let reg = SubscriptionRegistry::new();
        let c = conn();
        let _ = reg.subscribe(match_id(3), &c);
        assert!(reg.unsubscribe(match_id(3), &c));
        assert_eq!(reg.match_count(), 0);
        assert!(!c.is_subscribed(match_id(3)));
    }

    #[test]
    fn unsubscribe_keeps_other_members() {
        let reg = SubscriptionRegistry::new();
        let (a, b) = (conn(), conn());
        let _ = reg.subscribe(match_id(3), &a);
        let _ = reg.subscribe(match_id(3), &b);
        let _ = reg.unsubscribe(match_id(3), &a);
        assert_eq!(reg.connections_for(match_id(3)), vec![b.id]);
    }

    #[test]
    fn drop_all_removes_every_entry() {
        let reg = SubscriptionRegistry::new();
        let (a, b) = (conn(), conn());
        for m in [1, 2, 3] {
            let _ = reg.subscribe(match_id(m), &a);
        }
        let _ = reg.subscribe(match_id(2), &b);

        assert_eq!(reg.drop_all(&a), 3);
        assert!(a.subscriptions().is_empty());
        assert_eq!(reg.match_count(), 1);
        assert_eq!(reg.connections_for(match_id(2)), vec![b.id]);
        assert!(reg.connections_for(match_id(1)).is_empty());
    }

    #[test]
    fn drop_all_twice_is_harmless() {
        let reg = SubscriptionRegistry::new();
        let c = conn();
        let _ = reg.subscribe(match_id(1), &c);
        assert_eq!(reg.drop_all(&c), 1);
        assert_eq!(reg.drop_all(&c), 0);
        assert_eq!(reg.match_count(), 0);
    }

    #[test]
    fn closed_connection_cannot_subscribe() {
        let reg = SubscriptionRegistry::new();
        let c = conn();
        let _ = reg.drop_all(&c);
        assert!(!reg.subscribe(match_id(1), &c));
        assert_eq!(reg.match_count(), 0);
        assert!(c.subscriptions().is_empty());
    }

    #[test]
    fn connections_for_unknown_match_is_empty() {
        let reg = SubscriptionRegistry::new();
        assert!(reg.connections_for(match_id(404)).is_empty());
        assert_eq!(reg.subscriber_count(match_id(404)), 0);
    }

    #[test]
    fn consistency_holds_after_mixed_mutations() {
        let reg = SubscriptionRegistry::new();
        let c = conn();
        let _ = reg.subscribe(match_id(1), &c);
        let _ = reg.subscribe(match_id(2), &c);
        let _ = reg.unsubscribe(match_id(1), &c);
        let _ = reg.subscribe(match_id(3), &c);
        assert_consistent(&reg, &c, &[1, 2, 3, 4]);
        let _ = reg.drop_all(&c);
        assert_consistent(&reg, &c, &[1, 2, 3, 4]);
    }

    #[test]
    fn parallel_subscribe_and_teardown_leave_no_dangling_ids() {
        let reg = Arc::new(SubscriptionRegistry::new());
        let conns: Vec<Arc<ClientConnection>> = (0..8).map(|_| Arc::new(conn())).collect();

        let handles: Vec<_> = conns
            .iter()
            .cloned()
            .map(|c| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    for m in 1..=50 {
                        let _ = reg.subscribe(match_id(m), &c);
                        if m % 3 == 0 {
                            let _ = reg.unsubscribe(match_id(m), &c);
                        }
                    }
                    let _ = reg.drop_all(&c);
                    // Late subscribe after teardown must not stick.
                    let _ = reg.subscribe(match_id(1), &c);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(reg.match_count(), 0);
        for c in &conns {
            assert!(c.subscriptions().is_empty());
        }
    }
}
