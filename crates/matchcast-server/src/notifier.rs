//! Producer-facing notification API.
//!
//! The write path (whatever persists matches and commentary) depends only on
//! [`DomainEventSink`]; [`Notifier`] is the implementation backed by the
//! WebSocket broadcast manager.

use std::sync::Arc;

use tracing::debug;

use crate::events::{CommentaryRecord, MatchRecord, ServerMessage};
use crate::websocket::broadcast::BroadcastManager;

/// Receives domain events after they are persisted.
///
/// Calls are synchronous and never fail from the caller's point of view;
/// delivery is best-effort.
pub trait DomainEventSink: Send + Sync {
    /// A match was created.
    fn match_created(&self, record: &MatchRecord);
    /// A commentary entry was posted.
    fn commentary_created(&self, record: &CommentaryRecord);
}

/// Pushes domain events to connected WebSocket clients.
#[derive(Clone)]
pub struct Notifier {
    broadcast: Arc<BroadcastManager>,
}

impl Notifier {
    /// Create a notifier over `broadcast`.
    pub fn new(broadcast: Arc<BroadcastManager>) -> Self {
        Self { broadcast }
    }

    /// Send `match_created` to every connected client.
    ///
    /// Returns the number of clients the message was enqueued for.
    pub fn notify_match_created(&self, record: &MatchRecord) -> usize {
        let sent = self
            .broadcast
            .broadcast_all(&ServerMessage::MatchCreated { data: record });
        debug!(match_id = %record.id, sent, "match_created notified");
        sent
    }

    /// Send `commentary` to the clients subscribed to the entry's match.
    ///
    /// Returns the number of clients the message was enqueued for.
    pub fn notify_commentary_created(&self, record: &CommentaryRecord) -> usize {
        let sent = self
            .broadcast
            .broadcast_to_match(record.match_id, &ServerMessage::Commentary { data: record });
        debug!(match_id = %record.match_id, commentary_id = record.id, sent, "commentary notified");
        sent
    }
}

impl DomainEventSink for Notifier {
    fn match_created(&self, record: &MatchRecord) {
        let _ = self.notify_match_created(record);
    }

    fn commentary_created(&self, record: &CommentaryRecord) {
        let _ = self.notify_commentary_created(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::fixtures::{commentary, match_id, match_record};
    use crate::websocket::connection::{ClientConnection, ConnectionId, OutboundFrame};
    use tokio::sync::mpsc;

    fn connect(bm: &BroadcastManager) -> (Arc<ClientConnection>, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(8);
        let conn = Arc::new(ClientConnection::new(ConnectionId::new(), tx));
        bm.add(conn.clone());
        (conn, rx)
    }

    fn next_json(rx: &mut mpsc::Receiver<OutboundFrame>) -> Option<serde_json::Value> {
        match rx.try_recv().ok()? {
            OutboundFrame::Text(text) => serde_json::from_str(&text).ok(),
            OutboundFrame::Ping => None,
        }
    }

    #[test]
    fn match_created_goes_to_everyone() {
        let bm = Arc::new(BroadcastManager::new());
        let (_a, mut rx_a) = connect(&bm);
        let (_b, mut rx_b) = connect(&bm);
        let notifier = Notifier::new(bm);

        assert_eq!(notifier.notify_match_created(&match_record(3)), 2);
        for rx in [&mut rx_a, &mut rx_b] {
            let v = next_json(rx).unwrap();
            assert_eq!(v["type"], "match_created");
            assert_eq!(v["data"]["id"], 3);
        }
    }

    #[test]
    fn commentary_goes_to_subscribers_only() {
        let bm = Arc::new(BroadcastManager::new());
        let (a, mut rx_a) = connect(&bm);
        let (_b, mut rx_b) = connect(&bm);
        assert!(bm.registry().subscribe(match_id(42), &a));
        let notifier = Notifier::new(bm);

        assert_eq!(notifier.notify_commentary_created(&commentary(1, 42, "Goal!")), 1);
        let v = next_json(&mut rx_a).unwrap();
        assert_eq!(v["type"], "commentary");
        assert_eq!(v["data"]["message"], "Goal!");
        assert!(next_json(&mut rx_b).is_none());
    }

    #[test]
    fn commentary_for_unwatched_match_is_dropped_silently() {
        let bm = Arc::new(BroadcastManager::new());
        let (_a, mut rx_a) = connect(&bm);
        let notifier = Notifier::new(bm);

        assert_eq!(notifier.notify_commentary_created(&commentary(1, 77, "quiet")), 0);
        assert!(next_json(&mut rx_a).is_none());
    }

    #[test]
    fn usable_through_the_trait_object() {
        let bm = Arc::new(BroadcastManager::new());
        let (a, mut rx_a) = connect(&bm);
        assert!(bm.registry().subscribe(match_id(5), &a));
        let sink: Box<dyn DomainEventSink> = Box::new(Notifier::new(bm));

        sink.match_created(&match_record(5));
        sink.commentary_created(&commentary(2, 5, "Corner"));
        assert_eq!(next_json(&mut rx_a).unwrap()["type"], "match_created");
        assert_eq!(next_json(&mut rx_a).unwrap()["type"], "commentary");
    }
}
