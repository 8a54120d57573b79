//! WebSocket session lifecycle: handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::broadcast::BroadcastManager;
use super::connection::{ClientConnection, ConnectionId, OutboundFrame};
use super::handler::{handle_binary, handle_message};
use crate::events::ServerMessage;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL, WS_MESSAGES_RECEIVED_TOTAL,
};

/// How long the writer may keep flushing after the read loop ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Why the read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    ClientClosed,
    StreamEnded,
    TransportError,
    Terminated,
    ServerShutdown,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection and enqueues the `welcome` message
/// 2. Forwards the outbound queue (and heartbeat probes) to the socket
/// 3. Dispatches incoming frames through the protocol handler
/// 4. Tears the connection down on close, error, eviction or shutdown, then
///    lets the writer flush and send the close frame
#[instrument(skip_all, fields(client_id = %client_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    client_id: ConnectionId,
    broadcast: Arc<BroadcastManager>,
    queue_capacity: usize,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<OutboundFrame>(queue_capacity.max(1));
    let connection = Arc::new(ClientConnection::new(client_id, send_tx));

    let connection_start = Instant::now();
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // Queued before the connection becomes visible to broadcasts, so it is
    // always the first frame.
    let _ = connection.send_message(&ServerMessage::Welcome);
    broadcast.add(connection.clone());

    // Outbound forwarder. Heartbeat probes share the queue so they are
    // ordered with regular traffic. Once every sender is gone it finishes
    // the closing handshake (or answers the client's close).
    let mut outbound = tokio::spawn(async move {
        while let Some(frame) = send_rx.recv().await {
            let msg = match frame {
                OutboundFrame::Text(text) => Message::Text(text.as_str().to_owned().into()),
                OutboundFrame::Ping => Message::Ping(Vec::<u8>::new().into()),
            };
            if ws_tx.send(msg).await.is_err() {
                return;
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    let registry = broadcast.registry().clone();
    let end = loop {
        let next = tokio::select! {
            () = connection.terminated() => break SessionEnd::Terminated,
            () = shutdown.cancelled() => break SessionEnd::ServerShutdown,
            next = ws_rx.next() => next,
        };

        let reply = match next {
            Some(Ok(Message::Text(text))) => {
                counter!(WS_MESSAGES_RECEIVED_TOTAL).increment(1);
                handle_message(text.as_str(), &connection, &registry)
            }
            Some(Ok(Message::Binary(data))) => {
                counter!(WS_MESSAGES_RECEIVED_TOTAL).increment(1);
                handle_binary(&data, &connection, &registry)
            }
            Some(Ok(Message::Pong(_))) => {
                connection.mark_alive();
                None
            }
            // axum answers pings itself
            Some(Ok(Message::Ping(_))) => None,
            Some(Ok(Message::Close(_))) => break SessionEnd::ClientClosed,
            Some(Err(e)) => {
                warn!(error = %e, "websocket transport error");
                break SessionEnd::TransportError;
            }
            None => break SessionEnd::StreamEnded,
        };

        if let Some(reply) = reply {
            if !connection.send_message(&reply) {
                debug!(reply = reply.kind(), "failed to enqueue reply (queue full or closed)");
            }
        }
    };

    let _ = broadcast.teardown(client_id);
    info!(reason = ?end, "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection_start.elapsed().as_secs_f64());

    // Release our sender so the writer can drain and close. A writer stuck on
    // a dead socket is cut off.
    drop(connection);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut outbound)
        .await
        .is_err()
    {
        debug!("writer did not drain in time, aborting");
        outbound.abort();
    }
}
