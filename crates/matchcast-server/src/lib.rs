//! # matchcast-server
//!
//! Real-time sports notification layer: clients connect over WebSocket,
//! subscribe to matches and receive `match_created` and `commentary` events
//! pushed by the write path through [`Notifier`].
//!
//! - [`server`]: Axum router, `/ws` upgrade, `/health`, `/metrics`
//! - [`websocket`]: connections, subscriptions, heartbeat, broadcasting
//! - [`notifier`]: the producer-facing [`DomainEventSink`]
//! - [`events`]: wire types and domain records

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod metrics;
pub mod notifier;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use error::ServerError;
pub use events::{ClientMessage, CommentaryRecord, MatchId, MatchRecord, MatchStatus, ServerMessage};
pub use notifier::{DomainEventSink, Notifier};
pub use server::MatchcastServer;
pub use shutdown::ShutdownCoordinator;
