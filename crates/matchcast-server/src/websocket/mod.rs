//! WebSocket connection management, subscriptions, heartbeat, message
//! dispatch and broadcasting.
//!
//! | Module | Role |
//! |--------|------|
//! | [`connection`] | Per-client state and bounded outbound queue |
//! | [`registry`] | `MatchId → {ConnectionId}` subscription index |
//! | [`handler`] | Inbound frame parsing and subscribe/unsubscribe |
//! | [`broadcast`] | Active connection table and fan-out |
//! | [`heartbeat`] | Server-wide ping/pong liveness sweep |
//! | [`session`] | One client from upgrade to teardown |

pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod registry;
pub mod session;
