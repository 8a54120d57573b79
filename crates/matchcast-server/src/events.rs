//! Wire types: domain records handed in by the write path, inbound client
//! messages and outbound server messages.

use std::num::NonZeroU64;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a match. Always a positive integer.
///
/// Decodes from any integer-valued JSON number, so `42.0` is the same match
/// as `42`. Fractions, zero, negatives and non-numbers are rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Number", into = "u64")]
pub struct MatchId(NonZeroU64);

/// Rejected match identifier (zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("match id must be a positive integer")]
pub struct InvalidMatchId;

impl MatchId {
    /// Build a match id, rejecting zero.
    pub const fn new(id: u64) -> Option<Self> {
        match NonZeroU64::new(id) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    /// The raw integer value.
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl TryFrom<u64> for MatchId {
    type Error = InvalidMatchId;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidMatchId)
    }
}

/// Largest integer a JSON double represents exactly.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

impl TryFrom<serde_json::Number> for MatchId {
    type Error = InvalidMatchId;

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::float_cmp
    )]
    fn try_from(value: serde_json::Number) -> Result<Self, Self::Error> {
        if let Some(n) = value.as_u64() {
            return Self::try_from(n);
        }
        match value.as_f64() {
            Some(f) if f.trunc() == f && (1.0..=MAX_EXACT_FLOAT_INT).contains(&f) => {
                Self::try_from(f as u64)
            }
            _ => Err(InvalidMatchId),
        }
    }
}

impl From<MatchId> for u64 {
    fn from(id: MatchId) -> Self {
        id.get()
    }
}

impl std::fmt::Display for MatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a match.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// Not started yet.
    #[default]
    Scheduled,
    /// In progress.
    Live,
    /// Over.
    Finished,
}

/// A persisted match, as returned by the write path after insert.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    /// Primary key.
    pub id: MatchId,
    /// Sport name (e.g. `"football"`).
    pub sport: String,
    /// Home team name.
    pub home_team: String,
    /// Away team name.
    pub away_team: String,
    /// Current status.
    pub status: MatchStatus,
    /// Scheduled kick-off.
    pub start_time: DateTime<Utc>,
    /// Scheduled or actual end.
    pub end_time: Option<DateTime<Utc>>,
    /// Home score.
    pub home_score: u32,
    /// Away score.
    pub away_score: u32,
    /// Insert timestamp.
    pub created_at: DateTime<Utc>,
}

/// A persisted commentary entry for one match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentaryRecord {
    /// Primary key.
    pub id: u64,
    /// Owning match; routes the broadcast.
    pub match_id: MatchId,
    /// Match minute, if known.
    pub minute: Option<u32>,
    /// Ordering within the match feed.
    pub sequence: u32,
    /// Period label (e.g. `"1H"`).
    pub period: Option<String>,
    /// Event kind (e.g. `"goal"`).
    pub event_type: String,
    /// Player or official involved.
    pub actor: Option<String>,
    /// Team involved.
    pub team: Option<String>,
    /// Commentary text.
    pub message: String,
    /// Free-form extra data.
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    /// Free-form labels.
    pub tags: Option<Vec<String>>,
    /// Insert timestamp.
    pub created_at: DateTime<Utc>,
}

/// Inbound client message, discriminated by `type`.
///
/// Decoding fails for a known `type` whose `matchId` is not a positive
/// integer; any other `type` decodes to [`ClientMessage::Unknown`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Start receiving commentary for a match.
    Subscribe {
        /// Target match.
        #[serde(rename = "matchId")]
        match_id: MatchId,
    },
    /// Stop receiving commentary for a match.
    Unsubscribe {
        /// Target match.
        #[serde(rename = "matchId")]
        match_id: MatchId,
    },
    /// Any other message type.
    #[serde(other)]
    Unknown,
}

/// Outbound server message. Payloads are borrowed so a broadcast serializes
/// the record once without cloning it.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    /// Sent once right after the connection is accepted.
    Welcome,
    /// Acknowledges a subscribe.
    Subscribed {
        /// Match that was subscribed.
        #[serde(rename = "matchId")]
        match_id: MatchId,
    },
    /// Acknowledges an unsubscribe.
    Unsubscribed {
        /// Match that was unsubscribed.
        #[serde(rename = "matchId")]
        match_id: MatchId,
    },
    /// Inbound message could not be parsed.
    Error {
        /// Human-readable reason.
        message: &'a str,
    },
    /// A new match was created.
    MatchCreated {
        /// The created match.
        data: &'a MatchRecord,
    },
    /// A commentary entry was posted.
    Commentary {
        /// The posted entry.
        data: &'a CommentaryRecord,
    },
}

impl ServerMessage<'_> {
    /// Value of the `type` discriminator, for logging.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Subscribed { .. } => "subscribed",
            Self::Unsubscribed { .. } => "unsubscribed",
            Self::Error { .. } => "error",
            Self::MatchCreated { .. } => "match_created",
            Self::Commentary { .. } => "commentary",
        }
    }
}
