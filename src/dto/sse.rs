use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::ResponseKind;
use crate::dto::session::{ActivitySnapshot, HighScore};

#[derive(Clone, Debug)]
/// Dispatched payload carried across the realtime channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Construct an event from an already-serialised data field.
    pub fn new<E>(event: E, data: String) -> Self
    where
        E: Into<Option<String>>,
    {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Convenience wrapper that serialises `payload` into the data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast whenever the live activity changes, and pushed to every
/// (re)connecting client as its mandatory first message.
pub struct StateChangedEvent(pub ActivitySnapshot);

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once per second while a poll or quiz countdown runs.
pub struct TimerTickEvent {
    /// Seconds left on the live countdown.
    pub remaining_seconds: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast after each accepted response with the fresh per-option counts.
pub struct TallyUpdatedEvent {
    /// Question the counts belong to.
    pub question_id: Uuid,
    /// Whether the question is a poll or a quiz question; poll and quiz
    /// ids live in different tables and never share a tally.
    pub kind: ResponseKind,
    /// Response count per option index.
    pub counts: Vec<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a poll countdown expires, carrying the final counts.
pub struct ActivityEndedEvent {
    /// Question that just closed.
    pub question_id: Uuid,
    /// Final response count per option index.
    pub counts: Vec<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when an attendee joins the room.
pub struct PeerJoinedEvent {
    /// Display name of the attendee who joined.
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever the number of joined attendees changes.
pub struct PeersActiveEvent {
    /// Number of connections that joined with a valid token.
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast when a newly submitted game score is announced.
pub struct HighScoreUpdatedEvent(pub HighScore);
