use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::ResponseKind;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from attendee WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttendeeInboundMessage {
    /// Announce presence with the session token issued at registration.
    Join {
        /// Attendee session token.
        token: String,
    },
    /// Submit a response to the live poll or quiz question.
    Vote {
        /// Question being answered.
        question_id: Uuid,
        /// Chosen option index.
        option: u32,
        /// Attendee session token.
        token: String,
        /// Which response table the vote targets.
        kind: ResponseKind,
    },
    /// Submit a break-game score.
    Score {
        /// Score reached in the round.
        score: i64,
        /// Attendee session token.
        token: String,
    },
    #[serde(other)]
    /// Anything unrecognised; ignored.
    Unknown,
}

impl AttendeeInboundMessage {
    /// Parse a message from the raw text frame.
    pub fn from_json_str(value: &str) -> serde_json::Result<Self> {
        serde_json::from_str(value)
    }
}
