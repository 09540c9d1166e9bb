use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dao::models::AttendeeEntity;
use crate::dto::{format_system_time, validation::validate_display_name};

#[derive(Debug, Deserialize, ToSchema)]
/// Request putting a poll question live.
pub struct StartPollRequest {
    /// Question to run.
    pub question_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
/// Request putting a quiz live.
pub struct StartQuizRequest {
    /// Quiz to run.
    pub quiz_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// Generic acknowledgement returned by session commands.
pub struct ActionResponse {
    /// Outcome marker, always "ok" (invalid targets are silent no-ops).
    pub status: String,
}

impl ActionResponse {
    /// Acknowledgement for an accepted command.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
/// Attendee self-registration request.
pub struct RegisterAttendeeRequest {
    /// Desired display name, globally unique and case-sensitive.
    #[validate(custom(function = validate_display_name))]
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Identity issued to a freshly registered attendee.
pub struct AttendeeRegistered {
    /// Attendee identifier.
    pub id: Uuid,
    /// Display name as stored.
    pub name: String,
    /// Opaque credential the client presents on join/vote/score.
    pub session_token: String,
    /// Registration timestamp (RFC3339).
    pub created_at: String,
}

impl From<AttendeeEntity> for AttendeeRegistered {
    fn from(attendee: AttendeeEntity) -> Self {
        Self {
            id: attendee.id,
            name: attendee.name,
            session_token: attendee.session_token,
            created_at: format_system_time(attendee.created_at),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Number of registered attendees.
pub struct AttendeeCountResponse {
    /// Total attendees in the store.
    pub count: u64,
}
