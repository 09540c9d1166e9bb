use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Attendee identity issued at registration.
///
/// The display name is globally unique (case-sensitive) and the session
/// token is the opaque credential attendee clients present on every
/// realtime command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttendeeEntity {
    /// Stable identifier for the attendee.
    pub id: Uuid,
    /// Unique display name chosen at registration.
    pub name: String,
    /// Opaque credential presented by the attendee's client.
    pub session_token: String,
    /// Registration timestamp.
    pub created_at: SystemTime,
}

/// Standalone poll question tied to a topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollQuestionEntity {
    /// Stable identifier for the question.
    pub id: Uuid,
    /// Topic the question belongs to, when organised under one.
    pub topic_id: Option<Uuid>,
    /// Question text (rich text as authored).
    pub text: String,
    /// Answer options, 4 to 6 entries.
    pub options: Vec<String>,
    /// Countdown duration used when this question goes live.
    pub timer_seconds: u32,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Quiz definition grouping a set of quiz questions under one countdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizEntity {
    /// Stable identifier for the quiz.
    pub id: Uuid,
    /// Display name of the quiz.
    pub name: String,
    /// Total countdown duration for the whole quiz.
    pub timer_seconds: u32,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Question belonging to a quiz, carrying the designated correct option.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizQuestionEntity {
    /// Stable identifier for the question.
    pub id: Uuid,
    /// Quiz this question belongs to.
    pub quiz_id: Uuid,
    /// Question text (rich text as authored).
    pub text: String,
    /// Answer options, 4 to 6 entries.
    pub options: Vec<String>,
    /// Index of the correct option. Never exposed to attendee payloads.
    pub correct_option_index: u32,
    /// Creation timestamp; quiz questions are presented in creation order.
    pub created_at: SystemTime,
}

/// A single attendee's answer to a poll question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollResponseEntity {
    /// Stable identifier for the response row.
    pub id: Uuid,
    /// Question answered.
    pub question_id: Uuid,
    /// Attendee who answered. At most one row per (question, attendee).
    pub attendee_id: Uuid,
    /// Option index chosen by the attendee.
    pub selected_option: u32,
    /// Submission timestamp.
    pub created_at: SystemTime,
}

/// A single attendee's answer to a quiz question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizResponseEntity {
    /// Stable identifier for the response row.
    pub id: Uuid,
    /// Question answered.
    pub question_id: Uuid,
    /// Attendee who answered. At most one row per (question, attendee).
    pub attendee_id: Uuid,
    /// Option index chosen by the attendee.
    pub selected_option: u32,
    /// Correctness evaluated once at write time against the question's
    /// correct index. Later edits to the question never rewrite this flag.
    pub is_correct: bool,
    /// Submission timestamp.
    pub created_at: SystemTime,
}

/// One break-game round played by an attendee. Append-only; the maximum
/// across an attendee's rows is their displayed high score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameScoreEntity {
    /// Stable identifier for the score row.
    pub id: Uuid,
    /// Attendee who played the round.
    pub attendee_id: Uuid,
    /// Score reached in the round.
    pub score: i64,
    /// Submission timestamp.
    pub created_at: SystemTime,
}

/// Kind of activity currently live for the room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Nothing is live.
    Idle,
    /// Break-game screen is up; timing is client-local.
    Break,
    /// A single poll question is live.
    Poll,
    /// A multi-question quiz is live.
    Quiz,
}

/// Which response table a vote targets. Poll and quiz questions live in
/// separate collections, so tallies are always scoped by this kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    /// Vote against a poll question.
    Poll,
    /// Vote against a quiz question.
    Quiz,
}

/// The process-wide singleton describing what is live right now.
///
/// `subject_id` is the question id for a poll and the quiz id for a quiz,
/// and absent otherwise. Remaining time is always re-derivable from
/// `started_at` plus the subject's configured duration; no running counter
/// is ever stored here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityStateEntity {
    /// Kind of the live activity.
    pub kind: ActivityKind,
    /// Subject of the activity, present iff kind is poll or quiz.
    pub subject_id: Option<Uuid>,
    /// When the activity went live.
    pub started_at: SystemTime,
}

impl ActivityStateEntity {
    /// Record representing an idle room, used when no row exists yet.
    pub fn idle() -> Self {
        Self {
            kind: ActivityKind::Idle,
            subject_id: None,
            started_at: SystemTime::now(),
        }
    }
}
