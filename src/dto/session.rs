use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::{GameScoreEntity, PollQuestionEntity, QuizQuestionEntity};

/// Poll question as shown to attendees while the poll is live.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct PollQuestionView {
    /// Question identifier, echoed back in votes.
    pub id: Uuid,
    /// Question text.
    pub text: String,
    /// Answer options in display order.
    pub options: Vec<String>,
    /// Configured countdown for this question.
    pub timer_seconds: u32,
}

impl From<PollQuestionEntity> for PollQuestionView {
    fn from(question: PollQuestionEntity) -> Self {
        Self {
            id: question.id,
            text: question.text,
            options: question.options,
            timer_seconds: question.timer_seconds,
        }
    }
}

/// Quiz question as shown to attendees while the quiz is live.
///
/// The correct-option index stays server side; it must never reach an
/// attendee payload.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct QuizQuestionView {
    /// Question identifier, echoed back in votes.
    pub id: Uuid,
    /// Question text.
    pub text: String,
    /// Answer options in display order.
    pub options: Vec<String>,
}

impl From<QuizQuestionEntity> for QuizQuestionView {
    fn from(question: QuizQuestionEntity) -> Self {
        Self {
            id: question.id,
            text: question.text,
            options: question.options,
        }
    }
}

/// One ranked row of the quiz leaderboard.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// Rank starting at 1.
    pub rank: u32,
    /// Attendee display name.
    pub name: String,
    /// Number of correctly answered questions.
    pub score: u32,
}

/// Best break-game score across all attendees.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct HighScore {
    /// Display name of the record holder.
    pub name: String,
    /// The score reached.
    pub score: i64,
}

impl HighScore {
    /// Pair a score row with the display name of the attendee who set it.
    pub fn from_entity(entity: &GameScoreEntity, name: String) -> Self {
        Self {
            name,
            score: entity.score,
        }
    }
}

/// Full description of what is live right now.
///
/// Broadcast on every transition and pushed verbatim to every client that
/// (re)connects, so a client that missed arbitrary history converges by
/// pattern-matching this one payload. Also returned by the snapshot route.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ActivitySnapshot {
    /// Nothing is live. Carries the final leaderboard when the activity
    /// that just ended was a quiz.
    Idle {
        /// Final quiz ranking, present only right after a quiz ended.
        #[serde(skip_serializing_if = "Option::is_none")]
        quiz_leaderboard: Option<Vec<LeaderboardEntry>>,
    },
    /// Break game is up.
    Break {
        /// All-time best game score, if anyone has played yet.
        high_score: Option<HighScore>,
    },
    /// A poll question is live.
    Poll {
        /// The live question.
        question: PollQuestionView,
        /// Seconds left, derived from the persisted start time.
        remaining_seconds: u32,
        /// Current per-option counts; present on snapshot reads so polling
        /// clients converge without the push channel.
        #[serde(skip_serializing_if = "Option::is_none")]
        counts: Option<Vec<u64>>,
    },
    /// A quiz is live.
    Quiz {
        /// The live quiz.
        quiz_id: Uuid,
        /// Seconds left, derived from the persisted start time.
        remaining_seconds: u32,
        /// Questions in creation order, stripped of correct answers.
        questions: Vec<QuizQuestionView>,
    },
}

impl ActivitySnapshot {
    /// Idle snapshot without a leaderboard attached.
    pub fn idle() -> Self {
        Self::Idle {
            quiz_leaderboard: None,
        }
    }
}
