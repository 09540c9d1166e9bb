#[cfg(test)]
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    ActivityStateEntity, AttendeeEntity, GameScoreEntity, PollQuestionEntity, PollResponseEntity,
    QuizEntity, QuizQuestionEntity, QuizResponseEntity, ResponseKind,
};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for the live session.
///
/// The orchestrator only ever needs point lookups by id, fail-closed
/// response inserts (the uniqueness constraint on `(question_id,
/// attendee_id)` turns duplicates into `Ok(false)`), count-by-predicate for
/// tallies, and the fixed-id upsert of the activity singleton. Question and
/// quiz collections are written by the admin tooling outside this service;
/// this trait only reads them.
pub trait SessionStore: Send + Sync {
    /// Look up an attendee by id.
    fn find_attendee(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<AttendeeEntity>>>;
    /// Look up an attendee by the session token their client presented.
    fn find_attendee_by_token(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<AttendeeEntity>>>;
    /// Insert a new attendee. Returns `false` when the display name is
    /// already taken.
    fn insert_attendee(&self, attendee: AttendeeEntity)
    -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete an attendee together with their responses and game scores.
    /// Returns `false` when no such attendee exists.
    fn delete_attendee(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Number of registered attendees.
    fn count_attendees(&self) -> BoxFuture<'static, StorageResult<u64>>;

    /// Look up a poll question by id.
    fn find_poll_question(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<PollQuestionEntity>>>;
    /// Look up a quiz by id.
    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>>;
    /// Look up a quiz question by id.
    fn find_quiz_question(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuizQuestionEntity>>>;
    /// All questions of a quiz, ordered by creation time.
    fn list_quiz_questions(
        &self,
        quiz_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuizQuestionEntity>>>;

    /// Insert a poll response. Returns `false` when the attendee already
    /// answered this question (idempotent duplicate).
    fn insert_poll_response(
        &self,
        response: PollResponseEntity,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Insert a quiz response. Returns `false` when the attendee already
    /// answered this question (idempotent duplicate).
    fn insert_quiz_response(
        &self,
        response: QuizResponseEntity,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Count responses matching `(question_id, option_index)` in the
    /// response table selected by `kind`.
    fn count_responses(
        &self,
        kind: ResponseKind,
        question_id: Uuid,
        option_index: u32,
    ) -> BoxFuture<'static, StorageResult<u64>>;
    /// All quiz responses against any of the given question ids, in
    /// insertion order.
    fn list_quiz_responses(
        &self,
        question_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<QuizResponseEntity>>>;

    /// Append one break-game score row.
    fn insert_game_score(
        &self,
        score: GameScoreEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// The single highest game score across all attendees, if any.
    fn top_game_score(&self) -> BoxFuture<'static, StorageResult<Option<GameScoreEntity>>>;

    /// Replace the activity singleton (fixed-id upsert).
    fn save_activity_state(
        &self,
        state: ActivityStateEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Read the activity singleton. `None` means the room has never left
    /// idle and is treated as idle by callers.
    fn load_activity_state(
        &self,
    ) -> BoxFuture<'static, StorageResult<Option<ActivityStateEntity>>>;

    /// Cheap liveness probe against the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
