//! In-memory [`SessionStore`] used by the unit tests.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    ActivityStateEntity, AttendeeEntity, GameScoreEntity, PollQuestionEntity, PollResponseEntity,
    QuizEntity, QuizQuestionEntity, QuizResponseEntity, ResponseKind,
};
use crate::dao::session_store::SessionStore;
use crate::dao::storage::StorageResult;

#[derive(Default)]
struct Inner {
    attendees: Vec<AttendeeEntity>,
    poll_questions: Vec<PollQuestionEntity>,
    quizzes: Vec<QuizEntity>,
    quiz_questions: Vec<QuizQuestionEntity>,
    poll_responses: Vec<PollResponseEntity>,
    quiz_responses: Vec<QuizResponseEntity>,
    game_scores: Vec<GameScoreEntity>,
    activity_state: Option<ActivityStateEntity>,
}

/// Store double keeping everything behind one mutex. Insertion order is the
/// storage order, matching the creation-time sorts of the real backend.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_attendee(&self, attendee: AttendeeEntity) {
        self.inner.lock().unwrap().attendees.push(attendee);
    }

    pub fn seed_poll_question(&self, question: PollQuestionEntity) {
        self.inner.lock().unwrap().poll_questions.push(question);
    }

    pub fn seed_quiz(&self, quiz: QuizEntity) {
        self.inner.lock().unwrap().quizzes.push(quiz);
    }

    pub fn seed_quiz_question(&self, question: QuizQuestionEntity) {
        self.inner.lock().unwrap().quiz_questions.push(question);
    }

    pub fn seed_game_score(&self, score: GameScoreEntity) {
        self.inner.lock().unwrap().game_scores.push(score);
    }

    pub fn activity_state(&self) -> Option<ActivityStateEntity> {
        self.inner.lock().unwrap().activity_state.clone()
    }

    pub fn poll_responses(&self) -> Vec<PollResponseEntity> {
        self.inner.lock().unwrap().poll_responses.clone()
    }

    pub fn quiz_responses(&self) -> Vec<QuizResponseEntity> {
        self.inner.lock().unwrap().quiz_responses.clone()
    }
}

impl SessionStore for MemorySessionStore {
    fn find_attendee(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<AttendeeEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.lock().unwrap();
            Ok(guard.attendees.iter().find(|a| a.id == id).cloned())
        })
    }

    fn find_attendee_by_token(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<AttendeeEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.lock().unwrap();
            Ok(guard
                .attendees
                .iter()
                .find(|a| a.session_token == token)
                .cloned())
        })
    }

    fn insert_attendee(
        &self,
        attendee: AttendeeEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.lock().unwrap();
            if guard.attendees.iter().any(|a| a.name == attendee.name) {
                return Ok(false);
            }
            guard.attendees.push(attendee);
            Ok(true)
        })
    }

    fn delete_attendee(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.lock().unwrap();
            guard.poll_responses.retain(|r| r.attendee_id != id);
            guard.quiz_responses.retain(|r| r.attendee_id != id);
            guard.game_scores.retain(|s| s.attendee_id != id);
            let before = guard.attendees.len();
            guard.attendees.retain(|a| a.id != id);
            Ok(guard.attendees.len() < before)
        })
    }

    fn count_attendees(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.lock().unwrap().attendees.len() as u64) })
    }

    fn find_poll_question(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<PollQuestionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.lock().unwrap();
            Ok(guard.poll_questions.iter().find(|q| q.id == id).cloned())
        })
    }

    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.lock().unwrap();
            Ok(guard.quizzes.iter().find(|q| q.id == id).cloned())
        })
    }

    fn find_quiz_question(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuizQuestionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.lock().unwrap();
            Ok(guard.quiz_questions.iter().find(|q| q.id == id).cloned())
        })
    }

    fn list_quiz_questions(
        &self,
        quiz_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuizQuestionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.lock().unwrap();
            let mut questions: Vec<_> = guard
                .quiz_questions
                .iter()
                .filter(|q| q.quiz_id == quiz_id)
                .cloned()
                .collect();
            questions.sort_by_key(|q| q.created_at);
            Ok(questions)
        })
    }

    fn insert_poll_response(
        &self,
        response: PollResponseEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.lock().unwrap();
            let duplicate = guard.poll_responses.iter().any(|r| {
                r.question_id == response.question_id && r.attendee_id == response.attendee_id
            });
            if duplicate {
                return Ok(false);
            }
            guard.poll_responses.push(response);
            Ok(true)
        })
    }

    fn insert_quiz_response(
        &self,
        response: QuizResponseEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.lock().unwrap();
            let duplicate = guard.quiz_responses.iter().any(|r| {
                r.question_id == response.question_id && r.attendee_id == response.attendee_id
            });
            if duplicate {
                return Ok(false);
            }
            guard.quiz_responses.push(response);
            Ok(true)
        })
    }

    fn count_responses(
        &self,
        kind: ResponseKind,
        question_id: Uuid,
        option_index: u32,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.lock().unwrap();
            let count = match kind {
                ResponseKind::Poll => guard
                    .poll_responses
                    .iter()
                    .filter(|r| r.question_id == question_id && r.selected_option == option_index)
                    .count(),
                ResponseKind::Quiz => guard
                    .quiz_responses
                    .iter()
                    .filter(|r| r.question_id == question_id && r.selected_option == option_index)
                    .count(),
            };
            Ok(count as u64)
        })
    }

    fn list_quiz_responses(
        &self,
        question_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<QuizResponseEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.lock().unwrap();
            Ok(guard
                .quiz_responses
                .iter()
                .filter(|r| question_ids.contains(&r.question_id))
                .cloned()
                .collect())
        })
    }

    fn insert_game_score(
        &self,
        score: GameScoreEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.lock().unwrap().game_scores.push(score);
            Ok(())
        })
    }

    fn top_game_score(&self) -> BoxFuture<'static, StorageResult<Option<GameScoreEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.lock().unwrap();
            Ok(guard
                .game_scores
                .iter()
                .max_by_key(|s| s.score)
                .cloned())
        })
    }

    fn save_activity_state(
        &self,
        state: ActivityStateEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.lock().unwrap().activity_state = Some(state);
            Ok(())
        })
    }

    fn load_activity_state(
        &self,
    ) -> BoxFuture<'static, StorageResult<Option<ActivityStateEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.lock().unwrap().activity_state.clone()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
