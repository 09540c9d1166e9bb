//! Quiz leaderboard: correct-answer sums ranked across all attendees who
//! answered at least one question.

use std::sync::Arc;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    dao::models::QuizResponseEntity, dao::session_store::SessionStore,
    dto::session::LeaderboardEntry, error::ServiceError,
};

/// Compute the ranked leaderboard for `quiz_id`, truncated to `limit`.
///
/// Attendees who answered at least one question appear even with zero
/// correct answers; attendees who never answered are absent entirely.
pub async fn leaderboard(
    store: &Arc<dyn SessionStore>,
    quiz_id: Uuid,
    limit: usize,
) -> Result<Vec<LeaderboardEntry>, ServiceError> {
    let questions = store.list_quiz_questions(quiz_id).await?;
    if questions.is_empty() {
        return Ok(Vec::new());
    }

    let question_ids = questions.iter().map(|question| question.id).collect();
    let responses = store.list_quiz_responses(question_ids).await?;
    let ranked = rank_responses(&responses, limit);

    let mut entries = Vec::with_capacity(ranked.len());
    for (index, (attendee_id, score)) in ranked.into_iter().enumerate() {
        let name = store
            .find_attendee(attendee_id)
            .await?
            .map(|attendee| attendee.name)
            .unwrap_or_else(|| "Unknown".to_string());
        entries.push(LeaderboardEntry {
            rank: index as u32 + 1,
            name,
            score,
        });
    }
    Ok(entries)
}

/// Sum correct answers per attendee and order the result.
///
/// The accumulator preserves first-answer order, and the descending sort is
/// stable, so ties keep a deterministic order across calls.
fn rank_responses(responses: &[QuizResponseEntity], limit: usize) -> Vec<(Uuid, u32)> {
    let mut scores: IndexMap<Uuid, u32> = IndexMap::new();
    for response in responses {
        *scores.entry(response.attendee_id).or_insert(0) += u32::from(response.is_correct);
    }

    let mut entries: Vec<(Uuid, u32)> = scores.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(limit);
    entries
}
