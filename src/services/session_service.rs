//! The session orchestrator.
//!
//! All mutations of the live activity flow through this module: admin
//! commands, countdown expiry, and attendee response/score ingestion. Every
//! state transition runs as one unbroken unit of work (plan, persist,
//! apply) behind the shared transition gate, and the countdown is armed or
//! cancelled inside that unit so the stored record and the in-memory timer
//! can never disagree about what is live.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{
        ActivityKind, ActivityStateEntity, GameScoreEntity, PollResponseEntity, QuizResponseEntity,
        ResponseKind,
    },
    dao::session_store::SessionStore,
    dto::session::{ActivitySnapshot, HighScore},
    error::ServiceError,
    services::{leaderboard_service, sse_events, tally_service},
    state::{
        SharedState,
        state_machine::{ActivityEvent, ActivityPhase},
    },
};

/// Grace period between the final tick and the final tally read, letting
/// in-flight votes land before the counts are frozen.
const EXPIRY_SETTLE_DELAY: Duration = Duration::from_millis(150);

/// Switch the room to the break game.
///
/// The break runs no server countdown (break timing is tracked on the
/// presenter's page); the server only records that the break is live and
/// announces the current high score.
pub async fn start_break(state: &SharedState) -> Result<(), ServiceError> {
    let store = state.require_session_store().await?;

    let record = ActivityStateEntity {
        kind: ActivityKind::Break,
        subject_id: None,
        started_at: SystemTime::now(),
    };
    let persist_store = store.clone();
    state
        .run_transition(ActivityEvent::StartBreak, move || async move {
            persist_store.save_activity_state(record).await?;
            state.timer().stop();
            Ok(())
        })
        .await?;

    let high_score = current_high_score(&store).await?;
    sse_events::broadcast_state_changed(state, &ActivitySnapshot::Break { high_score });
    info!("break started");
    Ok(())
}

/// Put a poll question live and arm its countdown.
///
/// A missing question is a silent no-op: no state mutation, no broadcast.
/// The admin UI is responsible for surfacing that locally.
pub async fn start_poll(state: &SharedState, question_id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_session_store().await?;

    let Some(question) = store.find_poll_question(question_id).await? else {
        debug!(%question_id, "ignoring poll start; question not found");
        return Ok(());
    };
    let duration = effective_duration(state, question.timer_seconds);

    let record = ActivityStateEntity {
        kind: ActivityKind::Poll,
        subject_id: Some(question_id),
        started_at: SystemTime::now(),
    };
    let persist_store = store.clone();
    state
        .run_transition(ActivityEvent::StartPoll(question_id), move || async move {
            persist_store.save_activity_state(record).await?;
            arm_countdown(state, duration, Expiry::Poll(question_id));
            Ok(())
        })
        .await?;

    sse_events::broadcast_state_changed(
        state,
        &ActivitySnapshot::Poll {
            question: question.into(),
            remaining_seconds: duration,
            counts: None,
        },
    );
    info!(%question_id, duration, "poll started");
    Ok(())
}

/// Put a quiz live and arm its countdown.
///
/// A missing quiz, or a quiz without questions, is a silent no-op.
pub async fn start_quiz(state: &SharedState, quiz_id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_session_store().await?;

    let Some(quiz) = store.find_quiz(quiz_id).await? else {
        debug!(%quiz_id, "ignoring quiz start; quiz not found");
        return Ok(());
    };
    let questions = store.list_quiz_questions(quiz_id).await?;
    if questions.is_empty() {
        debug!(%quiz_id, "ignoring quiz start; quiz has no questions");
        return Ok(());
    }
    let duration = effective_duration(state, quiz.timer_seconds);

    let record = ActivityStateEntity {
        kind: ActivityKind::Quiz,
        subject_id: Some(quiz_id),
        started_at: SystemTime::now(),
    };
    let persist_store = store.clone();
    state
        .run_transition(ActivityEvent::StartQuiz(quiz_id), move || async move {
            persist_store.save_activity_state(record).await?;
            arm_countdown(state, duration, Expiry::Quiz(quiz_id));
            Ok(())
        })
        .await?;

    sse_events::broadcast_state_changed(
        state,
        &ActivitySnapshot::Quiz {
            quiz_id,
            remaining_seconds: duration,
            questions: questions.into_iter().map(Into::into).collect(),
        },
    );
    info!(%quiz_id, duration, "quiz started");
    Ok(())
}

/// Manually end whatever is live and return the room to idle.
///
/// When a quiz was live its leaderboard rides along on the idle broadcast.
pub async fn set_idle(state: &SharedState) -> Result<(), ServiceError> {
    let store = state.require_session_store().await?;

    // Computed ahead of the flip so the idle broadcast can carry it.
    let prior = state.activity_phase().await;
    let leaderboard = match prior {
        ActivityPhase::Quiz(quiz_id) => Some(
            leaderboard_service::leaderboard(&store, quiz_id, state.config().leaderboard_limit())
                .await?,
        ),
        _ => None,
    };

    let record = ActivityStateEntity::idle();
    let persist_store = store.clone();
    let (_, transition) = state
        .run_transition(ActivityEvent::SetIdle, move || async move {
            persist_store.save_activity_state(record).await?;
            state.timer().stop();
            Ok(())
        })
        .await?;

    // Attach the board only when the phase we computed it for is the phase
    // that actually ended; a command racing in between drops it instead of
    // publishing a board for the wrong quiz.
    let quiz_leaderboard = if transition.from == prior {
        leaderboard
    } else {
        None
    };
    sse_events::broadcast_state_changed(state, &ActivitySnapshot::Idle { quiz_leaderboard });
    info!("session set to idle");
    Ok(())
}

/// Record an attendee's response to the live question.
///
/// Every rejection path is silent by design: unknown tokens, unknown
/// questions, out-of-range options, and duplicates are all discarded
/// without an error reaching the attendee. A duplicate keeps the first
/// accepted submission; the second never overwrites it.
pub async fn submit_response(
    state: &SharedState,
    token: &str,
    question_id: Uuid,
    option_index: u32,
    kind: ResponseKind,
) -> Result<(), ServiceError> {
    let store = state.require_session_store().await?;

    let Some(attendee) = store.find_attendee_by_token(token.to_owned()).await? else {
        debug!(%question_id, "discarding response with unknown session token");
        return Ok(());
    };

    let option_count = match kind {
        ResponseKind::Poll => {
            let Some(question) = store.find_poll_question(question_id).await? else {
                debug!(%question_id, "discarding response to unknown poll question");
                return Ok(());
            };
            if option_index as usize >= question.options.len() {
                debug!(%question_id, option_index, "discarding out-of-range poll response");
                return Ok(());
            }
            let response = PollResponseEntity {
                id: Uuid::new_v4(),
                question_id,
                attendee_id: attendee.id,
                selected_option: option_index,
                created_at: SystemTime::now(),
            };
            if !store.insert_poll_response(response).await? {
                return Ok(());
            }
            question.options.len()
        }
        ResponseKind::Quiz => {
            let Some(question) = store.find_quiz_question(question_id).await? else {
                debug!(%question_id, "discarding response to unknown quiz question");
                return Ok(());
            };
            if option_index as usize >= question.options.len() {
                debug!(%question_id, option_index, "discarding out-of-range quiz response");
                return Ok(());
            }
            // Correctness is pinned at time-of-answer; a later edit of the
            // question never rewrites historical rows.
            let response = QuizResponseEntity {
                id: Uuid::new_v4(),
                question_id,
                attendee_id: attendee.id,
                selected_option: option_index,
                is_correct: question.correct_option_index == option_index,
                created_at: SystemTime::now(),
            };
            if !store.insert_quiz_response(response).await? {
                return Ok(());
            }
            question.options.len()
        }
    };

    let counts = tally_service::tally(&store, kind, question_id, option_count).await?;
    sse_events::broadcast_tally_updated(state, question_id, kind, &counts);
    Ok(())
}

/// Append a break-game score and announce the all-time best.
pub async fn submit_game_score(
    state: &SharedState,
    token: &str,
    score: i64,
) -> Result<(), ServiceError> {
    let store = state.require_session_store().await?;

    let Some(attendee) = store.find_attendee_by_token(token.to_owned()).await? else {
        debug!("discarding game score with unknown session token");
        return Ok(());
    };

    store
        .insert_game_score(GameScoreEntity {
            id: Uuid::new_v4(),
            attendee_id: attendee.id,
            score,
            created_at: SystemTime::now(),
        })
        .await?;

    if let Some(high_score) = current_high_score(&store).await? {
        sse_events::broadcast_highscore_updated(state, high_score);
    }
    Ok(())
}

/// Build the full activity snapshot served to (re)connecting clients and
/// the snapshot route.
///
/// Remaining time is always re-derived from the persisted start timestamp;
/// the in-memory countdown is only a fast path for tick emission and does
/// not survive a restart.
pub async fn current_snapshot(state: &SharedState) -> Result<ActivitySnapshot, ServiceError> {
    let Some(store) = state.session_store().await else {
        return Ok(ActivitySnapshot::idle());
    };
    let Some(record) = store.load_activity_state().await? else {
        return Ok(ActivitySnapshot::idle());
    };

    match (record.kind, record.subject_id) {
        (ActivityKind::Poll, Some(question_id)) => {
            let Some(question) = store.find_poll_question(question_id).await? else {
                return Ok(ActivitySnapshot::idle());
            };
            let duration = effective_duration(state, question.timer_seconds);
            let counts = tally_service::tally(
                &store,
                ResponseKind::Poll,
                question_id,
                question.options.len(),
            )
            .await?;
            Ok(ActivitySnapshot::Poll {
                question: question.into(),
                remaining_seconds: remaining_seconds(record.started_at, duration),
                counts: Some(counts),
            })
        }
        (ActivityKind::Quiz, Some(quiz_id)) => {
            let Some(quiz) = store.find_quiz(quiz_id).await? else {
                return Ok(ActivitySnapshot::idle());
            };
            let questions = store.list_quiz_questions(quiz_id).await?;
            let duration = effective_duration(state, quiz.timer_seconds);
            Ok(ActivitySnapshot::Quiz {
                quiz_id,
                remaining_seconds: remaining_seconds(record.started_at, duration),
                questions: questions.into_iter().map(Into::into).collect(),
            })
        }
        (ActivityKind::Break, _) => Ok(ActivitySnapshot::Break {
            high_score: current_high_score(&store).await?,
        }),
        _ => Ok(ActivitySnapshot::idle()),
    }
}

/// Remaining seconds derived from the persisted start timestamp.
pub(crate) fn remaining_seconds(started_at: SystemTime, duration_seconds: u32) -> u32 {
    let elapsed = SystemTime::now()
        .duration_since(started_at)
        .unwrap_or_default()
        .as_secs();
    let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
    duration_seconds.saturating_sub(elapsed)
}

/// Subject of an armed countdown, determining the expiry transition.
#[derive(Clone, Copy)]
enum Expiry {
    Poll(Uuid),
    Quiz(Uuid),
}

/// Arm the process countdown for the activity that just went live,
/// superseding whatever countdown was running.
fn arm_countdown(state: &SharedState, duration: u32, expiry: Expiry) {
    let tick_state = Arc::clone(state);
    let expire_state = Arc::clone(state);
    state.timer().start(
        duration,
        move |remaining| sse_events::broadcast_timer_tick(&tick_state, remaining),
        move || async move {
            match expiry {
                Expiry::Poll(question_id) => {
                    if let Err(err) = finalize_poll(&expire_state, question_id).await {
                        warn!(%question_id, error = %err, "failed to finalize expired poll");
                    }
                }
                Expiry::Quiz(quiz_id) => {
                    if let Err(err) = finalize_quiz(&expire_state, quiz_id).await {
                        warn!(%quiz_id, error = %err, "failed to finalize expired quiz");
                    }
                }
            }
        },
    );
}

/// Close an expired poll: freeze the final counts, return to idle, and
/// broadcast the end event followed by the idle state.
async fn finalize_poll(state: &SharedState, question_id: Uuid) -> Result<(), ServiceError> {
    sleep(EXPIRY_SETTLE_DELAY).await;

    let store = state.require_session_store().await?;
    let counts = match store.find_poll_question(question_id).await? {
        Some(question) => {
            tally_service::tally(&store, ResponseKind::Poll, question_id, question.options.len())
                .await?
        }
        // Question deleted mid-poll; close with empty counts.
        None => Vec::new(),
    };

    let record = ActivityStateEntity::idle();
    let persist_store = store.clone();
    match state
        .run_transition(ActivityEvent::PollExpired(question_id), move || async move {
            persist_store.save_activity_state(record).await?;
            Ok(())
        })
        .await
    {
        Ok(_) => {}
        // A newer activity superseded this poll before its expiry landed;
        // it owns the room now and nothing may be broadcast for the old one.
        Err(ServiceError::InvalidState(reason)) => {
            debug!(%question_id, %reason, "skipping stale poll finalization");
            return Ok(());
        }
        Err(err) => return Err(err),
    }

    sse_events::broadcast_activity_ended(state, question_id, counts);
    sse_events::broadcast_state_changed(state, &ActivitySnapshot::idle());
    info!(%question_id, "poll ended");
    Ok(())
}

/// Close an expired quiz: compute the leaderboard, return to idle, and
/// broadcast the idle state with the leaderboard attached.
async fn finalize_quiz(state: &SharedState, quiz_id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_session_store().await?;
    let leaderboard =
        leaderboard_service::leaderboard(&store, quiz_id, state.config().leaderboard_limit())
            .await?;

    let record = ActivityStateEntity::idle();
    let persist_store = store.clone();
    match state
        .run_transition(ActivityEvent::QuizExpired(quiz_id), move || async move {
            persist_store.save_activity_state(record).await?;
            Ok(())
        })
        .await
    {
        Ok(_) => {}
        Err(ServiceError::InvalidState(reason)) => {
            debug!(%quiz_id, %reason, "skipping stale quiz finalization");
            return Ok(());
        }
        Err(err) => return Err(err),
    }

    sse_events::broadcast_state_changed(
        state,
        &ActivitySnapshot::Idle {
            quiz_leaderboard: Some(leaderboard),
        },
    );
    info!(%quiz_id, "quiz ended");
    Ok(())
}

/// Duration for a subject, falling back to the configured default when the
/// stored record carries none.
fn effective_duration(state: &SharedState, configured: u32) -> u32 {
    if configured == 0 {
        state.config().fallback_timer_seconds()
    } else {
        configured
    }
}

async fn current_high_score(
    store: &Arc<dyn SessionStore>,
) -> Result<Option<HighScore>, ServiceError> {
    let Some(top) = store.top_game_score().await? else {
        return Ok(None);
    };
    let name = store
        .find_attendee(top.attendee_id)
        .await?
        .map(|attendee| attendee.name)
        .unwrap_or_else(|| "Unknown".to_string());
    Ok(Some(HighScore::from_entity(&top, name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::dao::models::{AttendeeEntity, PollQuestionEntity, QuizEntity, QuizQuestionEntity};
    use crate::dao::session_store::memory::MemorySessionStore;
    use crate::dto::sse::ServerEvent;
    use crate::state::AppState;
    use serde_json::Value;
    use tokio::sync::broadcast;

    async fn test_state() -> (
        SharedState,
        MemorySessionStore,
        broadcast::Receiver<ServerEvent>,
    ) {
        let state = AppState::new(AppConfig::default());
        let store = MemorySessionStore::new();
        state.install_session_store(Arc::new(store.clone())).await;
        let receiver = state.events().subscribe();
        (state, store, receiver)
    }

    fn drain(receiver: &mut broadcast::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    fn events_named<'a>(events: &'a [ServerEvent], name: &str) -> Vec<&'a ServerEvent> {
        events
            .iter()
            .filter(|event| event.event.as_deref() == Some(name))
            .collect()
    }

    fn data(event: &ServerEvent) -> Value {
        serde_json::from_str(&event.data).expect("event data is valid JSON")
    }

    fn attendee(name: &str) -> AttendeeEntity {
        AttendeeEntity {
            id: Uuid::new_v4(),
            name: name.to_string(),
            session_token: format!("{name}-token"),
            created_at: SystemTime::now(),
        }
    }

    fn poll_question(timer_seconds: u32) -> PollQuestionEntity {
        PollQuestionEntity {
            id: Uuid::new_v4(),
            topic_id: None,
            text: "favourite color?".to_string(),
            options: vec!["red".into(), "green".into(), "blue".into(), "teal".into()],
            timer_seconds,
            created_at: SystemTime::now(),
        }
    }

    fn quiz(timer_seconds: u32) -> QuizEntity {
        QuizEntity {
            id: Uuid::new_v4(),
            name: "checkpoint".to_string(),
            timer_seconds,
            created_at: SystemTime::now(),
        }
    }

    fn quiz_question(quiz_id: Uuid, correct_option_index: u32, offset: u64) -> QuizQuestionEntity {
        QuizQuestionEntity {
            id: Uuid::new_v4(),
            quiz_id,
            text: "pick one".to_string(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_option_index,
            created_at: SystemTime::now() + Duration::from_secs(offset),
        }
    }

    #[tokio::test]
    async fn start_poll_persists_arms_timer_and_broadcasts() {
        let (state, store, mut receiver) = test_state().await;
        let question = poll_question(60);
        store.seed_poll_question(question.clone());

        start_poll(&state, question.id).await.unwrap();

        let record = store.activity_state().expect("activity persisted");
        assert_eq!(record.kind, ActivityKind::Poll);
        assert_eq!(record.subject_id, Some(question.id));
        assert!(state.timer().is_running());
        assert_eq!(state.timer().remaining_seconds(), Some(60));

        let events = drain(&mut receiver);
        let changed = events_named(&events, "state.changed");
        assert_eq!(changed.len(), 1);
        let payload = data(changed[0]);
        assert_eq!(payload["kind"], "poll");
        assert_eq!(payload["data"]["remaining_seconds"], 60);
        // Attendee-facing poll payloads carry the question but no counts yet.
        assert!(payload["data"]["counts"].is_null());
    }

    #[tokio::test]
    async fn start_poll_with_unknown_question_is_a_silent_no_op() {
        let (state, store, mut receiver) = test_state().await;

        start_poll(&state, Uuid::new_v4()).await.unwrap();

        assert!(store.activity_state().is_none());
        assert!(!state.timer().is_running());
        assert!(drain(&mut receiver).is_empty());
    }

    #[tokio::test]
    async fn start_quiz_without_questions_is_a_silent_no_op() {
        let (state, store, mut receiver) = test_state().await;
        let quiz = quiz(90);
        store.seed_quiz(quiz.clone());

        start_quiz(&state, quiz.id).await.unwrap();

        assert!(store.activity_state().is_none());
        assert!(!state.timer().is_running());
        assert!(drain(&mut receiver).is_empty());
    }

    #[tokio::test]
    async fn quiz_broadcast_never_leaks_correct_answers() {
        let (state, store, mut receiver) = test_state().await;
        let quiz = quiz(90);
        store.seed_quiz(quiz.clone());
        store.seed_quiz_question(quiz_question(quiz.id, 2, 0));

        start_quiz(&state, quiz.id).await.unwrap();

        let events = drain(&mut receiver);
        let changed = events_named(&events, "state.changed");
        assert_eq!(changed.len(), 1);
        assert!(!changed[0].data.contains("correct_option_index"));
        let payload = data(changed[0]);
        assert_eq!(payload["kind"], "quiz");
        assert_eq!(payload["data"]["questions"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn starting_a_quiz_supersedes_the_live_poll() {
        let (state, store, mut receiver) = test_state().await;
        let question = poll_question(60);
        store.seed_poll_question(question.clone());
        let quiz = quiz(90);
        store.seed_quiz(quiz.clone());
        store.seed_quiz_question(quiz_question(quiz.id, 0, 0));

        start_poll(&state, question.id).await.unwrap();
        start_quiz(&state, quiz.id).await.unwrap();

        // Exactly one countdown is armed and it counts the quiz duration.
        assert!(state.timer().is_running());
        assert_eq!(state.timer().remaining_seconds(), Some(90));
        let record = store.activity_state().unwrap();
        assert_eq!(record.kind, ActivityKind::Quiz);
        assert_eq!(record.subject_id, Some(quiz.id));

        // The superseded poll produces no further events.
        drain(&mut receiver);
        let stale = finalize_poll(&state, question.id).await;
        assert!(stale.is_ok());
        let events = drain(&mut receiver);
        assert!(events_named(&events, "activity.ended").is_empty());
        assert_eq!(store.activity_state().unwrap().kind, ActivityKind::Quiz);
    }

    #[tokio::test]
    async fn duplicate_responses_keep_the_first_submission() {
        let (state, store, mut receiver) = test_state().await;
        let question = poll_question(60);
        store.seed_poll_question(question.clone());
        let voter = attendee("ada");
        store.seed_attendee(voter.clone());

        submit_response(&state, &voter.session_token, question.id, 2, ResponseKind::Poll)
            .await
            .unwrap();
        submit_response(&state, &voter.session_token, question.id, 0, ResponseKind::Poll)
            .await
            .unwrap();

        let responses = store.poll_responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].selected_option, 2);

        // Only the accepted submission produced a tally broadcast.
        let events = drain(&mut receiver);
        assert_eq!(events_named(&events, "tally.updated").len(), 1);
    }

    #[tokio::test]
    async fn responses_with_unknown_tokens_are_discarded() {
        let (state, store, mut receiver) = test_state().await;
        let question = poll_question(60);
        store.seed_poll_question(question.clone());

        submit_response(&state, "not-a-token", question.id, 1, ResponseKind::Poll)
            .await
            .unwrap();

        assert!(store.poll_responses().is_empty());
        assert!(drain(&mut receiver).is_empty());
    }

    #[tokio::test]
    async fn out_of_range_options_are_discarded() {
        let (state, store, mut receiver) = test_state().await;
        let question = poll_question(60);
        store.seed_poll_question(question.clone());
        let voter = attendee("ada");
        store.seed_attendee(voter.clone());

        submit_response(&state, &voter.session_token, question.id, 9, ResponseKind::Poll)
            .await
            .unwrap();

        assert!(store.poll_responses().is_empty());
        assert!(drain(&mut receiver).is_empty());
    }

    #[tokio::test]
    async fn quiz_correctness_is_pinned_at_write_time() {
        let (state, store, _receiver) = test_state().await;
        let quiz = quiz(90);
        store.seed_quiz(quiz.clone());
        let question = quiz_question(quiz.id, 1, 0);
        store.seed_quiz_question(question.clone());
        let right = attendee("ada");
        let wrong = attendee("grace");
        store.seed_attendee(right.clone());
        store.seed_attendee(wrong.clone());

        submit_response(&state, &right.session_token, question.id, 1, ResponseKind::Quiz)
            .await
            .unwrap();
        submit_response(&state, &wrong.session_token, question.id, 3, ResponseKind::Quiz)
            .await
            .unwrap();

        let responses = store.quiz_responses();
        assert_eq!(responses.len(), 2);
        assert!(responses.iter().any(|r| r.attendee_id == right.id && r.is_correct));
        assert!(responses.iter().any(|r| r.attendee_id == wrong.id && !r.is_correct));
    }

    #[tokio::test]
    async fn tally_broadcast_is_scoped_by_question_and_kind() {
        let (state, store, mut receiver) = test_state().await;
        let question = poll_question(60);
        store.seed_poll_question(question.clone());
        let voter = attendee("ada");
        store.seed_attendee(voter.clone());

        submit_response(&state, &voter.session_token, question.id, 2, ResponseKind::Poll)
            .await
            .unwrap();

        let events = drain(&mut receiver);
        let tallies = events_named(&events, "tally.updated");
        assert_eq!(tallies.len(), 1);
        let payload = data(tallies[0]);
        assert_eq!(payload["question_id"], question.id.to_string());
        assert_eq!(payload["kind"], "poll");
        assert_eq!(payload["counts"], serde_json::json!([0, 0, 1, 0]));
    }

    #[tokio::test]
    async fn poll_expiry_broadcasts_final_counts_then_idle() {
        let (state, store, mut receiver) = test_state().await;
        let question = poll_question(60);
        store.seed_poll_question(question.clone());
        for (name, option) in [("a", 0), ("b", 0), ("c", 2)] {
            let voter = attendee(name);
            store.seed_attendee(voter.clone());
            submit_response(
                &state,
                &voter.session_token,
                question.id,
                option,
                ResponseKind::Poll,
            )
            .await
            .unwrap();
        }
        start_poll(&state, question.id).await.unwrap();
        drain(&mut receiver);

        finalize_poll(&state, question.id).await.unwrap();

        assert_eq!(store.activity_state().unwrap().kind, ActivityKind::Idle);
        let events = drain(&mut receiver);
        let ended = events_named(&events, "activity.ended");
        assert_eq!(ended.len(), 1);
        let payload = data(ended[0]);
        assert_eq!(payload["counts"], serde_json::json!([2, 0, 1, 0]));

        let changed = events_named(&events, "state.changed");
        assert_eq!(changed.len(), 1);
        assert_eq!(data(changed[0])["kind"], "idle");
    }

    #[tokio::test]
    async fn quiz_expiry_attaches_the_leaderboard_to_idle() {
        let (state, store, mut receiver) = test_state().await;
        let quiz = quiz(90);
        store.seed_quiz(quiz.clone());
        let first = quiz_question(quiz.id, 1, 0);
        let second = quiz_question(quiz.id, 0, 1);
        store.seed_quiz_question(first.clone());
        store.seed_quiz_question(second.clone());
        let alice = attendee("A");
        let bob = attendee("B");
        store.seed_attendee(alice.clone());
        store.seed_attendee(bob.clone());

        start_quiz(&state, quiz.id).await.unwrap();
        for (voter, answers) in [(&alice, [1, 0]), (&bob, [0, 0])] {
            for (question, option) in [(&first, answers[0]), (&second, answers[1])] {
                submit_response(
                    &state,
                    &voter.session_token,
                    question.id,
                    option,
                    ResponseKind::Quiz,
                )
                .await
                .unwrap();
            }
        }
        drain(&mut receiver);

        finalize_quiz(&state, quiz.id).await.unwrap();

        assert_eq!(store.activity_state().unwrap().kind, ActivityKind::Idle);
        let events = drain(&mut receiver);
        let changed = events_named(&events, "state.changed");
        assert_eq!(changed.len(), 1);
        let payload = data(changed[0]);
        assert_eq!(payload["kind"], "idle");
        let board = payload["data"]["quiz_leaderboard"].as_array().unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0]["name"], "A");
        assert_eq!(board[0]["score"], 2);
        assert_eq!(board[0]["rank"], 1);
        assert_eq!(board[1]["name"], "B");
        assert_eq!(board[1]["score"], 1);
        assert_eq!(board[1]["rank"], 2);
    }

    #[tokio::test]
    async fn manual_idle_from_quiz_carries_the_leaderboard_and_stops_the_timer() {
        let (state, store, mut receiver) = test_state().await;
        let quiz = quiz(90);
        store.seed_quiz(quiz.clone());
        let question = quiz_question(quiz.id, 0, 0);
        store.seed_quiz_question(question.clone());
        let voter = attendee("ada");
        store.seed_attendee(voter.clone());

        start_quiz(&state, quiz.id).await.unwrap();
        submit_response(&state, &voter.session_token, question.id, 0, ResponseKind::Quiz)
            .await
            .unwrap();
        drain(&mut receiver);

        set_idle(&state).await.unwrap();

        assert!(!state.timer().is_running());
        assert_eq!(store.activity_state().unwrap().kind, ActivityKind::Idle);
        let events = drain(&mut receiver);
        let changed = events_named(&events, "state.changed");
        assert_eq!(changed.len(), 1);
        let payload = data(changed[0]);
        assert_eq!(payload["data"]["quiz_leaderboard"][0]["name"], "ada");
    }

    #[tokio::test]
    async fn manual_idle_from_poll_has_no_leaderboard() {
        let (state, store, mut receiver) = test_state().await;
        let question = poll_question(60);
        store.seed_poll_question(question.clone());

        start_poll(&state, question.id).await.unwrap();
        drain(&mut receiver);

        set_idle(&state).await.unwrap();

        let events = drain(&mut receiver);
        let changed = events_named(&events, "state.changed");
        assert_eq!(changed.len(), 1);
        assert!(data(changed[0])["data"]["quiz_leaderboard"].is_null());
    }

    #[tokio::test]
    async fn break_stops_the_countdown_and_reports_the_high_score() {
        let (state, store, mut receiver) = test_state().await;
        let question = poll_question(60);
        store.seed_poll_question(question.clone());
        let player = attendee("ada");
        store.seed_attendee(player.clone());
        store.seed_game_score(GameScoreEntity {
            id: Uuid::new_v4(),
            attendee_id: player.id,
            score: 420,
            created_at: SystemTime::now(),
        });

        start_poll(&state, question.id).await.unwrap();
        drain(&mut receiver);

        start_break(&state).await.unwrap();

        assert!(!state.timer().is_running());
        assert_eq!(store.activity_state().unwrap().kind, ActivityKind::Break);
        let events = drain(&mut receiver);
        let changed = events_named(&events, "state.changed");
        assert_eq!(changed.len(), 1);
        let payload = data(changed[0]);
        assert_eq!(payload["kind"], "break");
        assert_eq!(payload["data"]["high_score"]["name"], "ada");
        assert_eq!(payload["data"]["high_score"]["score"], 420);
    }

    #[tokio::test]
    async fn game_scores_announce_the_all_time_best() {
        let (state, store, mut receiver) = test_state().await;
        let player = attendee("ada");
        store.seed_attendee(player.clone());

        submit_game_score(&state, &player.session_token, 12)
            .await
            .unwrap();
        submit_game_score(&state, &player.session_token, 5)
            .await
            .unwrap();

        let events = drain(&mut receiver);
        let announced = events_named(&events, "highscore.updated");
        assert_eq!(announced.len(), 2);
        // The second, lower round still announces the standing record.
        assert_eq!(data(announced[1])["score"], 12);
    }

    #[tokio::test]
    async fn snapshot_derives_remaining_time_from_the_stored_start() {
        let (state, store, _receiver) = test_state().await;
        let quiz = quiz(90);
        store.seed_quiz(quiz.clone());
        store.seed_quiz_question(quiz_question(quiz.id, 0, 0));

        // Simulate a quiz that has been running for 20 of its 90 seconds,
        // e.g. after a process restart with no in-memory countdown.
        let store_dyn: Arc<dyn SessionStore> = Arc::new(store.clone());
        store_dyn
            .save_activity_state(ActivityStateEntity {
                kind: ActivityKind::Quiz,
                subject_id: Some(quiz.id),
                started_at: SystemTime::now() - Duration::from_secs(20),
            })
            .await
            .unwrap();

        match current_snapshot(&state).await.unwrap() {
            ActivitySnapshot::Quiz {
                remaining_seconds, ..
            } => {
                assert!((69..=70).contains(&remaining_seconds));
            }
            other => panic!("expected quiz snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn snapshot_includes_current_poll_counts() {
        let (state, store, _receiver) = test_state().await;
        let question = poll_question(60);
        store.seed_poll_question(question.clone());
        let voter = attendee("ada");
        store.seed_attendee(voter.clone());

        start_poll(&state, question.id).await.unwrap();
        submit_response(&state, &voter.session_token, question.id, 1, ResponseKind::Poll)
            .await
            .unwrap();

        match current_snapshot(&state).await.unwrap() {
            ActivitySnapshot::Poll { counts, .. } => {
                assert_eq!(counts, Some(vec![0, 1, 0, 0]));
            }
            other => panic!("expected poll snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn snapshot_is_idle_when_nothing_was_ever_live() {
        let (state, _store, _receiver) = test_state().await;
        assert!(matches!(
            current_snapshot(&state).await.unwrap(),
            ActivitySnapshot::Idle { .. }
        ));
    }

    #[test]
    fn remaining_seconds_never_goes_negative() {
        let started = SystemTime::now() - Duration::from_secs(120);
        assert_eq!(remaining_seconds(started, 60), 0);
    }
}
