use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::ResponseKind,
    dto::{
        session::{ActivitySnapshot, HighScore},
        sse::{
            ActivityEndedEvent, HighScoreUpdatedEvent, PeerJoinedEvent, PeersActiveEvent,
            ServerEvent, StateChangedEvent, TallyUpdatedEvent, TimerTickEvent,
        },
    },
    state::SharedState,
};

const EVENT_STATE_CHANGED: &str = "state.changed";
const EVENT_TIMER_TICK: &str = "timer.tick";
const EVENT_TALLY_UPDATED: &str = "tally.updated";
const EVENT_ACTIVITY_ENDED: &str = "activity.ended";
const EVENT_PEER_JOINED: &str = "peer.joined";
const EVENT_PEERS_ACTIVE: &str = "peers.active";
const EVENT_HIGHSCORE_UPDATED: &str = "highscore.updated";

/// Build the resync event pushed to a single (re)connecting client. It is
/// byte-for-byte the event every client receives on a transition, so a
/// client that missed arbitrary history converges from this one message.
pub fn resync_event(snapshot: &ActivitySnapshot) -> Option<ServerEvent> {
    match ServerEvent::json(
        Some(EVENT_STATE_CHANGED.to_string()),
        &StateChangedEvent(snapshot.clone()),
    ) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to serialize resync payload");
            None
        }
    }
}

/// Broadcast that the live activity changed.
pub fn broadcast_state_changed(state: &SharedState, snapshot: &ActivitySnapshot) {
    send_event(
        state,
        EVENT_STATE_CHANGED,
        &StateChangedEvent(snapshot.clone()),
    );
}

/// Broadcast the once-per-second countdown update.
pub fn broadcast_timer_tick(state: &SharedState, remaining_seconds: u32) {
    send_event(state, EVENT_TIMER_TICK, &TimerTickEvent { remaining_seconds });
}

/// Broadcast fresh per-option counts for a question.
pub fn broadcast_tally_updated(
    state: &SharedState,
    question_id: Uuid,
    kind: ResponseKind,
    counts: &[u64],
) {
    send_event(
        state,
        EVENT_TALLY_UPDATED,
        &TallyUpdatedEvent {
            question_id,
            kind,
            counts: counts.to_vec(),
        },
    );
}

/// Broadcast the final counts of a poll that just closed.
pub fn broadcast_activity_ended(state: &SharedState, question_id: Uuid, counts: Vec<u64>) {
    send_event(
        state,
        EVENT_ACTIVITY_ENDED,
        &ActivityEndedEvent {
            question_id,
            counts,
        },
    );
}

/// Broadcast that an attendee joined the room.
pub fn broadcast_peer_joined(state: &SharedState, name: String) {
    send_event(state, EVENT_PEER_JOINED, &PeerJoinedEvent { name });
}

/// Broadcast the current number of joined attendees.
pub fn broadcast_peers_active(state: &SharedState, count: usize) {
    send_event(state, EVENT_PEERS_ACTIVE, &PeersActiveEvent { count });
}

/// Broadcast the all-time best game score.
pub fn broadcast_highscore_updated(state: &SharedState, high_score: HighScore) {
    send_event(
        state,
        EVENT_HIGHSCORE_UPDATED,
        &HighScoreUpdatedEvent(high_score),
    );
}

fn send_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.events().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize event payload"),
    }
}
