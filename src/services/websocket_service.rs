use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::value::RawValue;
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{sse::ServerEvent, ws::AttendeeInboundMessage},
    services::{session_service, sse_events},
    state::{AttendeeConnection, JoinedAttendee, SharedState},
};

/// Envelope wrapping broadcast events for WebSocket delivery; the data
/// field is the already-serialised payload, stitched in verbatim.
#[derive(Serialize)]
struct WsEnvelope<'a> {
    event: &'a str,
    data: &'a RawValue,
}

/// Handle the full lifecycle for an individual attendee WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id = Uuid::new_v4();
    state.connections().insert(
        connection_id,
        AttendeeConnection {
            tx: outbound_tx.clone(),
            attendee: None,
        },
    );
    info!(%connection_id, "attendee socket connected");

    // Every broadcast event reaches this socket through its own forwarder.
    let forwarder_task = spawn_event_forwarder(&state, outbound_tx.clone());

    // Mandatory resync: the full current activity state is the first
    // message, so a client that connected mid-activity needs no history.
    push_resync(&state, &outbound_tx).await;

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match AttendeeInboundMessage::from_json_str(&text) {
                Ok(AttendeeInboundMessage::Join { token }) => {
                    handle_join(&state, connection_id, &token, &outbound_tx).await;
                }
                Ok(AttendeeInboundMessage::Vote {
                    question_id,
                    option,
                    token,
                    kind,
                }) => {
                    if let Err(err) =
                        session_service::submit_response(&state, &token, question_id, option, kind)
                            .await
                    {
                        warn!(%connection_id, error = %err, "failed to record response");
                    }
                }
                Ok(AttendeeInboundMessage::Score { score, token }) => {
                    if let Err(err) =
                        session_service::submit_game_score(&state, &token, score).await
                    {
                        warn!(%connection_id, error = %err, "failed to record game score");
                    }
                }
                Ok(AttendeeInboundMessage::Unknown) => {
                    debug!(%connection_id, "ignoring unknown attendee message");
                }
                Err(err) => {
                    warn!(%connection_id, error = %err, "failed to parse attendee message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(%connection_id, "attendee socket closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    let was_joined = state
        .connections()
        .remove(&connection_id)
        .is_some_and(|(_, connection)| connection.attendee.is_some());
    if was_joined {
        sse_events::broadcast_peers_active(&state, state.joined_count());
    }
    info!(%connection_id, "attendee socket disconnected");

    forwarder_task.abort();
    finalize(writer_task, outbound_tx).await;
}

/// Mark the connection as joined when the token resolves to an attendee,
/// then announce the join and re-push the current state to this socket.
async fn handle_join(
    state: &SharedState,
    connection_id: Uuid,
    token: &str,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) {
    let store = match state.require_session_store().await {
        Ok(store) => store,
        Err(err) => {
            debug!(%connection_id, error = %err, "join ignored while storage is unavailable");
            return;
        }
    };

    let attendee = match store.find_attendee_by_token(token.to_owned()).await {
        Ok(Some(attendee)) => attendee,
        Ok(None) => {
            debug!(%connection_id, "join with unknown session token ignored");
            return;
        }
        Err(err) => {
            warn!(%connection_id, error = %err, "failed to resolve session token");
            return;
        }
    };

    if let Some(mut connection) = state.connections().get_mut(&connection_id) {
        connection.attendee = Some(JoinedAttendee {
            id: attendee.id,
            name: attendee.name.clone(),
        });
    }

    info!(%connection_id, name = %attendee.name, "attendee joined");
    sse_events::broadcast_peer_joined(state, attendee.name);
    sse_events::broadcast_peers_active(state, state.joined_count());
    push_resync(state, outbound_tx).await;
}

/// Forward every broadcast event to the socket's writer channel.
fn spawn_event_forwarder(
    state: &SharedState,
    outbound_tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    let mut receiver = state.events().subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let Some(payload) = envelope(&event) else {
                        continue;
                    };
                    if outbound_tx.send(Message::Text(payload.into())).is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => {
                    // A slow socket misses intermediate events; the next
                    // tick or state change catches it up.
                    debug!(skipped, "attendee socket lagged behind broadcast");
                    continue;
                }
            }
        }
    })
}

/// Push the full current activity state to a single socket.
async fn push_resync(state: &SharedState, outbound_tx: &mpsc::UnboundedSender<Message>) {
    let snapshot = match session_service::current_snapshot(state).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(error = %err, "failed to build resync snapshot");
            return;
        }
    };

    let Some(event) = sse_events::resync_event(&snapshot) else {
        return;
    };
    if let Some(payload) = envelope(&event) {
        let _ = outbound_tx.send(Message::Text(payload.into()));
    }
}

fn envelope(event: &ServerEvent) -> Option<String> {
    let name = event.event.as_deref()?;
    let data = serde_json::from_str::<&RawValue>(&event.data).ok()?;
    serde_json::to_string(&WsEnvelope { event: name, data }).ok()
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
