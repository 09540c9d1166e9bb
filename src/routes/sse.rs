use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{
    services::{session_service, sse_events, sse_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/events",
    tag = "session",
    responses((status = 200, description = "Realtime event stream", content_type = "text/event-stream", body = String))
)]
/// Stream realtime session events to display and dashboard clients.
///
/// The first event is always the full current activity state, so a client
/// that subscribes mid-activity converges without any history.
pub async fn event_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe(&state);
    info!("new SSE connection");

    let initial = match session_service::current_snapshot(&state).await {
        Ok(snapshot) => sse_events::resync_event(&snapshot),
        Err(err) => {
            tracing::warn!(error = %err, "failed to build resync snapshot for SSE client");
            None
        }
    };
    sse_service::to_sse_stream(initial, receiver)
}

/// Configure the SSE endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/events", get(event_stream))
}
