use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::session::ActivitySnapshot, error::AppError, services::session_service,
    state::SharedState,
};

/// Read-only endpoints exposing the current live session.
pub fn router() -> Router<SharedState> {
    Router::new().route("/session/state", get(get_session_state))
}

#[utoipa::path(
    get,
    path = "/session/state",
    tag = "session",
    responses((status = 200, description = "Current activity snapshot", body = ActivitySnapshot))
)]
/// Return the full current activity state with derived remaining time.
///
/// The payload matches the resync push on the realtime channels, so
/// periodic polling of this route is a valid fallback to subscribing.
pub async fn get_session_state(
    State(state): State<SharedState>,
) -> Result<Json<ActivitySnapshot>, AppError> {
    let snapshot = session_service::current_snapshot(&state).await?;
    Ok(Json(snapshot))
}
