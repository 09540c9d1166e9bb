use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::admin::{AttendeeCountResponse, AttendeeRegistered, RegisterAttendeeRequest},
    error::AppError,
    services::attendee_service,
    state::SharedState,
};

/// Attendee registration surface.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/attendees", post(register_attendee))
        .route("/attendees/count", get(count_attendees))
        .route("/attendees/{id}", axum::routing::delete(delete_attendee))
}

#[utoipa::path(
    post,
    path = "/attendees",
    tag = "attendees",
    request_body = RegisterAttendeeRequest,
    responses(
        (status = 200, description = "Attendee registered", body = AttendeeRegistered),
        (status = 409, description = "Display name already taken")
    )
)]
/// Register a new attendee and issue their session token.
pub async fn register_attendee(
    State(state): State<SharedState>,
    Json(payload): Json<RegisterAttendeeRequest>,
) -> Result<Json<AttendeeRegistered>, AppError> {
    Ok(Json(attendee_service::register(&state, payload).await?))
}

#[utoipa::path(
    get,
    path = "/attendees/count",
    tag = "attendees",
    responses((status = 200, description = "Number of registered attendees", body = AttendeeCountResponse))
)]
/// Return the number of registered attendees.
pub async fn count_attendees(
    State(state): State<SharedState>,
) -> Result<Json<AttendeeCountResponse>, AppError> {
    Ok(Json(attendee_service::count(&state).await?))
}

#[utoipa::path(
    delete,
    path = "/attendees/{id}",
    tag = "attendees",
    params(("id" = Uuid, Path, description = "Identifier of the attendee to delete")),
    responses(
        (status = 204, description = "Attendee deleted together with their responses and scores"),
        (status = 404, description = "No such attendee")
    )
)]
/// Delete an attendee, cascading their responses and game scores.
pub async fn delete_attendee(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    attendee_service::remove(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
