use axum::{
    Json, Router,
    extract::State,
    routing::post,
};

use crate::{
    dto::admin::{ActionResponse, StartPollRequest, StartQuizRequest},
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Presenter commands driving the live session. Starting an activity
/// unconditionally supersedes whatever is currently live; a missing subject
/// is acknowledged but changes nothing (the reference behavior).
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/admin/session/break", post(start_break))
        .route("/admin/session/poll", post(start_poll))
        .route("/admin/session/quiz", post(start_quiz))
        .route("/admin/session/idle", post(set_idle))
}

#[utoipa::path(
    post,
    path = "/admin/session/break",
    tag = "admin",
    responses(
        (status = 200, description = "Break started", body = ActionResponse),
        (status = 503, description = "Storage unavailable; previous activity untouched")
    )
)]
/// Switch the room to the break game.
pub async fn start_break(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    session_service::start_break(&state).await?;
    Ok(Json(ActionResponse::ok()))
}

#[utoipa::path(
    post,
    path = "/admin/session/poll",
    tag = "admin",
    request_body = StartPollRequest,
    responses(
        (status = 200, description = "Poll started (or silently ignored when the question is unknown)", body = ActionResponse),
        (status = 503, description = "Storage unavailable; previous activity untouched")
    )
)]
/// Put a poll question live.
pub async fn start_poll(
    State(state): State<SharedState>,
    Json(payload): Json<StartPollRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    session_service::start_poll(&state, payload.question_id).await?;
    Ok(Json(ActionResponse::ok()))
}

#[utoipa::path(
    post,
    path = "/admin/session/quiz",
    tag = "admin",
    request_body = StartQuizRequest,
    responses(
        (status = 200, description = "Quiz started (or silently ignored when the quiz is unknown or empty)", body = ActionResponse),
        (status = 503, description = "Storage unavailable; previous activity untouched")
    )
)]
/// Put a quiz live.
pub async fn start_quiz(
    State(state): State<SharedState>,
    Json(payload): Json<StartQuizRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    session_service::start_quiz(&state, payload.quiz_id).await?;
    Ok(Json(ActionResponse::ok()))
}

#[utoipa::path(
    post,
    path = "/admin/session/idle",
    tag = "admin",
    responses(
        (status = 200, description = "Session returned to idle", body = ActionResponse),
        (status = 503, description = "Storage unavailable; previous activity untouched")
    )
)]
/// End whatever is live and return the room to idle.
pub async fn set_idle(State(state): State<SharedState>) -> Result<Json<ActionResponse>, AppError> {
    session_service::set_idle(&state).await?;
    Ok(Json(ActionResponse::ok()))
}
