use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Stagelink Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::get_session_state,
        crate::routes::sse::event_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::admin::start_break,
        crate::routes::admin::start_poll,
        crate::routes::admin::start_quiz,
        crate::routes::admin::set_idle,
        crate::routes::attendees::register_attendee,
        crate::routes::attendees::count_attendees,
        crate::routes::attendees::delete_attendee,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::admin::StartPollRequest,
            crate::dto::admin::StartQuizRequest,
            crate::dto::admin::ActionResponse,
            crate::dto::admin::RegisterAttendeeRequest,
            crate::dto::admin::AttendeeRegistered,
            crate::dto::admin::AttendeeCountResponse,
            crate::dto::session::ActivitySnapshot,
            crate::dto::session::PollQuestionView,
            crate::dto::session::QuizQuestionView,
            crate::dto::session::LeaderboardEntry,
            crate::dto::session::HighScore,
            crate::dto::ws::AttendeeInboundMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Live session state and realtime streams"),
        (name = "admin", description = "Presenter commands driving the live session"),
        (name = "attendees", description = "Attendee registration"),
    )
)]
pub struct ApiDoc;
