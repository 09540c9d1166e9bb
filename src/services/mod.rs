/// Attendee registration and removal.
pub mod attendee_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Quiz leaderboard computation.
pub mod leaderboard_service;
/// The session orchestrator: activity transitions, countdowns, response and
/// score ingestion.
pub mod session_service;
/// Realtime event construction and broadcasting.
pub mod sse_events;
/// Server-Sent Events stream plumbing.
pub mod sse_service;
/// Storage persistence coordinator with reconnect backoff.
pub mod storage_supervisor;
/// Per-option response tallies.
pub mod tally_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
