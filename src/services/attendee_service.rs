use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::AttendeeEntity,
    dto::admin::{AttendeeCountResponse, AttendeeRegistered, RegisterAttendeeRequest},
    error::ServiceError,
    state::SharedState,
};

/// Register a new attendee and issue their session token.
///
/// Display names are globally unique and case-sensitive; a taken name is a
/// conflict surfaced to the caller, not a silent no-op.
pub async fn register(
    state: &SharedState,
    request: RegisterAttendeeRequest,
) -> Result<AttendeeRegistered, ServiceError> {
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(format!("validation failed: {err}")))?;

    let store = state.require_session_store().await?;
    let attendee = AttendeeEntity {
        id: Uuid::new_v4(),
        name: request.name,
        session_token: Uuid::new_v4().simple().to_string(),
        created_at: SystemTime::now(),
    };

    if !store.insert_attendee(attendee.clone()).await? {
        return Err(ServiceError::InvalidState(format!(
            "display name `{}` is already taken",
            attendee.name
        )));
    }

    info!(id = %attendee.id, name = %attendee.name, "attendee registered");
    Ok(attendee.into())
}

/// Remove an attendee, cascading their responses and game scores.
pub async fn remove(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_session_store().await?;
    if !store.delete_attendee(id).await? {
        return Err(ServiceError::NotFound(format!("attendee `{id}` not found")));
    }
    info!(%id, "attendee deleted");
    Ok(())
}

/// Number of registered attendees.
pub async fn count(state: &SharedState) -> Result<AttendeeCountResponse, ServiceError> {
    let store = state.require_session_store().await?;
    let count = store.count_attendees().await?;
    Ok(AttendeeCountResponse { count })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::AppConfig;
    use crate::dao::session_store::memory::MemorySessionStore;
    use crate::state::AppState;

    async fn test_state() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state
            .install_session_store(Arc::new(MemorySessionStore::new()))
            .await;
        state
    }

    #[tokio::test]
    async fn register_issues_a_session_token() {
        let state = test_state().await;
        let registered = register(
            &state,
            RegisterAttendeeRequest {
                name: "ada".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(registered.name, "ada");
        assert!(!registered.session_token.is_empty());
        assert_eq!(count(&state).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let state = test_state().await;
        for expected_ok in [true, false] {
            let result = register(
                &state,
                RegisterAttendeeRequest {
                    name: "ada".to_string(),
                },
            )
            .await;
            assert_eq!(result.is_ok(), expected_ok);
        }
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let state = test_state().await;
        let result = register(
            &state,
            RegisterAttendeeRequest {
                name: "   ".to_string(),
            },
        )
        .await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn remove_cascades_and_reports_missing_ids() {
        let state = test_state().await;
        let registered = register(
            &state,
            RegisterAttendeeRequest {
                name: "ada".to_string(),
            },
        )
        .await
        .unwrap();

        remove(&state, registered.id).await.unwrap();
        assert_eq!(count(&state).await.unwrap().count, 0);
        assert!(matches!(
            remove(&state, registered.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
