pub mod hub;
pub mod state_machine;
pub mod timer;

use std::{sync::Arc, time::Duration};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::{config::AppConfig, dao::session_store::SessionStore, error::ServiceError};

pub use self::hub::EventHub;
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};
pub use self::timer::TimerScheduler;
use self::state_machine::{ActivityEvent, ActivityMachine, ActivityPhase};

/// Shared handle to the process-wide application state.
pub type SharedState = Arc<AppState>;
/// Upper bound on the persist step of a state transition.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

/// Identity attached to a connection once its attendee joined with a valid
/// session token.
#[derive(Clone)]
pub struct JoinedAttendee {
    /// Attendee id from the store.
    pub id: Uuid,
    /// Display name broadcast to peers.
    pub name: String,
}

#[derive(Clone)]
/// Handle used to push messages to a connected attendee socket.
pub struct AttendeeConnection {
    /// Writer channel of the socket.
    pub tx: mpsc::UnboundedSender<Message>,
    /// Present once the connection joined with a valid token.
    pub attendee: Option<JoinedAttendee>,
}

/// Applied state transition as seen by the caller of
/// [`AppState::run_transition`]: the phase left and the phase entered.
#[derive(Debug, Clone, Copy)]
pub struct AppliedTransition {
    /// Phase before the transition.
    pub from: ActivityPhase,
    /// Phase after the transition.
    pub to: ActivityPhase,
}

/// Central application state storing the live-activity machine, the
/// countdown, attendee connections, and the storage handle.
pub struct AppState {
    config: AppConfig,
    session_store: RwLock<Option<Arc<dyn SessionStore>>>,
    events: EventHub,
    connections: DashMap<Uuid, AttendeeConnection>,
    activity: RwLock<ActivityMachine>,
    timer: TimerScheduler,
    degraded: watch::Sender<bool>,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let capacity = config.event_channel_capacity();
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            session_store: RwLock::new(None),
            events: EventHub::new(capacity),
            connections: DashMap::new(),
            activity: RwLock::new(ActivityMachine::new()),
            timer: TimerScheduler::new(),
            degraded: degraded_tx,
            transition_gate: Mutex::new(()),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current session store, if one is installed.
    pub async fn session_store(&self) -> Option<Arc<dyn SessionStore>> {
        let guard = self.session_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the session store or fail with the degraded-mode error.
    pub async fn require_session_store(&self) -> Result<Arc<dyn SessionStore>, ServiceError> {
        self.session_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new session store implementation and leave degraded mode.
    pub async fn install_session_store(&self, store: Arc<dyn SessionStore>) {
        {
            let mut guard = self.session_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub(crate) fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    /// Broadcast hub every realtime consumer subscribes to.
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Registry of connected attendee sockets keyed by connection id.
    pub fn connections(&self) -> &DashMap<Uuid, AttendeeConnection> {
        &self.connections
    }

    /// Number of connections whose attendee joined with a valid token.
    pub fn joined_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.attendee.is_some())
            .count()
    }

    /// The per-process countdown. Driven exclusively by the session
    /// orchestrator; no other module may arm or cancel it.
    pub(crate) fn timer(&self) -> &TimerScheduler {
        &self.timer
    }

    /// Snapshot the current phase of the shared activity machine.
    pub async fn activity_phase(&self) -> ActivityPhase {
        self.activity.read().await.phase()
    }

    /// Snapshot the full activity machine state.
    pub async fn snapshot(&self) -> Snapshot {
        let sm = self.activity.read().await;
        sm.snapshot()
    }

    /// Plan a transition on the shared activity machine, returning the plan.
    async fn plan_transition(&self, event: ActivityEvent) -> Result<Plan, PlanError> {
        let mut sm = self.activity.write().await;
        sm.plan(event)
    }

    /// Apply the planned transition, returning the next phase.
    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<ActivityPhase, ApplyError> {
        let mut sm = self.activity.write().await;
        sm.apply(plan_id)
    }

    /// Abort a planned transition of the shared activity machine.
    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut sm = self.activity.write().await;
        sm.abort(plan_id)
    }

    /// Run `event` as one unbroken unit of work: plan the transition, run
    /// the persist step, then apply. The gate serialises every mutating
    /// path (admin commands and expiry finalizers alike), and a failed or
    /// timed-out persist aborts the plan so the previous activity survives
    /// untouched.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: ActivityEvent,
        work: F,
    ) -> Result<(T, AppliedTransition), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate.lock().await;
        let Plan {
            id: plan_id, from, ..
        } = self.plan_transition(event).await?;

        let work_future = work();
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let to = self.apply_planned_transition(plan_id).await?;
                drop(gate);
                Ok((value, AppliedTransition { from, to }))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }
}
