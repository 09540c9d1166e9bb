use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

/// Phases the live session can be in. Exactly one activity is ever live;
/// starting a new one always supersedes the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityPhase {
    /// Nothing is live.
    Idle,
    /// Break-game screen is up; no server countdown runs.
    Break,
    /// A poll question is live, identified by its question id.
    Poll(Uuid),
    /// A quiz is live, identified by its quiz id.
    Quiz(Uuid),
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    /// Presenter switches the room to the break game.
    StartBreak,
    /// Presenter puts a poll question live.
    StartPoll(Uuid),
    /// Presenter puts a quiz live.
    StartQuiz(Uuid),
    /// Presenter manually ends whatever is live.
    SetIdle,
    /// The poll countdown ran out. Only valid while that poll is live, so
    /// a stale expiry that lost a race against a newer activity is rejected.
    PollExpired(Uuid),
    /// The quiz countdown ran out. Same guard as [`ActivityEvent::PollExpired`].
    QuizExpired(Uuid),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: ActivityPhase,
    /// The event that cannot be applied from this phase.
    pub event: ActivityEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: ActivityPhase,
        /// Current phase.
        actual: ActivityPhase,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
///
/// The persist step runs between planning and applying, so a transition
/// whose storage write fails is aborted and the previous phase survives.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: ActivityPhase,
    /// Phase the state machine will transition to.
    pub to: ActivityPhase,
    /// Event that triggered this transition.
    pub event: ActivityEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: ActivityPhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
    /// Pending transition phase, if a transition is planned but not yet applied.
    pub pending: Option<ActivityPhase>,
}

/// State machine implementing the live-activity flow.
#[derive(Debug, Clone)]
pub struct ActivityMachine {
    phase: ActivityPhase,
    version: usize,
    pending: Option<Plan>,
}

impl Default for ActivityMachine {
    fn default() -> Self {
        Self {
            phase: ActivityPhase::Idle,
            version: 0,
            pending: None,
        }
    }
}

impl ActivityMachine {
    /// Create a new state machine initialised in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> ActivityPhase {
        self.phase
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: ActivityEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<ActivityPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;
        self.pending = None;

        Ok(self.phase)
    }

    /// Abort a planned transition without applying it, returning the state machine to its previous state.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Compute a transition from an event if the transition is valid.
    ///
    /// Every admin command is valid from every phase (starting an activity
    /// unconditionally supersedes the previous one); expiry events carry
    /// the subject id and only apply while that exact subject is live.
    fn compute_transition(&self, event: ActivityEvent) -> Result<ActivityPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (_, ActivityEvent::StartBreak) => ActivityPhase::Break,
            (_, ActivityEvent::StartPoll(question_id)) => ActivityPhase::Poll(question_id),
            (_, ActivityEvent::StartQuiz(quiz_id)) => ActivityPhase::Quiz(quiz_id),
            (_, ActivityEvent::SetIdle) => ActivityPhase::Idle,
            (ActivityPhase::Poll(live), ActivityEvent::PollExpired(expired)) if live == expired => {
                ActivityPhase::Idle
            }
            (ActivityPhase::Quiz(live), ActivityEvent::QuizExpired(expired)) if live == expired => {
                ActivityPhase::Idle
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
