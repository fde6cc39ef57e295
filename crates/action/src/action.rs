//! The durable action record and its state machine.

use chrono::{DateTime, Duration, Utc};
use corral_core::{ActionId, WorkerId};
use serde::{Deserialize, Serialize};

use crate::decision::PolicyDecision;
use crate::error::ActionError;
use crate::kind::{ActionFamily, ActionKind};
use crate::schedule::{Cause, Schedule};
use crate::status::ActionStatus;
use crate::target::ActionTarget;
use crate::transition::validate_transition;

/// Default seconds before a running action is considered stuck. The engine
/// configuration overrides this at creation time.
pub const DEFAULT_TIMEOUT_SECS: i64 = 3600;

/// What a handler reports back to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The action completed its work.
    Ok,
    /// The action failed permanently.
    Error,
    /// The action hit a transient fault and should be requeued.
    Retry,
}

impl std::fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Error => write!(f, "error"),
            Self::Retry => write!(f, "retry"),
        }
    }
}

/// One durable unit of work against one target.
///
/// The record is flat — dependencies are ID lists resolved through the
/// storage gateway, never embedded objects. `owner` doubles as the claim
/// lock: a non-null owner means some worker holds the action, and terminal
/// transitions always clear it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Unique action identifier.
    pub id: ActionId,
    /// Human-readable label.
    pub name: String,
    /// The entity being acted on.
    pub target: ActionTarget,
    /// The operation to perform.
    pub kind: ActionKind,
    /// Why this action exists.
    pub cause: Cause,
    /// The worker currently holding the claim, if any.
    #[serde(default)]
    pub owner: Option<WorkerId>,
    /// Repeat period in seconds; -1 means one-shot.
    pub interval: i64,
    /// Earliest-start marker, if deferred.
    #[serde(default)]
    pub start_time: Option<Schedule>,
    /// When the action must be finished, if bounded.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds of running time before the action is considered stuck.
    pub timeout: i64,
    /// Current lifecycle status.
    pub status: ActionStatus,
    /// Reason for the current status.
    #[serde(default)]
    pub status_reason: String,
    /// Caller-supplied parameters.
    #[serde(default)]
    pub inputs: serde_json::Map<String, serde_json::Value>,
    /// Results produced by execution.
    #[serde(default)]
    pub outputs: serde_json::Map<String, serde_json::Value>,
    /// Actions that must succeed before this one may run.
    #[serde(default)]
    pub depends_on: Vec<ActionId>,
    /// Actions waiting on this one.
    #[serde(default)]
    pub depended_by: Vec<ActionId>,
    /// The latest policy verdict, if a hook round has run.
    #[serde(default)]
    pub decision: Option<PolicyDecision>,
    /// Requeue count consumed by the dispatcher's retry budget.
    #[serde(default)]
    pub retries: u32,
    /// Cooperative cancellation flag, observed at hook boundaries.
    #[serde(default)]
    pub cancel_requested: bool,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the first running attempt started.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the action reached a terminal state.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Action {
    /// Create a new action in the `Init` state.
    ///
    /// Fails when no target is supplied, when a policy-family kind lacks its
    /// policy reference, or when the kind does not belong to the target's
    /// family. Custom kinds accept any target.
    pub fn new(
        kind: ActionKind,
        target: Option<ActionTarget>,
        cause: Cause,
    ) -> Result<Self, ActionError> {
        let Some(target) = target else {
            return Err(ActionError::MissingTarget {
                kind: kind.to_string(),
            });
        };

        match (kind.family(), target) {
            (ActionFamily::Cluster, ActionTarget::Cluster { .. })
            | (ActionFamily::Node, ActionTarget::Node { .. })
            | (ActionFamily::Policy, ActionTarget::ClusterPolicy { .. })
            | (ActionFamily::Custom, _) => {}
            // A policy action addressed at a bare cluster has the cluster
            // half of the binding but no policy reference.
            (ActionFamily::Policy, ActionTarget::Cluster { .. }) => {
                return Err(ActionError::MissingPolicy {
                    kind: kind.to_string(),
                });
            }
            (_, target) => {
                return Err(ActionError::KindTargetMismatch {
                    kind: kind.to_string(),
                    target: target.to_string(),
                });
            }
        }

        Ok(Self {
            id: ActionId::v4(),
            name: kind.to_string().to_lowercase(),
            target,
            kind,
            cause,
            owner: None,
            interval: -1,
            start_time: None,
            end_time: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            status: ActionStatus::Init,
            status_reason: String::new(),
            inputs: serde_json::Map::new(),
            outputs: serde_json::Map::new(),
            depends_on: Vec::new(),
            depended_by: Vec::new(),
            decision: None,
            retries: 0,
            cancel_requested: false,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        })
    }

    /// Set the human-readable label.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a caller-supplied input.
    #[must_use]
    pub fn with_input(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.inputs.insert(key.into(), value);
        self
    }

    /// Replace the full input map.
    #[must_use]
    pub fn with_inputs(mut self, inputs: serde_json::Map<String, serde_json::Value>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Set the running-time bound in seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout: i64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the repeat period in seconds (-1 = one-shot).
    #[must_use]
    pub fn with_interval(mut self, interval: i64) -> Self {
        self.interval = interval;
        self
    }

    /// Set a deferred-start marker.
    #[must_use]
    pub fn with_start_time(mut self, schedule: Schedule) -> Self {
        self.start_time = Some(schedule);
        self
    }

    /// Declare dependencies on other actions.
    #[must_use]
    pub fn with_depends_on(mut self, deps: Vec<ActionId>) -> Self {
        self.depends_on = deps;
        self
    }

    /// Returns `true` if this action has declared dependencies.
    #[must_use]
    pub fn has_dependencies(&self) -> bool {
        !self.depends_on.is_empty()
    }

    /// Move out of `Init` once dependency analysis is done: `Waiting` when
    /// dependencies exist, `Ready` otherwise.
    pub fn analyze_dependencies(&mut self) -> Result<(), ActionError> {
        if self.has_dependencies() {
            self.set_status(ActionStatus::Waiting)
        } else {
            self.set_status(ActionStatus::Ready)
        }
    }

    /// Transition to a new status.
    ///
    /// Re-asserting the terminal state the action is already in is an
    /// idempotent no-op; any other exit from a terminal state is an error.
    /// Terminal transitions clear the ownership claim and stamp
    /// `completed_at`; entering `Running` stamps `started_at` on the first
    /// attempt.
    pub fn set_status(&mut self, status: ActionStatus) -> Result<(), ActionError> {
        if self.status.is_terminal() && self.status == status {
            return Ok(());
        }
        validate_transition(self.status, status)?;
        self.status = status;

        if status == ActionStatus::Running && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        if status.is_terminal() {
            self.completed_at = Some(Utc::now());
            self.owner = None;
        }
        Ok(())
    }

    /// Transition to a new status, recording the reason.
    pub fn set_status_with_reason(
        &mut self,
        status: ActionStatus,
        reason: impl Into<String>,
    ) -> Result<(), ActionError> {
        self.set_status(status)?;
        self.status_reason = reason.into();
        Ok(())
    }

    /// Request cooperative cancellation. Does not preempt a running worker;
    /// the flag is observed at hook boundaries.
    pub fn request_cancel(&mut self) {
        self.cancel_requested = true;
    }

    /// Attach the verdict of a policy hook round.
    pub fn record_decision(&mut self, decision: PolicyDecision) {
        self.decision = Some(decision);
    }

    /// Returns `true` if the action has been running longer than `timeout`.
    #[must_use]
    pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
        if self.status != ActionStatus::Running || self.timeout < 0 {
            return false;
        }
        self.started_at
            .is_some_and(|started| now - started > Duration::seconds(self.timeout))
    }

    /// Returns `true` if a worker may claim this action at `now`: it is
    /// `Ready` and any start marker permits starting.
    #[must_use]
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.status == ActionStatus::Ready
            && self
                .start_time
                .as_ref()
                .is_none_or(|schedule| schedule.permits_start(now))
    }

    /// An explicit `count` input, if the caller supplied a usable one.
    #[must_use]
    pub fn count_input(&self) -> Option<i64> {
        self.inputs.get("count").and_then(serde_json::Value::as_i64)
    }
}
