//! Typed policy verdicts attached to actions.
//!
//! BEFORE hooks record their verdict here instead of in an untyped data
//! map; the dispatcher reads the outcome to decide whether execution may
//! proceed, and handlers consume the adjustment plan.

use serde::{Deserialize, Serialize};

/// A hook's verdict on an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// The check passed; execution may proceed.
    Ok,
    /// The check failed; the action must not execute.
    Reject,
}

/// A sizing instruction computed by a BEFORE hook for the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AdjustmentPlan {
    /// Create `count` new members.
    Creation {
        /// Number of nodes to create.
        count: u32,
    },
    /// Delete `count` existing members.
    Deletion {
        /// Number of nodes to delete.
        count: u32,
    },
}

impl AdjustmentPlan {
    /// The node count this plan adds or removes.
    #[must_use]
    pub fn count(&self) -> u32 {
        match self {
            Self::Creation { count } | Self::Deletion { count } => *count,
        }
    }
}

/// The full verdict a policy round leaves on an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Pass or reject.
    pub outcome: DecisionOutcome,
    /// Human-readable explanation, surfaced as `status_reason` on rejection.
    pub reason: String,
    /// Optional sizing instruction for the executor.
    #[serde(default)]
    pub plan: Option<AdjustmentPlan>,
}

impl PolicyDecision {
    /// A passing verdict.
    #[must_use]
    pub fn ok(reason: impl Into<String>) -> Self {
        Self {
            outcome: DecisionOutcome::Ok,
            reason: reason.into(),
            plan: None,
        }
    }

    /// A rejecting verdict.
    #[must_use]
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            outcome: DecisionOutcome::Reject,
            reason: reason.into(),
            plan: None,
        }
    }

    /// Attach a sizing instruction.
    #[must_use]
    pub fn with_plan(mut self, plan: AdjustmentPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    /// Returns `true` if this verdict blocks execution.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        self.outcome == DecisionOutcome::Reject
    }
}
