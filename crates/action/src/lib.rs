#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Corral Action
//!
//! The durable unit of work in Corral. This crate models the action
//! entity and its state machine — it does NOT contain the dispatcher.
//! It defines:
//!
//! - [`ActionKind`] — the closed set of operations, partitioned into four
//!   families (cluster, node, policy, custom)
//! - [`ActionStatus`] — the seven-state lifecycle, with transitions
//!   validated by the [`transition`] module
//! - [`Action`] — the flat persisted record: target, cause, ownership
//!   claim, schedule, dependency edges, inputs/outputs
//! - [`ActionTarget`] — the typed reference to the entity being mutated
//! - [`PolicyDecision`] — the typed verdict a BEFORE hook attaches for the
//!   executor to consume
//! - [`ActionOutcome`] — the handler return vocabulary (ok / error / retry)

pub mod action;
pub mod decision;
pub mod error;
pub mod kind;
pub mod schedule;
pub mod status;
pub mod target;
pub mod transition;

pub use action::{Action, ActionOutcome};
pub use decision::{AdjustmentPlan, DecisionOutcome, PolicyDecision};
pub use error::ActionError;
pub use kind::{ActionFamily, ActionKind};
pub use schedule::{Cause, Schedule};
pub use status::ActionStatus;
pub use target::ActionTarget;
