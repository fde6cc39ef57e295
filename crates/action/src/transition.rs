//! State machine transition validation for actions.

use crate::error::ActionError;
use crate::status::ActionStatus;

/// Returns `true` if the transition from `from` to `to` is valid.
///
/// `Running → Ready` is the retry path: a handler returned a retryable
/// outcome and the dispatcher requeues the action for another claim.
/// `Waiting → Failed` is dependency-failure propagation.
#[must_use]
pub fn can_transition(from: ActionStatus, to: ActionStatus) -> bool {
    matches!(
        (from, to),
        (ActionStatus::Init, ActionStatus::Waiting)
            | (ActionStatus::Init, ActionStatus::Ready)
            | (ActionStatus::Init, ActionStatus::Cancelled)
            | (ActionStatus::Waiting, ActionStatus::Ready)
            | (ActionStatus::Waiting, ActionStatus::Failed)
            | (ActionStatus::Waiting, ActionStatus::Cancelled)
            | (ActionStatus::Ready, ActionStatus::Running)
            | (ActionStatus::Ready, ActionStatus::Cancelled)
            | (ActionStatus::Running, ActionStatus::Succeeded)
            | (ActionStatus::Running, ActionStatus::Failed)
            | (ActionStatus::Running, ActionStatus::Cancelled)
            | (ActionStatus::Running, ActionStatus::Ready)
    )
}

/// Validate a transition, returning an error if invalid.
///
/// Re-asserting the terminal state an action is already in is accepted as a
/// no-op at the call sites (see `Action::set_status`); this function only
/// answers whether the edge exists in the state machine.
pub fn validate_transition(from: ActionStatus, to: ActionStatus) -> Result<(), ActionError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(ActionError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
