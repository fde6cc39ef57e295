//! Handler for the custom action family.

use async_trait::async_trait;
use corral_action::{Action, ActionOutcome};

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::handler::ActionHandler;

/// The pluggable `ACTION_EXECUTE` slot. The built-in implementation echoes
/// the action's inputs into its outputs; deployments register their own
/// handler over this kind for real custom work.
pub struct CustomHandler;

#[async_trait]
impl ActionHandler for CustomHandler {
    async fn execute(
        &self,
        action: &mut Action,
        _ctx: &ExecutionContext,
    ) -> Result<ActionOutcome, EngineError> {
        action.outputs = action.inputs.clone();
        Ok(ActionOutcome::Ok)
    }
}
