//! Cancellation agent: starts the cancellation workflow.

use crate::outcome::{Agent, AgentContext, AgentOutcome};
use crate::workflow::{start_cancellation_draft, WorkflowEngine};
use async_trait::async_trait;
use convergeai_core::types::workflow::WorkflowState;
use std::sync::Arc;

/// Cancellation specialist
pub struct CancellationAgent {
    engine: Arc<WorkflowEngine>,
}

impl CancellationAgent {
    /// Create the agent over the shared workflow engine.
    #[must_use]
    pub const fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Agent for CancellationAgent {
    fn name(&self) -> &'static str {
        "cancellation"
    }

    async fn execute(&self, ctx: &AgentContext) -> AgentOutcome {
        let draft = start_cancellation_draft(&ctx.entities);
        self.engine
            .handle_turn(
                &ctx.session.session_id,
                ctx.user_ref,
                WorkflowState::CancellationDraft(draft),
                &ctx.utterance,
                &ctx.entities,
            )
            .await
    }
}
