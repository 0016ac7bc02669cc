//! Complaint agent: starts the complaint workflow.

use crate::outcome::{Agent, AgentContext, AgentOutcome};
use crate::workflow::{start_complaint_draft, WorkflowEngine};
use async_trait::async_trait;
use convergeai_core::types::workflow::WorkflowState;
use std::sync::Arc;

/// Complaint specialist
pub struct ComplaintAgent {
    engine: Arc<WorkflowEngine>,
}

impl ComplaintAgent {
    /// Create the agent over the shared workflow engine.
    #[must_use]
    pub const fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Agent for ComplaintAgent {
    fn name(&self) -> &'static str {
        "complaint"
    }

    async fn execute(&self, ctx: &AgentContext) -> AgentOutcome {
        let draft = start_complaint_draft(&ctx.entities);
        self.engine
            .handle_turn(
                &ctx.session.session_id,
                ctx.user_ref,
                WorkflowState::ComplaintDraft(draft),
                &ctx.utterance,
                &ctx.entities,
            )
            .await
    }
}
