//! Agent contract.
//!
//! Every specialist implements [`Agent`]. Agents are idempotent with
//! respect to reads; write side effects are committed only on explicit
//! confirmation turns inside the workflow engine. Agents never raise past
//! the coordinator: failures travel inside the outcome as an [`ErrorKind`],
//! and the coordinator maps kinds without a reply to templates.

use async_trait::async_trait;
use chrono::NaiveDate;
use convergeai_core::error::ErrorKind;
use convergeai_core::types::ids::UserId;
use convergeai_core::types::session::{RetrievalProvenance, Session};
use convergeai_core::types::workflow::WorkflowState;
use convergeai_nlu::{Entities, Intent};
use serde_json::{Map, Value};

/// Per-turn input handed to a specialist agent
#[derive(Clone, Debug)]
pub struct AgentContext {
    /// Session the turn belongs to
    pub session: Session,
    /// Authenticated user
    pub user_ref: UserId,
    /// Classified intent
    pub intent: Intent,
    /// Extracted entities
    pub entities: Entities,
    /// Raw user utterance
    pub utterance: String,
    /// Calendar date of the turn, from the injected clock
    pub today: NaiveDate,
}

/// Result of one agent execution
#[derive(Clone, Debug)]
pub struct AgentOutcome {
    /// Assistant reply text; empty on failures the coordinator templates
    pub reply_text: String,
    /// Workflow to persist after the turn; `None` clears any active one
    pub workflow_after: Option<WorkflowState>,
    /// Machine-readable action label, e.g. `booking_committed`
    pub action_taken: String,
    /// Structured extras attached to the assistant message
    pub metadata: Map<String, Value>,
    /// Retrieved chunks the reply is grounded on, in relevance order
    pub provenance: Vec<RetrievalProvenance>,
    /// Grounding score of the reply, when retrieval was used
    pub grounding_score: Option<f32>,
    /// Failure class; the coordinator maps this to a reply template when
    /// `reply_text` is empty
    pub error: Option<ErrorKind>,
}

impl AgentOutcome {
    /// A plain successful reply.
    #[must_use]
    pub fn reply(text: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            reply_text: text.into(),
            workflow_after: None,
            action_taken: action.into(),
            metadata: Map::new(),
            provenance: Vec::new(),
            grounding_score: None,
            error: None,
        }
    }

    /// A failed outcome carrying the error kind; the coordinator supplies
    /// the reply template when `reply_text` stays empty.
    #[must_use]
    pub fn failed(kind: ErrorKind, action: impl Into<String>) -> Self {
        Self {
            reply_text: String::new(),
            workflow_after: None,
            action_taken: action.into(),
            metadata: Map::new(),
            provenance: Vec::new(),
            grounding_score: None,
            error: Some(kind),
        }
    }

    /// Builder: persist a workflow after this turn.
    #[must_use]
    pub fn with_workflow(mut self, workflow: WorkflowState) -> Self {
        self.workflow_after = Some(workflow);
        self
    }

    /// Builder: attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builder: tag the failure class while keeping the specific reply
    /// (business-rule failures carry their reason in the message).
    #[must_use]
    pub const fn with_error(mut self, kind: ErrorKind) -> Self {
        self.error = Some(kind);
        self
    }
}

/// Uniform specialist-agent contract
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable agent name recorded in the message `agent_trace`.
    fn name(&self) -> &'static str;

    /// Execute one turn. Never panics and never returns `Err`; failures are
    /// expressed through [`AgentOutcome::failed`].
    async fn execute(&self, ctx: &AgentContext) -> AgentOutcome;
}
