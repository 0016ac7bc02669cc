//! Coordinator: the per-turn pipeline.
//!
//! load session → (active workflow ? workflow engine : classify →
//! dispatch) → persist workflow → append both messages → respond. The
//! per-session mutex is held from load through append; the whole turn runs
//! under the 30-second budget, and because drafts are only persisted on a
//! successful reply, an aborted turn leaves the pre-turn workflow intact.

use crate::replies;
use crate::retry::retry_agent_outcome;
use crate::session_store::SessionStore;
use convergeai_agents::{AgentContext, AgentOutcome, AgentSet, WorkflowEngine};
use convergeai_core::clock::Clock;
use convergeai_core::config::Deadlines;
use convergeai_core::error::{CoreError, CoreResult, ErrorKind};
use convergeai_core::repo::AuditRepo;
use convergeai_core::types::alert::{ResourceKind, ResourceRef};
use convergeai_core::types::audit::AuditEntry;
use convergeai_core::types::ids::{MessageId, SessionId, UserId};
use convergeai_core::types::session::{Channel, NewMessage, Role};
use convergeai_nlu::{is_workflow_cancellation, Intent, IntentClassifier};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Maximum accepted utterance length in characters.
const MAX_TEXT_LEN: usize = 4000;

/// One inbound user turn, transport-agnostic
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnRequest {
    /// Existing session id, if the caller has one
    pub session_id: Option<String>,
    /// Authenticated user
    pub user_ref: UserId,
    /// Utterance text, non-empty, at most 4000 chars
    pub text: String,
    /// Channel the turn arrived on
    pub channel: Channel,
}

/// The coordinator's answer to one turn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnResponse {
    /// Session the turn ran in (freshly minted when absent or expired)
    pub session_id: SessionId,
    /// Persisted user message id
    pub user_msg_id: MessageId,
    /// Persisted assistant message id
    pub assistant_msg_id: MessageId,
    /// Assistant reply text
    pub reply_text: String,
    /// Classified intent, when classification ran
    pub intent: Option<String>,
    /// Whether a workflow is active after this turn
    pub workflow_active: bool,
    /// End-to-end turn latency in milliseconds
    pub latency_ms: u32,
}

/// Top-level turn pipeline
pub struct Coordinator {
    sessions: Arc<SessionStore>,
    classifier: IntentClassifier,
    engine: Arc<WorkflowEngine>,
    agents: AgentSet,
    audit: Arc<dyn AuditRepo>,
    clock: Arc<dyn Clock>,
    deadlines: Deadlines,
}

impl Coordinator {
    /// Wire the pipeline.
    #[must_use]
    pub fn new(
        sessions: Arc<SessionStore>,
        engine: Arc<WorkflowEngine>,
        agents: AgentSet,
        audit: Arc<dyn AuditRepo>,
        clock: Arc<dyn Clock>,
        deadlines: Deadlines,
    ) -> Self {
        Self {
            sessions,
            classifier: IntentClassifier::new(),
            engine,
            agents,
            audit,
            clock,
            deadlines,
        }
    }

    /// Handle one user turn end to end.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSlotValue` for an empty or oversized utterance and
    /// propagates unrecoverable store errors; agent failures are mapped to
    /// reply templates instead of errors.
    #[instrument(skip_all, fields(user = %request.user_ref))]
    pub async fn handle_turn(&self, request: TurnRequest) -> CoreResult<TurnResponse> {
        if request.text.trim().is_empty() || request.text.chars().count() > MAX_TEXT_LEN {
            return Err(CoreError::InvalidSlotValue {
                slot: "text".to_string(),
                reason: format!("must be non-empty and at most {MAX_TEXT_LEN} characters"),
            });
        }

        let started = Instant::now();
        let budget = std::time::Duration::from_millis(self.deadlines.turn_budget_ms);
        match tokio::time::timeout(budget, self.run_turn(&request, started)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("turn exceeded its budget, aborting with pre-turn workflow intact");
                self.aborted_turn(&request, started).await
            },
        }
    }

    async fn run_turn(
        &self,
        request: &TurnRequest,
        started: Instant,
    ) -> CoreResult<TurnResponse> {
        let requested_id = request
            .session_id
            .as_deref()
            .and_then(|raw| SessionId::parse(raw).ok());
        let session = self
            .sessions
            .open_or_load(requested_id, request.user_ref, request.channel)
            .await?;
        let session_id = session.session_id.clone();

        // Serialize this turn against the session from load through append.
        let _guard = self.sessions.lock(&session_id).await;
        let session = self
            .sessions
            .repo()
            .get(&session_id)
            .await?
            .ok_or_else(|| CoreError::SessionNotFound(session_id.clone()))?;

        let today = self.clock.now().date_naive();
        let mut active_workflow = session.active_workflow.clone();
        let mut workflow_interrupted = false;

        if active_workflow.is_some() && is_workflow_cancellation(&request.text) {
            // Clear the draft, then let classification handle the turn.
            info!(session = %session_id, "workflow cancelled by user");
            self.sessions.repo().save_workflow(&session_id, None).await?;
            active_workflow = None;
            workflow_interrupted = true;
        }

        let (intent, confidence, trace, mut outcome) = if let Some(state) = active_workflow {
            let entities = convergeai_nlu::extract(&request.text, today);
            let outcome = retry_agent_outcome(|| {
                self.engine.handle_turn(
                    &session_id,
                    request.user_ref,
                    state.clone(),
                    &request.text,
                    &entities,
                )
            })
            .await;
            (None, None, vec!["workflow".to_string()], outcome)
        } else {
            let classification = self.classifier.classify(&request.text, today);
            let intent = classification.intent;
            let ctx = AgentContext {
                session: session.clone(),
                user_ref: request.user_ref,
                intent,
                entities: classification.entities.clone(),
                utterance: request.text.clone(),
                today,
            };
            let (trace, outcome) = match intent {
                Intent::Greeting => (
                    vec!["coordinator".to_string()],
                    AgentOutcome::reply(replies::GREETING, "greeting"),
                ),
                Intent::Other => (
                    vec!["coordinator".to_string()],
                    AgentOutcome::reply(replies::CLARIFY, "clarification"),
                ),
                _ => match self.agents.agent_for(intent) {
                    Some(agent) => {
                        let outcome = retry_agent_outcome(|| agent.execute(&ctx)).await;
                        (
                            vec!["coordinator".to_string(), agent.name().to_string()],
                            outcome,
                        )
                    },
                    None => (
                        vec!["coordinator".to_string()],
                        AgentOutcome::reply(replies::CLARIFY, "clarification"),
                    ),
                },
            };
            (
                Some(intent.as_str().to_string()),
                Some(classification.confidence),
                trace,
                outcome,
            )
        };

        if let Some(kind) = outcome.error {
            if outcome.reply_text.is_empty() {
                outcome.reply_text = replies::for_error_kind(kind).to_string();
            }
            if matches!(kind, ErrorKind::Invariant | ErrorKind::BusinessRule) {
                self.audit_turn_error(&session_id, kind).await;
            }
            if kind == ErrorKind::Invariant {
                // Programming error: abort with no partial writes.
                error!(session = %session_id, action = %outcome.action_taken, "invariant violation");
                return Err(CoreError::Invariant(format!(
                    "turn aborted in {}",
                    outcome.action_taken
                )));
            }
        }

        // Draft updates are persisted only now that the reply is ready.
        self.sessions
            .repo()
            .save_workflow(&session_id, outcome.workflow_after.clone())
            .await?;

        let now = self.clock.now();
        let user_msg_id = self
            .sessions
            .repo()
            .append_message(
                &session_id,
                NewMessage {
                    role: Role::User,
                    text: request.text.clone(),
                    intent: intent.clone(),
                    intent_confidence: confidence,
                    agent_trace: Vec::new(),
                    retrieval_provenance: Vec::new(),
                    grounding_score: None,
                    latency_ms: 0,
                    created_at: now,
                },
            )
            .await?;

        let latency_ms = u32::try_from(started.elapsed().as_millis()).unwrap_or(u32::MAX);
        let assistant_msg_id = self
            .sessions
            .repo()
            .append_message(
                &session_id,
                NewMessage {
                    role: Role::Assistant,
                    text: outcome.reply_text.clone(),
                    intent: None,
                    intent_confidence: None,
                    agent_trace: trace,
                    retrieval_provenance: outcome.provenance.clone(),
                    grounding_score: outcome.grounding_score,
                    latency_ms,
                    created_at: now,
                },
            )
            .await?;
        self.sessions.repo().touch(&session_id, now).await?;

        if workflow_interrupted {
            info!(session = %session_id, "turn completed after workflow interruption");
        }

        Ok(TurnResponse {
            session_id,
            user_msg_id,
            assistant_msg_id,
            reply_text: outcome.reply_text,
            intent,
            workflow_active: outcome.workflow_after.is_some(),
            latency_ms,
        })
    }

    /// Budget-exceeded path: nothing from the aborted attempt was
    /// persisted, so the workflow is already at its pre-turn value. The
    /// exchange is still recorded.
    async fn aborted_turn(
        &self,
        request: &TurnRequest,
        started: Instant,
    ) -> CoreResult<TurnResponse> {
        let requested_id = request
            .session_id
            .as_deref()
            .and_then(|raw| SessionId::parse(raw).ok());
        let session = self
            .sessions
            .open_or_load(requested_id, request.user_ref, request.channel)
            .await?;
        let session_id = session.session_id.clone();
        let _guard = self.sessions.lock(&session_id).await;

        let now = self.clock.now();
        let user_msg_id = self
            .sessions
            .repo()
            .append_message(&session_id, NewMessage::new(Role::User, &request.text, now))
            .await?;
        let latency_ms = u32::try_from(started.elapsed().as_millis()).unwrap_or(u32::MAX);
        let mut reply = NewMessage::new(Role::Assistant, replies::TRANSIENT, now);
        reply.latency_ms = latency_ms;
        reply.agent_trace = vec!["coordinator".to_string()];
        let assistant_msg_id = self
            .sessions
            .repo()
            .append_message(&session_id, reply)
            .await?;
        self.sessions.repo().touch(&session_id, now).await?;

        Ok(TurnResponse {
            session_id: session_id.clone(),
            user_msg_id,
            assistant_msg_id,
            reply_text: replies::TRANSIENT.to_string(),
            intent: None,
            workflow_active: session.active_workflow.is_some(),
            latency_ms,
        })
    }

    async fn audit_turn_error(&self, session_id: &SessionId, kind: ErrorKind) {
        let entry = AuditEntry::alert_write(
            None,
            format!("turn_error:{kind:?}"),
            ResourceRef::new(ResourceKind::Session, session_id),
            self.clock.now(),
        );
        if let Err(err) = self.audit.record(entry).await {
            warn!(%err, "failed to audit turn error");
        }
    }
}
