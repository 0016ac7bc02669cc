//! In-memory session repository.
//!
//! Enforces the same invariants the production store does: append fails on
//! missing sessions, and user/assistant roles must strictly alternate after
//! the first user message (system messages excluded).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use convergeai_core::error::{CoreError, CoreResult};
use convergeai_core::repo::{Page, SessionRepo};
use convergeai_core::types::ids::{MessageId, SessionId, UserId};
use convergeai_core::types::session::{
    ConversationMessage, NewMessage, Role, Session, SessionStatus, SessionSummary,
};
use convergeai_core::types::workflow::WorkflowState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, Session>,
    messages: HashMap<SessionId, Vec<ConversationMessage>>,
}

/// RwLock-backed session repository
#[derive(Default)]
pub struct InMemorySessionRepo {
    inner: RwLock<Inner>,
    next_message_id: AtomicU64,
}

impl InMemorySessionRepo {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, for assertions.
    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}

fn alternation_violated(existing: &[ConversationMessage], incoming: &NewMessage) -> bool {
    if incoming.role == Role::System {
        return false;
    }
    let last_role = existing
        .iter()
        .rev()
        .map(|m| m.role)
        .find(|r| *r != Role::System);
    match (last_role, incoming.role) {
        (None, Role::User) => false,
        (None, _) => true,
        (Some(last), incoming) => last == incoming,
    }
}

#[async_trait]
impl SessionRepo for InMemorySessionRepo {
    async fn create(&self, session: Session) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.sessions.contains_key(&session.session_id) {
            return Err(CoreError::DatabaseTransient(format!(
                "duplicate session id {}",
                session.session_id
            )));
        }
        inner.messages.insert(session.session_id.clone(), Vec::new());
        inner.sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn get(&self, session_id: &SessionId) -> CoreResult<Option<Session>> {
        Ok(self.inner.read().await.sessions.get(session_id).cloned())
    }

    async fn append_message(
        &self,
        session_id: &SessionId,
        message: NewMessage,
    ) -> CoreResult<MessageId> {
        let mut inner = self.inner.write().await;
        if !inner.sessions.contains_key(session_id) {
            return Err(CoreError::SessionNotFound(session_id.clone()));
        }
        let existing = inner.messages.entry(session_id.clone()).or_default();
        if alternation_violated(existing, &message) {
            return Err(CoreError::Invariant(format!(
                "message role alternation violated in session {session_id}"
            )));
        }
        let id = MessageId::new(self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1);
        existing.push(ConversationMessage {
            id,
            session_id: session_id.clone(),
            role: message.role,
            text: message.text,
            intent: message.intent,
            intent_confidence: message.intent_confidence,
            agent_trace: message.agent_trace,
            retrieval_provenance: message.retrieval_provenance,
            grounding_score: message.grounding_score,
            latency_ms: message.latency_ms,
            created_at: message.created_at,
        });
        Ok(id)
    }

    async fn load_workflow(&self, session_id: &SessionId) -> CoreResult<Option<WorkflowState>> {
        let inner = self.inner.read().await;
        let session = inner
            .sessions
            .get(session_id)
            .ok_or_else(|| CoreError::SessionNotFound(session_id.clone()))?;
        Ok(session.active_workflow.clone())
    }

    async fn save_workflow(
        &self,
        session_id: &SessionId,
        workflow: Option<WorkflowState>,
    ) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| CoreError::SessionNotFound(session_id.clone()))?;
        session.active_workflow = workflow;
        Ok(())
    }

    async fn history(
        &self,
        session_id: &SessionId,
        page: Page,
    ) -> CoreResult<Vec<ConversationMessage>> {
        let inner = self.inner.read().await;
        let mut messages = inner
            .messages
            .get(session_id)
            .ok_or_else(|| CoreError::SessionNotFound(session_id.clone()))?
            .clone();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn list_for_user(
        &self,
        user_ref: UserId,
        page: Page,
    ) -> CoreResult<Vec<SessionSummary>> {
        let inner = self.inner.read().await;
        let mut summaries: Vec<SessionSummary> = inner
            .sessions
            .values()
            .filter(|s| s.user_ref == user_ref)
            .filter_map(|s| {
                let messages = inner.messages.get(&s.session_id)?;
                let first_at = messages.iter().map(|m| m.created_at).min()?;
                let last_at = messages.iter().map(|m| m.created_at).max()?;
                Some(SessionSummary {
                    session_id: s.session_id.clone(),
                    first_at,
                    last_at,
                    message_count: messages.len() as u64,
                })
            })
            .collect();
        summaries.sort_by(|a, b| b.last_at.cmp(&a.last_at));
        Ok(summaries
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn touch(&self, session_id: &SessionId, at: DateTime<Utc>) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| CoreError::SessionNotFound(session_id.clone()))?;
        session.last_activity_at = at;
        Ok(())
    }

    async fn close(&self, session_id: &SessionId) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| CoreError::SessionNotFound(session_id.clone()))?;
        session.status = SessionStatus::Closed;
        Ok(())
    }

    async fn find_idle(
        &self,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> CoreResult<Vec<SessionId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .values()
            .filter(|s| s.is_open() && s.is_idle_expired(now, timeout))
            .map(|s| s.session_id.clone())
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Tests can use expect
mod tests {
    use super::*;
    use convergeai_core::types::session::Channel;

    fn session(id: &SessionId, now: DateTime<Utc>) -> Session {
        Session {
            session_id: id.clone(),
            user_ref: UserId::new(1),
            channel: Channel::Web,
            status: SessionStatus::Open,
            active_workflow: None,
            created_at: now,
            last_activity_at: now,
        }
    }

    #[tokio::test]
    async fn test_append_enforces_role_alternation() {
        let repo = InMemorySessionRepo::new();
        let id = SessionId::generate();
        let now = Utc::now();
        repo.create(session(&id, now)).await.expect("create");

        repo.append_message(&id, NewMessage::new(Role::User, "hi", now))
            .await
            .expect("first user message");
        let err = repo
            .append_message(&id, NewMessage::new(Role::User, "hi again", now))
            .await
            .expect_err("second consecutive user message");
        assert!(matches!(err, CoreError::Invariant(_)));

        // System messages may appear anywhere.
        repo.append_message(&id, NewMessage::new(Role::System, "note", now))
            .await
            .expect("system message");
        repo.append_message(&id, NewMessage::new(Role::Assistant, "hello!", now))
            .await
            .expect("assistant reply");
    }

    #[tokio::test]
    async fn test_append_missing_session() {
        let repo = InMemorySessionRepo::new();
        let err = repo
            .append_message(
                &SessionId::generate(),
                NewMessage::new(Role::User, "hi", Utc::now()),
            )
            .await
            .expect_err("missing session");
        assert!(matches!(err, CoreError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_workflow_round_trip_is_identity() {
        let repo = InMemorySessionRepo::new();
        let id = SessionId::generate();
        repo.create(session(&id, Utc::now())).await.expect("create");

        let state = WorkflowState::BookingDraft(
            convergeai_core::types::workflow::BookingDraft::default(),
        );
        repo.save_workflow(&id, Some(state.clone())).await.expect("save");
        let loaded = repo.load_workflow(&id).await.expect("load");
        assert_eq!(loaded, Some(state));

        repo.save_workflow(&id, None).await.expect("clear");
        assert_eq!(repo.load_workflow(&id).await.expect("load"), None);
    }
}
