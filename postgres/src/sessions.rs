//! PostgreSQL session repository.
//!
//! Schema (migrations are managed externally):
//!
//! ```sql
//! CREATE TABLE sessions (
//!     session_id       TEXT PRIMARY KEY,
//!     user_ref         BIGINT NOT NULL,
//!     channel          TEXT NOT NULL,
//!     status           TEXT NOT NULL,
//!     created_at       TIMESTAMPTZ NOT NULL,
//!     last_activity_at TIMESTAMPTZ NOT NULL
//! );
//! CREATE INDEX idx_sessions_user ON sessions(user_ref, last_activity_at DESC);
//!
//! CREATE TABLE workflow_states (
//!     session_id TEXT PRIMARY KEY REFERENCES sessions(session_id),
//!     state      JSONB NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE conversation_messages (
//!     id                   BIGSERIAL PRIMARY KEY,
//!     session_id           TEXT NOT NULL REFERENCES sessions(session_id),
//!     role                 TEXT NOT NULL,
//!     text                 TEXT NOT NULL,
//!     intent               TEXT,
//!     intent_confidence    REAL,
//!     agent_trace          JSONB NOT NULL,
//!     retrieval_provenance JSONB NOT NULL,
//!     grounding_score      REAL,
//!     latency_ms           INT NOT NULL,
//!     created_at           TIMESTAMPTZ NOT NULL
//! );
//! CREATE INDEX idx_messages_session ON conversation_messages(session_id, created_at, id);
//! ```

use crate::helpers::{db_err, enum_from_str, enum_to_str, from_db_u64, from_json, to_db_u64, to_json};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use convergeai_core::error::{CoreError, CoreResult};
use convergeai_core::repo::{Page, SessionRepo};
use convergeai_core::types::ids::{MessageId, SessionId, UserId};
use convergeai_core::types::session::{
    ConversationMessage, NewMessage, Role, Session, SessionStatus, SessionSummary,
};
use convergeai_core::types::workflow::WorkflowState;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// `PgPool`-backed session repository
#[derive(Clone)]
pub struct PostgresSessionRepo {
    pool: PgPool,
}

impl PostgresSessionRepo {
    /// Create the repository over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_session(row: &PgRow, workflow: Option<WorkflowState>) -> CoreResult<Session> {
    Ok(Session {
        session_id: SessionId::parse(row.try_get::<String, _>("session_id").map_err(db_err)?)
            .map_err(|raw| CoreError::Invariant(format!("stored session id invalid: {raw}")))?,
        user_ref: UserId::new(from_db_u64(row.try_get("user_ref").map_err(db_err)?)?),
        channel: enum_from_str(&row.try_get::<String, _>("channel").map_err(db_err)?)?,
        status: enum_from_str(&row.try_get::<String, _>("status").map_err(db_err)?)?,
        active_workflow: workflow,
        created_at: row.try_get("created_at").map_err(db_err)?,
        last_activity_at: row.try_get("last_activity_at").map_err(db_err)?,
    })
}

fn map_message(row: &PgRow) -> CoreResult<ConversationMessage> {
    Ok(ConversationMessage {
        id: MessageId::new(from_db_u64(row.try_get("id").map_err(db_err)?)?),
        session_id: SessionId::parse(row.try_get::<String, _>("session_id").map_err(db_err)?)
            .map_err(|raw| CoreError::Invariant(format!("stored session id invalid: {raw}")))?,
        role: enum_from_str(&row.try_get::<String, _>("role").map_err(db_err)?)?,
        text: row.try_get("text").map_err(db_err)?,
        intent: row.try_get("intent").map_err(db_err)?,
        intent_confidence: row.try_get("intent_confidence").map_err(db_err)?,
        agent_trace: from_json(row.try_get("agent_trace").map_err(db_err)?)?,
        retrieval_provenance: from_json(row.try_get("retrieval_provenance").map_err(db_err)?)?,
        grounding_score: row.try_get("grounding_score").map_err(db_err)?,
        latency_ms: u32::try_from(row.try_get::<i32, _>("latency_ms").map_err(db_err)?)
            .unwrap_or(0),
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

#[async_trait]
impl SessionRepo for PostgresSessionRepo {
    async fn create(&self, session: Session) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO sessions \
             (session_id, user_ref, channel, status, created_at, last_activity_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(session.session_id.as_str())
        .bind(to_db_u64(session.user_ref.value())?)
        .bind(enum_to_str(&session.channel)?)
        .bind(enum_to_str(&session.status)?)
        .bind(session.created_at)
        .bind(session.last_activity_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if let Some(workflow) = &session.active_workflow {
            self.save_workflow(&session.session_id, Some(workflow.clone())).await?;
        }
        Ok(())
    }

    async fn get(&self, session_id: &SessionId) -> CoreResult<Option<Session>> {
        let row = sqlx::query("SELECT * FROM sessions WHERE session_id = $1")
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        let Some(row) = row else { return Ok(None) };
        let workflow = self.load_workflow(session_id).await?;
        Ok(Some(map_session(&row, workflow)?))
    }

    async fn append_message(
        &self,
        session_id: &SessionId,
        message: NewMessage,
    ) -> CoreResult<MessageId> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let exists = sqlx::query("SELECT 1 FROM sessions WHERE session_id = $1 FOR UPDATE")
            .bind(session_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        if exists.is_none() {
            return Err(CoreError::SessionNotFound(session_id.clone()));
        }

        if message.role != Role::System {
            let last: Option<String> = sqlx::query_scalar(
                "SELECT role FROM conversation_messages \
                 WHERE session_id = $1 AND role <> 'system' \
                 ORDER BY created_at DESC, id DESC LIMIT 1",
            )
            .bind(session_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
            let violated = match last.as_deref() {
                None => message.role != Role::User,
                Some(last) => last == enum_to_str(&message.role)?,
            };
            if violated {
                return Err(CoreError::Invariant(format!(
                    "message role alternation violated in session {session_id}"
                )));
            }
        }

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO conversation_messages \
             (session_id, role, text, intent, intent_confidence, agent_trace, \
              retrieval_provenance, grounding_score, latency_ms, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING id",
        )
        .bind(session_id.as_str())
        .bind(enum_to_str(&message.role)?)
        .bind(&message.text)
        .bind(&message.intent)
        .bind(message.intent_confidence)
        .bind(to_json(&message.agent_trace)?)
        .bind(to_json(&message.retrieval_provenance)?)
        .bind(message.grounding_score)
        .bind(i32::try_from(message.latency_ms).unwrap_or(i32::MAX))
        .bind(message.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(MessageId::new(from_db_u64(id)?))
    }

    async fn load_workflow(&self, session_id: &SessionId) -> CoreResult<Option<WorkflowState>> {
        let state: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT state FROM workflow_states WHERE session_id = $1")
                .bind(session_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        state.map(from_json).transpose()
    }

    async fn save_workflow(
        &self,
        session_id: &SessionId,
        workflow: Option<WorkflowState>,
    ) -> CoreResult<()> {
        match workflow {
            Some(state) => {
                sqlx::query(
                    "INSERT INTO workflow_states (session_id, state, updated_at) \
                     VALUES ($1, $2, now()) \
                     ON CONFLICT (session_id) DO UPDATE \
                     SET state = EXCLUDED.state, updated_at = now()",
                )
                .bind(session_id.as_str())
                .bind(to_json(&state)?)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            },
            None => {
                sqlx::query("DELETE FROM workflow_states WHERE session_id = $1")
                    .bind(session_id.as_str())
                    .execute(&self.pool)
                    .await
                    .map_err(db_err)?;
            },
        }
        Ok(())
    }

    async fn history(
        &self,
        session_id: &SessionId,
        page: Page,
    ) -> CoreResult<Vec<ConversationMessage>> {
        let rows = sqlx::query(
            "SELECT * FROM conversation_messages WHERE session_id = $1 \
             ORDER BY created_at ASC, id ASC LIMIT $2 OFFSET $3",
        )
        .bind(session_id.as_str())
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_message).collect()
    }

    async fn list_for_user(
        &self,
        user_ref: UserId,
        page: Page,
    ) -> CoreResult<Vec<SessionSummary>> {
        let rows = sqlx::query(
            "SELECT s.session_id, \
                    min(m.created_at) AS first_at, \
                    max(m.created_at) AS last_at, \
                    count(m.id) AS message_count \
             FROM sessions s \
             JOIN conversation_messages m ON m.session_id = s.session_id \
             WHERE s.user_ref = $1 \
             GROUP BY s.session_id \
             ORDER BY last_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(to_db_u64(user_ref.value())?)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter()
            .map(|row| {
                Ok(SessionSummary {
                    session_id: SessionId::parse(
                        row.try_get::<String, _>("session_id").map_err(db_err)?,
                    )
                    .map_err(|raw| {
                        CoreError::Invariant(format!("stored session id invalid: {raw}"))
                    })?,
                    first_at: row.try_get("first_at").map_err(db_err)?,
                    last_at: row.try_get("last_at").map_err(db_err)?,
                    message_count: from_db_u64(row.try_get("message_count").map_err(db_err)?)?,
                })
            })
            .collect()
    }

    async fn touch(&self, session_id: &SessionId, at: DateTime<Utc>) -> CoreResult<()> {
        let result = sqlx::query("UPDATE sessions SET last_activity_at = $2 WHERE session_id = $1")
            .bind(session_id.as_str())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::SessionNotFound(session_id.clone()));
        }
        Ok(())
    }

    async fn close(&self, session_id: &SessionId) -> CoreResult<()> {
        let result = sqlx::query("UPDATE sessions SET status = 'closed' WHERE session_id = $1")
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::SessionNotFound(session_id.clone()));
        }
        Ok(())
    }

    async fn find_idle(
        &self,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> CoreResult<Vec<SessionId>> {
        let cutoff = now - timeout;
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT session_id FROM sessions WHERE status = 'open' AND last_activity_at < $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter()
            .map(|raw| {
                SessionId::parse(raw).map_err(|raw| {
                    CoreError::Invariant(format!("stored session id invalid: {raw}"))
                })
            })
            .collect()
    }
}
