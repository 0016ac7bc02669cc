//! Sessions and conversation messages.
//!
//! A session owns its conversation log and at most one active workflow.
//! Messages are append-only and ordered by `created_at` within the session;
//! after the first user message, user/assistant roles strictly alternate
//! (injected system prompts may appear anywhere).

use super::ids::{MessageId, SessionId, UserId};
use super::workflow::WorkflowState;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Channel a session was opened on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Web chat widget
    Web,
    /// Mobile application
    Mobile,
    /// `WhatsApp` business channel
    Whatsapp,
    /// Voice gateway
    Voice,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Web => write!(f, "web"),
            Self::Mobile => write!(f, "mobile"),
            Self::Whatsapp => write!(f, "whatsapp"),
            Self::Voice => write!(f, "voice"),
        }
    }
}

/// Session lifecycle status. Sessions are closed, never deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Accepting turns
    Open,
    /// Closed by idle expiry or explicitly; a new turn mints a fresh session
    Closed,
}

/// A conversation session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session id
    pub session_id: SessionId,
    /// Owning user
    pub user_ref: UserId,
    /// Channel the session was opened on
    pub channel: Channel,
    /// Lifecycle status
    pub status: SessionStatus,
    /// Active multi-turn workflow, at most one
    pub active_workflow: Option<WorkflowState>,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Last turn activity
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has been idle longer than `timeout`.
    #[must_use]
    pub fn is_idle_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.last_activity_at > timeout
    }

    /// Whether the session can accept a turn.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }
}

/// Author of a conversation message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user
    User,
    /// Assistant reply
    Assistant,
    /// Injected system prompt
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

/// A retrieved chunk reference attached to an assistant message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievalProvenance {
    /// Chunk id in the external vector store
    pub doc_id: String,
    /// Normalized relevance score
    pub score: f32,
}

/// A persisted conversation message
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Message id
    pub id: MessageId,
    /// Owning session
    pub session_id: SessionId,
    /// Author role
    pub role: Role,
    /// Message text
    pub text: String,
    /// Classified intent, user messages only
    pub intent: Option<String>,
    /// Classifier confidence in [0, 1]
    pub intent_confidence: Option<f32>,
    /// Agents that touched this turn, in execution order
    pub agent_trace: Vec<String>,
    /// Retrieved chunks the reply was grounded on, in relevance order
    pub retrieval_provenance: Vec<RetrievalProvenance>,
    /// Grounding score of the reply, when retrieval was used
    pub grounding_score: Option<f32>,
    /// Turn latency in milliseconds
    pub latency_ms: u32,
    /// Append timestamp; ordering key within the session
    pub created_at: DateTime<Utc>,
}

/// A message awaiting append; ids are assigned by the session repository.
#[derive(Clone, Debug)]
pub struct NewMessage {
    /// Author role
    pub role: Role,
    /// Message text
    pub text: String,
    /// Classified intent, user messages only
    pub intent: Option<String>,
    /// Classifier confidence in [0, 1]
    pub intent_confidence: Option<f32>,
    /// Agents that touched this turn
    pub agent_trace: Vec<String>,
    /// Retrieved chunks the reply was grounded on
    pub retrieval_provenance: Vec<RetrievalProvenance>,
    /// Grounding score of the reply
    pub grounding_score: Option<f32>,
    /// Turn latency in milliseconds
    pub latency_ms: u32,
    /// Append timestamp supplied by the caller's clock
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    /// A bare message with the given role and text.
    #[must_use]
    pub fn new(role: Role, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            role,
            text: text.into(),
            intent: None,
            intent_confidence: None,
            agent_trace: Vec::new(),
            retrieval_provenance: Vec::new(),
            grounding_score: None,
            latency_ms: 0,
            created_at,
        }
    }
}

/// Per-session summary row for listing a user's sessions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session id
    pub session_id: SessionId,
    /// First message timestamp
    pub first_at: DateTime<Utc>,
    /// Most recent message timestamp
    pub last_at: DateTime<Utc>,
    /// Number of messages in the session
    pub message_count: u64,
}
