//! # ConvergeAI Agents
//!
//! Specialist agents, the typed dispatch table and the slot-filling
//! workflow engine.
//!
//! Every specialist implements the uniform [`Agent`] contract and returns
//! an [`AgentOutcome`]; failures travel inside the outcome as an error
//! kind rather than propagating past the coordinator. All state
//! transitions, validation and commits are deterministic code - the LLM
//! only produces prose inside the policy agent.

pub mod booking_agent;
pub mod cancellation_agent;
pub mod complaint_agent;
pub mod dispatch;
pub mod outcome;
pub mod policy_agent;
pub mod service_agent;
pub mod workflow;

pub use booking_agent::BookingAgent;
pub use cancellation_agent::CancellationAgent;
pub use complaint_agent::ComplaintAgent;
pub use dispatch::{route, AgentKind, AgentSet};
pub use outcome::{Agent, AgentContext, AgentOutcome};
pub use policy_agent::{PolicyAgent, REFUSAL_REPLY};
pub use service_agent::ServiceDiscoveryAgent;
pub use workflow::{WorkflowDeps, WorkflowEngine};
