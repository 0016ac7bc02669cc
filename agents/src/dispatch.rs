//! Typed dispatch table.
//!
//! Routing is a compile-time `Intent → AgentKind` match, not a dynamic
//! lookup: adding an intent without a route is a compile error.

use crate::outcome::{Agent, AgentContext, AgentOutcome};
use convergeai_nlu::Intent;
use std::sync::Arc;
use tracing::instrument;

/// The specialist responsible for an intent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentKind {
    /// Canned replies handled inside the coordinator
    Coordinator,
    /// Booking agent (also the read-only status branch)
    Booking,
    /// Cancellation agent
    Cancellation,
    /// Complaint agent
    Complaint,
    /// Service discovery agent
    ServiceDiscovery,
    /// Policy agent
    Policy,
}

/// Dispatch table mapping intent to specialist.
#[must_use]
pub const fn route(intent: Intent) -> AgentKind {
    match intent {
        Intent::Greeting | Intent::Other => AgentKind::Coordinator,
        Intent::Booking | Intent::Reschedule | Intent::StatusInquiry => AgentKind::Booking,
        Intent::Cancellation => AgentKind::Cancellation,
        Intent::Complaint => AgentKind::Complaint,
        Intent::ServiceInquiry | Intent::PriceInquiry => AgentKind::ServiceDiscovery,
        Intent::PolicyInquiry => AgentKind::Policy,
    }
}

/// The wired set of specialists
#[derive(Clone)]
pub struct AgentSet {
    /// Booking agent
    pub booking: Arc<dyn Agent>,
    /// Cancellation agent
    pub cancellation: Arc<dyn Agent>,
    /// Complaint agent
    pub complaint: Arc<dyn Agent>,
    /// Service discovery agent
    pub service_discovery: Arc<dyn Agent>,
    /// Policy agent
    pub policy: Arc<dyn Agent>,
}

impl AgentSet {
    /// The specialist mapped to an intent.
    ///
    /// Returns `None` for intents the coordinator answers itself
    /// (`greeting`, `other`).
    #[must_use]
    pub fn agent_for(&self, intent: Intent) -> Option<Arc<dyn Agent>> {
        let agent = match route(intent) {
            AgentKind::Coordinator => return None,
            AgentKind::Booking => &self.booking,
            AgentKind::Cancellation => &self.cancellation,
            AgentKind::Complaint => &self.complaint,
            AgentKind::ServiceDiscovery => &self.service_discovery,
            AgentKind::Policy => &self.policy,
        };
        Some(Arc::clone(agent))
    }

    /// Execute the specialist mapped to the context's intent.
    #[instrument(skip_all, fields(intent = %ctx.intent))]
    pub async fn dispatch(&self, ctx: &AgentContext) -> Option<(&'static str, AgentOutcome)> {
        let agent = self.agent_for(ctx.intent)?;
        Some((agent.name(), agent.execute(ctx).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_table() {
        assert_eq!(route(Intent::Greeting), AgentKind::Coordinator);
        assert_eq!(route(Intent::Other), AgentKind::Coordinator);
        assert_eq!(route(Intent::Booking), AgentKind::Booking);
        assert_eq!(route(Intent::Reschedule), AgentKind::Booking);
        assert_eq!(route(Intent::StatusInquiry), AgentKind::Booking);
        assert_eq!(route(Intent::Cancellation), AgentKind::Cancellation);
        assert_eq!(route(Intent::Complaint), AgentKind::Complaint);
        assert_eq!(route(Intent::ServiceInquiry), AgentKind::ServiceDiscovery);
        assert_eq!(route(Intent::PriceInquiry), AgentKind::ServiceDiscovery);
        assert_eq!(route(Intent::PolicyInquiry), AgentKind::Policy);
    }
}
