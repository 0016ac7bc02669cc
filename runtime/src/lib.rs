//! # ConvergeAI Runtime
//!
//! The turn pipeline and process-level plumbing: the session store with
//! per-session serialization, the coordinator (classify → route → execute
//! → persist), the narrow one-retry resilience layer, the TTL catalog
//! cache and the configuration hot-reload poller.
//!
//! Wiring happens at the edge: construct the repositories (postgres in
//! production, in-memory in tests), the workflow engine and the agent
//! set, then hand everything to [`Coordinator::new`].

pub mod catalog_cache;
pub mod config_reload;
pub mod coordinator;
pub mod replies;
pub mod retry;
pub mod session_store;

pub use catalog_cache::CachedCatalogRepo;
pub use config_reload::{spawn_config_poller, DEFAULT_POLL};
pub use coordinator::{Coordinator, TurnRequest, TurnResponse};
pub use retry::{retry_agent_outcome, retry_once};
pub use session_store::SessionStore;
