//! # ConvergeAI Ops
//!
//! The operations back-office core: a query-time priority queue projection
//! over live complaint and booking rows, and the alert engine with its SLA
//! and critical-complaint scanners, dedup rule, expiry-aware listing API
//! and append-only audit trail.

pub mod alerts;
pub mod priority;
pub mod scheduler;

pub use alerts::{AlertEngine, ScanReport};
pub use priority::{PriorityQueueItem, PriorityQueueProjector, QueueItemKind};
pub use scheduler::{spawn_scanners, ScannerHandles};
