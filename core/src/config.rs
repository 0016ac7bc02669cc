//! Runtime configuration and policy lookup tables.
//!
//! Two layers with different lifecycles:
//!
//! - [`RuntimeConfig`]: process-scoped knobs, loaded at startup and
//!   refreshed by the runtime's 60-second poller. Shared as
//!   `Arc<RwLock<RuntimeConfig>>`.
//! - [`PolicyTables`]: business policy (refund schedule, SLA deadlines,
//!   alert rules), config-loaded and never mutable from the user path.

use crate::types::complaint::ComplaintPriority;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Configuration load/validation error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held an unparseable value
    #[error("failed to parse {var}: {value}")]
    Parse {
        /// Variable name
        var: String,
        /// Offending value
        value: String,
    },
    /// Validation rejected the configuration
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Hot-reloadable process configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Hours before an SLA deadline at which an at-risk alert fires
    pub sla_buffer_hours: i64,
    /// Idle minutes after which a session is closed
    pub session_idle_timeout_minutes: i64,
    /// Default retrieval depth
    pub retrieval_top_k: u16,
    /// Grounding score below which the policy agent refuses
    pub grounding_refusal_threshold: f32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sla_buffer_hours: 1,
            session_idle_timeout_minutes: 30,
            retrieval_top_k: 7,
            grounding_refusal_threshold: 0.60,
        }
    }
}

impl RuntimeConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// Reads `SLA_BUFFER_HOURS`, `SESSION_IDLE_TIMEOUT_MINUTES`,
    /// `RETRIEVAL_TOP_K` and `GROUNDING_REFUSAL_THRESHOLD`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for unparseable values and
    /// [`ConfigError::Validation`] if the result fails [`Self::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = read_env("SLA_BUFFER_HOURS")? {
            config.sla_buffer_hours = v;
        }
        if let Some(v) = read_env("SESSION_IDLE_TIMEOUT_MINUTES")? {
            config.session_idle_timeout_minutes = v;
        }
        if let Some(v) = read_env("RETRIEVAL_TOP_K")? {
            config.retrieval_top_k = v;
        }
        if let Some(v) = read_env("GROUNDING_REFUSAL_THRESHOLD")? {
            config.grounding_refusal_threshold = v;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when a knob is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sla_buffer_hours < 0 {
            return Err(ConfigError::Validation(
                "sla_buffer_hours must be >= 0".to_string(),
            ));
        }
        if self.session_idle_timeout_minutes <= 0 {
            return Err(ConfigError::Validation(
                "session_idle_timeout_minutes must be > 0".to_string(),
            ));
        }
        if self.retrieval_top_k == 0 {
            return Err(ConfigError::Validation(
                "retrieval_top_k must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.grounding_refusal_threshold) {
            return Err(ConfigError::Validation(
                "grounding_refusal_threshold must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    /// Session idle timeout as a duration.
    #[must_use]
    pub fn session_idle_timeout(&self) -> Duration {
        Duration::minutes(self.session_idle_timeout_minutes)
    }

    /// SLA buffer as a duration.
    #[must_use]
    pub fn sla_buffer(&self) -> Duration {
        Duration::hours(self.sla_buffer_hours)
    }
}

fn read_env<T: std::str::FromStr>(var: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map(Some).map_err(|_| ConfigError::Parse {
            var: var.to_string(),
            value: raw,
        }),
        Err(_) => Ok(None),
    }
}

/// Shared handle to the hot-reloadable configuration
pub type SharedConfig = Arc<RwLock<RuntimeConfig>>;

/// Wrap a configuration for sharing.
#[must_use]
pub fn shared(config: RuntimeConfig) -> SharedConfig {
    Arc::new(RwLock::new(config))
}

/// Per-call deadlines for external collaborators
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadlines {
    /// Embedding call deadline in milliseconds
    pub embed_ms: u64,
    /// Vector store query deadline in milliseconds
    pub vector_query_ms: u64,
    /// LLM generate deadline in milliseconds
    pub llm_ms: u64,
    /// Database query deadline in milliseconds
    pub db_ms: u64,
    /// Overall per-turn budget in milliseconds
    pub turn_budget_ms: u64,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            embed_ms: 2_000,
            vector_query_ms: 3_000,
            llm_ms: 20_000,
            db_ms: 3_000,
            turn_budget_ms: 30_000,
        }
    }
}

/// Cancellation refund schedule keyed on hours before the scheduled time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundSchedule {
    /// Hours before service at or above which the refund is full
    pub full_refund_hours: i64,
    /// Hours before service at or above which the refund is half
    pub half_refund_hours: i64,
}

impl Default for RefundSchedule {
    fn default() -> Self {
        Self { full_refund_hours: 4, half_refund_hours: 2 }
    }
}

impl RefundSchedule {
    /// Refund percentage for a cancellation `hours_before` the service.
    ///
    /// Negative values (service already started) refund nothing.
    #[must_use]
    pub const fn refund_percent(&self, hours_before: i64) -> u8 {
        if hours_before >= self.full_refund_hours {
            100
        } else if hours_before >= self.half_refund_hours {
            50
        } else {
            0
        }
    }
}

/// SLA deadline table per complaint priority, in hours
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlaPolicy {
    /// First-response deadline hours per priority
    pub response_hours: HashMap<ComplaintPriority, i64>,
    /// Resolution deadline hours per priority
    pub resolution_hours: HashMap<ComplaintPriority, i64>,
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self {
            response_hours: HashMap::from([
                (ComplaintPriority::Critical, 1),
                (ComplaintPriority::High, 4),
                (ComplaintPriority::Medium, 12),
                (ComplaintPriority::Low, 24),
            ]),
            resolution_hours: HashMap::from([
                (ComplaintPriority::Critical, 8),
                (ComplaintPriority::High, 24),
                (ComplaintPriority::Medium, 72),
                (ComplaintPriority::Low, 168),
            ]),
        }
    }
}

impl SlaPolicy {
    /// Absolute `(response_due, resolution_due)` deadlines from `created_at`.
    ///
    /// Returns `None` when the table has no row for the priority; callers
    /// surface that as an `SlaPolicyMissing` business-rule error.
    #[must_use]
    pub fn deadlines(
        &self,
        priority: ComplaintPriority,
        created_at: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let response = *self.response_hours.get(&priority)?;
        let resolution = *self.resolution_hours.get(&priority)?;
        Some((
            created_at + Duration::hours(response),
            created_at + Duration::hours(resolution),
        ))
    }
}

/// Alert engine rules
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRules {
    /// SLA scanner interval in seconds
    pub sla_scan_interval_secs: u64,
    /// Critical-complaint scanner interval in seconds
    pub critical_scan_interval_secs: u64,
    /// Dedup window in hours for `(kind, resource)` pairs
    pub dedup_window_hours: i64,
    /// Hours after creation at which alerts auto-expire
    pub alert_expiry_hours: i64,
}

impl Default for AlertRules {
    fn default() -> Self {
        Self {
            sla_scan_interval_secs: 300,
            critical_scan_interval_secs: 600,
            dedup_window_hours: 24,
            alert_expiry_hours: 72,
        }
    }
}

impl AlertRules {
    /// Dedup window as a duration.
    #[must_use]
    pub fn dedup_window(&self) -> Duration {
        Duration::hours(self.dedup_window_hours)
    }
}

/// All config-loaded business policy, immutable from the user path
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyTables {
    /// Cancellation refund schedule
    pub refund: RefundSchedule,
    /// SLA deadline table
    pub sla: SlaPolicy,
    /// Alert engine rules
    pub alerts: AlertRules,
}

/// Start of the serviceable business day.
#[must_use]
pub fn business_open() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default()
}

/// End of the serviceable business day; scheduled windows clamp here.
#[must_use]
pub fn business_close() -> NaiveTime {
    NaiveTime::from_hms_opt(20, 0, 0).unwrap_or_default()
}

/// Whether a preferred time falls within business hours (inclusive).
#[must_use]
pub fn within_business_hours(time: NaiveTime) -> bool {
    time >= business_open() && time <= business_close()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sla_buffer_hours, 1);
        assert_eq!(config.session_idle_timeout_minutes, 30);
        assert_eq!(config.retrieval_top_k, 7);
        assert!((config.grounding_refusal_threshold - 0.60).abs() < f32::EPSILON);
    }

    #[test]
    fn test_validation_rejects_bad_threshold() {
        let config = RuntimeConfig {
            grounding_refusal_threshold: 1.5,
            ..RuntimeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_refund_schedule_boundaries() {
        let schedule = RefundSchedule::default();
        assert_eq!(schedule.refund_percent(5), 100);
        assert_eq!(schedule.refund_percent(4), 100);
        assert_eq!(schedule.refund_percent(3), 50);
        assert_eq!(schedule.refund_percent(2), 50);
        assert_eq!(schedule.refund_percent(1), 0);
        assert_eq!(schedule.refund_percent(0), 0);
        assert_eq!(schedule.refund_percent(-3), 0);
    }

    #[test]
    fn test_sla_deadlines_from_table() {
        let policy = SlaPolicy::default();
        let now = Utc::now();
        let (response, resolution) = policy
            .deadlines(ComplaintPriority::High, now)
            .unwrap_or((now, now));
        assert_eq!(response, now + Duration::hours(4));
        assert_eq!(resolution, now + Duration::hours(24));
    }

    #[test]
    fn test_missing_sla_row_is_none() {
        let policy = SlaPolicy {
            response_hours: HashMap::new(),
            resolution_hours: HashMap::new(),
        };
        assert!(policy.deadlines(ComplaintPriority::Low, Utc::now()).is_none());
    }

    #[test]
    fn test_business_hours_boundaries() {
        let seven_59 = NaiveTime::from_hms_opt(7, 59, 0).unwrap_or_default();
        let eight = NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default();
        let twenty = NaiveTime::from_hms_opt(20, 0, 0).unwrap_or_default();
        let twenty_01 = NaiveTime::from_hms_opt(20, 1, 0).unwrap_or_default();
        assert!(!within_business_hours(seven_59));
        assert!(within_business_hours(eight));
        assert!(within_business_hours(twenty));
        assert!(!within_business_hours(twenty_01));
    }
}
