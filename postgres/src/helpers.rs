//! Shared row-mapping helpers.
//!
//! Queries are runtime-bound (`sqlx::query`) rather than compile-time
//! checked, so every crate in the workspace builds without a live
//! `DATABASE_URL`. Enum columns are TEXT holding the serde names, mapped
//! through `serde_json` so the wire names stay in one place.

use convergeai_core::error::CoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Map any sqlx failure to the transient database error kind.
pub(crate) fn db_err(err: sqlx::Error) -> CoreError {
    CoreError::DatabaseTransient(err.to_string())
}

/// Serialize an enum to its stored TEXT name.
pub(crate) fn enum_to_str<T: Serialize>(value: &T) -> Result<String, CoreError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => Ok(s),
        Ok(other) => Err(CoreError::Invariant(format!(
            "enum serialized to non-string value {other}"
        ))),
        Err(err) => Err(CoreError::Invariant(format!("enum serialization failed: {err}"))),
    }
}

/// Parse a stored TEXT name back into its enum.
pub(crate) fn enum_from_str<T: DeserializeOwned>(raw: &str) -> Result<T, CoreError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|err| CoreError::Invariant(format!("unknown enum value {raw:?}: {err}")))
}

/// u64 ids and amounts are stored as BIGINT.
pub(crate) fn to_db_u64(value: u64) -> Result<i64, CoreError> {
    i64::try_from(value)
        .map_err(|_| CoreError::Invariant(format!("value {value} exceeds BIGINT range")))
}

/// BIGINT back to u64; negative values indicate a corrupted row.
pub(crate) fn from_db_u64(value: i64) -> Result<u64, CoreError> {
    u64::try_from(value)
        .map_err(|_| CoreError::Invariant(format!("negative stored value {value}")))
}

/// Deserialize a JSONB column.
pub(crate) fn from_json<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, CoreError> {
    serde_json::from_value(value)
        .map_err(|err| CoreError::Invariant(format!("corrupted JSON column: {err}")))
}

/// Serialize into a JSONB column.
pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, CoreError> {
    serde_json::to_value(value)
        .map_err(|err| CoreError::Invariant(format!("JSON column serialization failed: {err}")))
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Tests can use expect
mod tests {
    use super::*;
    use convergeai_core::types::booking::BookingStatus;
    use convergeai_core::types::complaint::ComplaintPriority;

    #[test]
    fn test_enum_round_trip() {
        let stored = enum_to_str(&BookingStatus::InProgress).expect("to_str");
        assert_eq!(stored, "in_progress");
        let back: BookingStatus = enum_from_str(&stored).expect("from_str");
        assert_eq!(back, BookingStatus::InProgress);

        let stored = enum_to_str(&ComplaintPriority::Critical).expect("to_str");
        assert_eq!(stored, "critical");
    }

    #[test]
    fn test_unknown_enum_value_is_invariant() {
        let result: Result<BookingStatus, _> = enum_from_str("exploded");
        assert!(matches!(result, Err(CoreError::Invariant(_))));
    }

    #[test]
    fn test_bigint_bounds() {
        assert!(to_db_u64(u64::MAX).is_err());
        assert_eq!(from_db_u64(42).expect("non-negative"), 42);
        assert!(from_db_u64(-1).is_err());
    }
}
