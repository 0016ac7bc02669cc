//! PostgreSQL alert repository.
//!
//! Schema:
//!
//! ```sql
//! CREATE TABLE alerts (
//!     id            BIGSERIAL PRIMARY KEY,
//!     kind          TEXT NOT NULL,
//!     severity      TEXT NOT NULL,
//!     title         TEXT NOT NULL,
//!     message       TEXT NOT NULL,
//!     resource_kind TEXT NOT NULL,
//!     resource_id   TEXT NOT NULL,
//!     staff_ref     BIGINT,
//!     is_read       BOOLEAN NOT NULL DEFAULT FALSE,
//!     is_dismissed  BOOLEAN NOT NULL DEFAULT FALSE,
//!     metadata      JSONB NOT NULL,
//!     created_at    TIMESTAMPTZ NOT NULL,
//!     read_at       TIMESTAMPTZ,
//!     dismissed_at  TIMESTAMPTZ,
//!     expires_at    TIMESTAMPTZ
//! );
//! CREATE INDEX idx_alerts_dedup ON alerts(kind, resource_kind, resource_id, created_at DESC);
//! CREATE INDEX idx_alerts_staff ON alerts(staff_ref, created_at DESC);
//! ```

use crate::helpers::{db_err, enum_from_str, enum_to_str, from_db_u64, from_json, to_db_u64, to_json};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use convergeai_core::error::{CoreError, CoreResult};
use convergeai_core::repo::{AlertRepo, Page};
use convergeai_core::types::alert::{
    Alert, AlertFilter, AlertKind, NewAlert, ResourceRef,
};
use convergeai_core::types::ids::{AlertId, StaffId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// `PgPool`-backed alert repository
#[derive(Clone)]
pub struct PostgresAlertRepo {
    pool: PgPool,
}

impl PostgresAlertRepo {
    /// Create the repository over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_alert(row: &PgRow) -> CoreResult<Alert> {
    let staff: Option<i64> = row.try_get("staff_ref").map_err(db_err)?;
    Ok(Alert {
        id: AlertId::new(from_db_u64(row.try_get("id").map_err(db_err)?)?),
        kind: enum_from_str(&row.try_get::<String, _>("kind").map_err(db_err)?)?,
        severity: enum_from_str(&row.try_get::<String, _>("severity").map_err(db_err)?)?,
        title: row.try_get("title").map_err(db_err)?,
        message: row.try_get("message").map_err(db_err)?,
        resource: ResourceRef {
            kind: enum_from_str(&row.try_get::<String, _>("resource_kind").map_err(db_err)?)?,
            id: row.try_get("resource_id").map_err(db_err)?,
        },
        staff_ref: staff.map(from_db_u64).transpose()?.map(StaffId::new),
        is_read: row.try_get("is_read").map_err(db_err)?,
        is_dismissed: row.try_get("is_dismissed").map_err(db_err)?,
        metadata: from_json(row.try_get("metadata").map_err(db_err)?)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        read_at: row.try_get("read_at").map_err(db_err)?,
        dismissed_at: row.try_get("dismissed_at").map_err(db_err)?,
        expires_at: row.try_get("expires_at").map_err(db_err)?,
    })
}

#[async_trait]
impl AlertRepo for PostgresAlertRepo {
    async fn insert(&self, alert: NewAlert) -> CoreResult<Alert> {
        let row = sqlx::query(
            "INSERT INTO alerts \
             (kind, severity, title, message, resource_kind, resource_id, staff_ref, \
              metadata, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
        )
        .bind(enum_to_str(&alert.kind)?)
        .bind(enum_to_str(&alert.severity)?)
        .bind(&alert.title)
        .bind(&alert.message)
        .bind(enum_to_str(&alert.resource.kind)?)
        .bind(&alert.resource.id)
        .bind(alert.staff_ref.map(|s| to_db_u64(s.value())).transpose()?)
        .bind(to_json(&alert.metadata)?)
        .bind(alert.created_at)
        .bind(alert.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        map_alert(&row)
    }

    async fn find_recent(
        &self,
        kind: AlertKind,
        resource: &ResourceRef,
        since: DateTime<Utc>,
    ) -> CoreResult<Option<Alert>> {
        let row = sqlx::query(
            "SELECT * FROM alerts \
             WHERE kind = $1 AND resource_kind = $2 AND resource_id = $3 AND created_at >= $4 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(enum_to_str(&kind)?)
        .bind(enum_to_str(&resource.kind)?)
        .bind(&resource.id)
        .bind(since)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_alert).transpose()
    }

    async fn list(
        &self,
        filter: AlertFilter,
        page: Page,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<Alert>> {
        let staff = filter.staff.map(|s| to_db_u64(s.value())).transpose()?;
        let kind = filter.kind.map(|k| enum_to_str(&k)).transpose()?;
        let severity = filter.severity.map(|s| enum_to_str(&s)).transpose()?;
        let rows = sqlx::query(
            "SELECT * FROM alerts \
             WHERE (expires_at IS NULL OR expires_at > $1) \
               AND ($2::BIGINT IS NULL OR staff_ref IS NULL OR staff_ref = $2) \
               AND ($3::TEXT IS NULL OR kind = $3) \
               AND ($4::TEXT IS NULL OR severity = $4) \
               AND (NOT $5 OR NOT is_read) \
               AND ($6 OR NOT is_dismissed) \
             ORDER BY created_at DESC, id DESC LIMIT $7 OFFSET $8",
        )
        .bind(now)
        .bind(staff)
        .bind(kind)
        .bind(severity)
        .bind(filter.unread_only)
        .bind(filter.include_dismissed)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_alert).collect()
    }

    async fn mark_read(
        &self,
        id: AlertId,
        _staff: StaffId,
        at: DateTime<Utc>,
    ) -> CoreResult<Alert> {
        let row = sqlx::query(
            "UPDATE alerts SET is_read = TRUE, read_at = $2 WHERE id = $1 RETURNING *",
        )
        .bind(to_db_u64(id.value())?)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        let Some(row) = row else { return Err(CoreError::AlertNotFound(id)) };
        map_alert(&row)
    }

    async fn dismiss(
        &self,
        id: AlertId,
        _staff: StaffId,
        at: DateTime<Utc>,
    ) -> CoreResult<Alert> {
        let row = sqlx::query(
            "UPDATE alerts SET is_dismissed = TRUE, dismissed_at = $2 WHERE id = $1 RETURNING *",
        )
        .bind(to_db_u64(id.value())?)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        let Some(row) = row else { return Err(CoreError::AlertNotFound(id)) };
        map_alert(&row)
    }

    async fn unread_count(&self, staff: StaffId, now: DateTime<Utc>) -> CoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM alerts \
             WHERE (expires_at IS NULL OR expires_at > $1) \
               AND (staff_ref IS NULL OR staff_ref = $2) \
               AND NOT is_read AND NOT is_dismissed",
        )
        .bind(now)
        .bind(to_db_u64(staff.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        from_db_u64(count)
    }
}
