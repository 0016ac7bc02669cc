//! PostgreSQL audit log.
//!
//! Schema:
//!
//! ```sql
//! CREATE TABLE ops_audit_log (
//!     id            BIGSERIAL PRIMARY KEY,
//!     staff_ref     BIGINT,
//!     action        TEXT NOT NULL,
//!     resource_kind TEXT NOT NULL,
//!     resource_id   TEXT NOT NULL,
//!     pii_accessed  BOOLEAN NOT NULL,
//!     at            TIMESTAMPTZ NOT NULL
//! );
//! CREATE INDEX idx_audit_at ON ops_audit_log(at DESC);
//! ```

use crate::helpers::{db_err, enum_from_str, enum_to_str, from_db_u64, to_db_u64};
use async_trait::async_trait;
use convergeai_core::error::CoreResult;
use convergeai_core::repo::AuditRepo;
use convergeai_core::types::alert::ResourceRef;
use convergeai_core::types::audit::AuditEntry;
use convergeai_core::types::ids::StaffId;
use sqlx::{PgPool, Row};

/// `PgPool`-backed append-only audit log
#[derive(Clone)]
pub struct PostgresAuditRepo {
    pool: PgPool,
}

impl PostgresAuditRepo {
    /// Create the repository over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepo for PostgresAuditRepo {
    async fn record(&self, entry: AuditEntry) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO ops_audit_log \
             (staff_ref, action, resource_kind, resource_id, pii_accessed, at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.staff_ref.map(|s| to_db_u64(s.value())).transpose()?)
        .bind(&entry.action)
        .bind(enum_to_str(&entry.resource.kind)?)
        .bind(&entry.resource.id)
        .bind(entry.pii_accessed)
        .bind(entry.at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> CoreResult<Vec<AuditEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM ops_audit_log ORDER BY at DESC, id DESC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter()
            .map(|row| {
                let staff: Option<i64> = row.try_get("staff_ref").map_err(db_err)?;
                Ok(AuditEntry {
                    staff_ref: staff.map(from_db_u64).transpose()?.map(StaffId::new),
                    action: row.try_get("action").map_err(db_err)?,
                    resource: ResourceRef {
                        kind: enum_from_str(
                            &row.try_get::<String, _>("resource_kind").map_err(db_err)?,
                        )?,
                        id: row.try_get("resource_id").map_err(db_err)?,
                    },
                    pii_accessed: row.try_get("pii_accessed").map_err(db_err)?,
                    at: row.try_get("at").map_err(db_err)?,
                })
            })
            .collect()
    }
}
