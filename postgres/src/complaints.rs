//! PostgreSQL complaint repository.
//!
//! Schema:
//!
//! ```sql
//! CREATE TABLE complaints (
//!     id                BIGSERIAL PRIMARY KEY,
//!     user_ref          BIGINT NOT NULL,
//!     booking_ref       BIGINT,
//!     session_ref       TEXT,
//!     complaint_type    TEXT NOT NULL,
//!     subject           TEXT NOT NULL,
//!     description       TEXT NOT NULL,
//!     priority          TEXT NOT NULL,
//!     status            TEXT NOT NULL,
//!     assigned_staff    BIGINT,
//!     resolution        TEXT,
//!     sentiment         REAL NOT NULL,
//!     response_due_at   TIMESTAMPTZ NOT NULL,
//!     resolution_due_at TIMESTAMPTZ NOT NULL,
//!     created_at        TIMESTAMPTZ NOT NULL
//! );
//! CREATE INDEX idx_complaints_status ON complaints(status, created_at);
//!
//! CREATE TABLE complaint_updates (
//!     id           BIGSERIAL PRIMARY KEY,
//!     complaint_id BIGINT NOT NULL REFERENCES complaints(id),
//!     actor        BIGINT,
//!     old_status   TEXT NOT NULL,
//!     new_status   TEXT NOT NULL,
//!     note         TEXT,
//!     created_at   TIMESTAMPTZ NOT NULL
//! );
//! ```

use crate::helpers::{db_err, enum_from_str, enum_to_str, from_db_u64, to_db_u64};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use convergeai_core::error::{CoreError, CoreResult};
use convergeai_core::repo::{ComplaintRepo, Page};
use convergeai_core::types::complaint::{
    Complaint, ComplaintFilter, ComplaintStatus, ComplaintUpdate, NewComplaint,
};
use convergeai_core::types::ids::{BookingId, ComplaintId, SessionId, StaffId, UserId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// `PgPool`-backed complaint repository
#[derive(Clone)]
pub struct PostgresComplaintRepo {
    pool: PgPool,
}

impl PostgresComplaintRepo {
    /// Create the repository over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_complaint(row: &PgRow) -> CoreResult<Complaint> {
    let booking: Option<i64> = row.try_get("booking_ref").map_err(db_err)?;
    let staff: Option<i64> = row.try_get("assigned_staff").map_err(db_err)?;
    let session: Option<String> = row.try_get("session_ref").map_err(db_err)?;
    Ok(Complaint {
        id: ComplaintId::new(from_db_u64(row.try_get("id").map_err(db_err)?)?),
        user_ref: UserId::new(from_db_u64(row.try_get("user_ref").map_err(db_err)?)?),
        booking_ref: booking.map(from_db_u64).transpose()?.map(BookingId::new),
        session_ref: session
            .map(|raw| {
                SessionId::parse(raw).map_err(|raw| {
                    CoreError::Invariant(format!("stored session id invalid: {raw}"))
                })
            })
            .transpose()?,
        complaint_type: enum_from_str(
            &row.try_get::<String, _>("complaint_type").map_err(db_err)?,
        )?,
        subject: row.try_get("subject").map_err(db_err)?,
        description: row.try_get("description").map_err(db_err)?,
        priority: enum_from_str(&row.try_get::<String, _>("priority").map_err(db_err)?)?,
        status: enum_from_str(&row.try_get::<String, _>("status").map_err(db_err)?)?,
        assigned_staff: staff.map(from_db_u64).transpose()?.map(StaffId::new),
        resolution: row.try_get("resolution").map_err(db_err)?,
        sentiment: row.try_get("sentiment").map_err(db_err)?,
        response_due_at: row.try_get("response_due_at").map_err(db_err)?,
        resolution_due_at: row.try_get("resolution_due_at").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn map_update(row: &PgRow) -> CoreResult<ComplaintUpdate> {
    let actor: Option<i64> = row.try_get("actor").map_err(db_err)?;
    Ok(ComplaintUpdate {
        complaint_id: ComplaintId::new(from_db_u64(row.try_get("complaint_id").map_err(db_err)?)?),
        actor: actor.map(from_db_u64).transpose()?.map(StaffId::new),
        old_status: enum_from_str(&row.try_get::<String, _>("old_status").map_err(db_err)?)?,
        new_status: enum_from_str(&row.try_get::<String, _>("new_status").map_err(db_err)?)?,
        note: row.try_get("note").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

#[async_trait]
impl ComplaintRepo for PostgresComplaintRepo {
    async fn insert(&self, complaint: NewComplaint) -> CoreResult<Complaint> {
        let row = sqlx::query(
            "INSERT INTO complaints \
             (user_ref, booking_ref, session_ref, complaint_type, subject, description, \
              priority, status, sentiment, response_due_at, resolution_due_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'open', $8, $9, $10, $11) RETURNING *",
        )
        .bind(to_db_u64(complaint.user_ref.value())?)
        .bind(complaint.booking_ref.map(|b| to_db_u64(b.value())).transpose()?)
        .bind(complaint.session_ref.as_ref().map(SessionId::as_str))
        .bind(enum_to_str(&complaint.complaint_type)?)
        .bind(&complaint.subject)
        .bind(&complaint.description)
        .bind(enum_to_str(&complaint.priority)?)
        .bind(complaint.sentiment)
        .bind(complaint.response_due_at)
        .bind(complaint.resolution_due_at)
        .bind(complaint.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        map_complaint(&row)
    }

    async fn get(&self, id: ComplaintId) -> CoreResult<Option<Complaint>> {
        let row = sqlx::query("SELECT * FROM complaints WHERE id = $1")
            .bind(to_db_u64(id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_complaint).transpose()
    }

    async fn list(&self, filter: ComplaintFilter, page: Page) -> CoreResult<Vec<Complaint>> {
        let status = filter.status.map(|s| enum_to_str(&s)).transpose()?;
        let priority = filter.priority.map(|p| enum_to_str(&p)).transpose()?;
        let rows = sqlx::query(
            "SELECT * FROM complaints \
             WHERE ($1::TEXT IS NULL OR status = $1) \
               AND ($2::TEXT IS NULL OR priority = $2) \
               AND ($3::BOOLEAN IS NULL OR (assigned_staff IS NOT NULL) = $3) \
             ORDER BY created_at ASC, id ASC LIMIT $4 OFFSET $5",
        )
        .bind(status)
        .bind(priority)
        .bind(filter.assigned)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_complaint).collect()
    }

    async fn set_status(
        &self,
        id: ComplaintId,
        status: ComplaintStatus,
        actor: Option<StaffId>,
        note: Option<String>,
        resolution: Option<String>,
        at: DateTime<Utc>,
    ) -> CoreResult<Complaint> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query("SELECT * FROM complaints WHERE id = $1 FOR UPDATE")
            .bind(to_db_u64(id.value())?)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        let Some(row) = row else { return Err(CoreError::ComplaintNotFound(id)) };
        let current = map_complaint(&row)?;

        let row = sqlx::query(
            "UPDATE complaints SET status = $2, resolution = COALESCE($3, resolution) \
             WHERE id = $1 RETURNING *",
        )
        .bind(to_db_u64(id.value())?)
        .bind(enum_to_str(&status)?)
        .bind(resolution)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        let updated = map_complaint(&row)?;

        sqlx::query(
            "INSERT INTO complaint_updates \
             (complaint_id, actor, old_status, new_status, note, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(to_db_u64(id.value())?)
        .bind(actor.map(|s| to_db_u64(s.value())).transpose()?)
        .bind(enum_to_str(&current.status)?)
        .bind(enum_to_str(&status)?)
        .bind(note)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    async fn updates(&self, id: ComplaintId) -> CoreResult<Vec<ComplaintUpdate>> {
        let rows = sqlx::query(
            "SELECT * FROM complaint_updates WHERE complaint_id = $1 ORDER BY created_at, id",
        )
        .bind(to_db_u64(id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_update).collect()
    }

    async fn list_open_for_sla(&self) -> CoreResult<Vec<Complaint>> {
        let rows = sqlx::query(
            "SELECT * FROM complaints WHERE status IN ('open', 'in_progress') \
             ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_complaint).collect()
    }

    async fn list_created_since(&self, since: DateTime<Utc>) -> CoreResult<Vec<Complaint>> {
        let rows = sqlx::query(
            "SELECT * FROM complaints WHERE created_at >= $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_complaint).collect()
    }
}
