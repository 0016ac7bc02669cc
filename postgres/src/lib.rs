//! # ConvergeAI Postgres
//!
//! `PostgreSQL` implementations of the repository traits defined in
//! `convergeai-core`. Queries are runtime-bound so the workspace builds
//! without a live database; schemas are documented per module and managed
//! by external migrations. Booking commits run inside transactions; the
//! uniqueness of `order_id` and `booking_number` is enforced by the
//! schema's unique constraints.
//!
//! ## Example
//!
//! ```ignore
//! let pool = PgPoolOptions::new()
//!     .max_connections(16)
//!     .connect(&database_url)
//!     .await?;
//! let sessions = PostgresSessionRepo::new(pool.clone());
//! let bookings = PostgresBookingRepo::new(pool.clone());
//! ```

pub mod alerts;
pub mod audit;
pub mod bookings;
pub mod catalog;
pub mod complaints;
mod helpers;
pub mod sessions;

pub use alerts::PostgresAlertRepo;
pub use audit::PostgresAuditRepo;
pub use bookings::PostgresBookingRepo;
pub use catalog::{PostgresAddressRepo, PostgresCatalogRepo};
pub use complaints::PostgresComplaintRepo;
pub use sessions::PostgresSessionRepo;
