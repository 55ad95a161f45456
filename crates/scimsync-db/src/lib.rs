//! scimsync database layer.
//!
//! PostgreSQL persistence for the local ↔ remote identity mapping table.
//!
//! # Modules
//!
//! - [`models`] - Row models and queries (`ScimMapping`)
//! - [`migrations`] - Embedded schema migrations
//! - [`error`] - Database error type (`DbError`)

pub mod error;
pub mod migrations;
pub mod models;

pub use error::DbError;
pub use migrations::run_migrations;
pub use models::{CreateScimMapping, InsertOutcome, ScimMapping, ScimResourceType};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Default maximum pool size for [`connect`].
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Open a connection pool to the given PostgreSQL URL.
///
/// # Errors
///
/// Returns `DbError::ConnectionFailed` if the database cannot be reached.
pub async fn connect(database_url: &str) -> Result<PgPool, DbError> {
    PgPoolOptions::new()
        .max_connections(DEFAULT_MAX_CONNECTIONS)
        .connect(database_url)
        .await
        .map_err(DbError::ConnectionFailed)
}
