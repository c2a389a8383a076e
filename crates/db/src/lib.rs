//! PostgreSQL backing store for chantier sites.
//!
//! - [`PgSiteStore`]: [`SiteStore`](chantier_core::SiteStore) over the
//!   `sites` JSONB table, with change notifications fed by [`listener`].
//! - [`PgUserDirectory`]: [`UserLookup`](chantier_core::UserLookup) over
//!   the `users` table.
//! - [`create_pool`], [`health_check`], [`run_migrations`]: pool plumbing.

use chantier_core::CoreError;
use sqlx::postgres::PgPoolOptions;

pub mod config;
pub mod listener;
pub mod models;
pub mod repositories;
pub mod store;

pub use config::DbConfig;
pub use repositories::{PgUserDirectory, SiteRepo, UserRepo};
pub use store::PgSiteStore;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from configuration.
pub async fn create_pool(config: &DbConfig) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
}

/// Verify the database answers a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}

/// Map a sqlx error onto the core error taxonomy.
///
/// Row decoding problems are bugs, not outages; everything else is treated
/// as a transient store failure the caller may retry.
pub(crate) fn store_error(err: sqlx::Error) -> CoreError {
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            tracing::error!(error = %err, "Failed to decode row");
            CoreError::Internal(err.to_string())
        }
        other => {
            tracing::error!(error = %other, "Database error");
            CoreError::TransientStore(other.to_string())
        }
    }
}
