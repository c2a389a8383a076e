//! Repository for the `sites` table.

use serde_json::Value;
use sqlx::PgPool;

use crate::models::site::SiteRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, version, document";

/// Outcome of a version-checked write.
#[derive(Debug)]
pub enum ReplaceOutcome {
    Replaced(SiteRow),
    /// The row exists but is at a different version.
    VersionMismatch { actual: i64 },
    Missing,
}

/// Provides document-level CRUD for sites.
pub struct SiteRepo;

impl SiteRepo {
    /// Insert a new site document, returning the created row.
    pub async fn create(
        pool: &PgPool,
        client_id: &str,
        chef_id: Option<&str>,
        document: &Value,
    ) -> Result<SiteRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO sites (client_id, chef_id, document)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SiteRow>(&query)
            .bind(client_id)
            .bind(chef_id)
            .bind(document)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<SiteRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sites WHERE id = $1");
        sqlx::query_as::<_, SiteRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all sites, most recently created first.
    pub async fn list(pool: &PgPool) -> Result<Vec<SiteRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sites ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, SiteRow>(&query).fetch_all(pool).await
    }

    pub async fn list_by_client(pool: &PgPool, client_id: &str) -> Result<Vec<SiteRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sites WHERE client_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, SiteRow>(&query)
            .bind(client_id)
            .fetch_all(pool)
            .await
    }

    pub async fn list_by_chef(pool: &PgPool, chef_id: &str) -> Result<Vec<SiteRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sites WHERE chef_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, SiteRow>(&query)
            .bind(chef_id)
            .fetch_all(pool)
            .await
    }

    /// Overwrite a site document and bump its version.
    ///
    /// With `expected_version` set, the write only applies if the stored
    /// version matches.
    pub async fn replace(
        pool: &PgPool,
        id: &str,
        client_id: &str,
        chef_id: Option<&str>,
        document: &Value,
        expected_version: Option<i64>,
    ) -> Result<ReplaceOutcome, sqlx::Error> {
        let query = format!(
            "UPDATE sites SET
                client_id = $2,
                chef_id = $3,
                document = $4,
                version = version + 1,
                updated_at = NOW()
             WHERE id = $1 AND ($5::BIGINT IS NULL OR version = $5)
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, SiteRow>(&query)
            .bind(id)
            .bind(client_id)
            .bind(chef_id)
            .bind(document)
            .bind(expected_version)
            .fetch_optional(pool)
            .await?;

        if let Some(row) = updated {
            return Ok(ReplaceOutcome::Replaced(row));
        }

        let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM sites WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(match actual {
            Some(actual) => ReplaceOutcome::VersionMismatch { actual },
            None => ReplaceOutcome::Missing,
        })
    }

    /// Permanently delete a site. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sites WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
