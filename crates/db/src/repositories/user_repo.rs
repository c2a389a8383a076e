//! Repository for the `users` table.

use chantier_core::{CoreError, UserLookup};
use sqlx::PgPool;

use crate::models::user::{CreateUser, User};
use crate::store_error;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, email, display_name, created_at, updated_at";

/// Provides CRUD operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, display_name)
             VALUES ($1, $2)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.email)
            .bind(&input.display_name)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Name to show for a user: the display name if set, otherwise the email.
    pub async fn display_name(pool: &PgPool, id: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COALESCE(NULLIF(TRIM(display_name), ''), email) FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}

/// [`UserLookup`] backed by the `users` table.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UserLookup for PgUserDirectory {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, CoreError> {
        UserRepo::display_name(&self.pool, user_id)
            .await
            .map_err(store_error)
    }
}
