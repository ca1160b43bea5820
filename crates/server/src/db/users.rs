//! User repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use poizon_core::UserId;

use super::RepositoryError;
use crate::models::{NewUser, User};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    username: Option<String>,
    first_name: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            created_at: row.created_at,
        }
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a user or refresh their Telegram names.
    ///
    /// `created_at` is kept from the first insert.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO app_user (id, username, first_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET username = EXCLUDED.username,
                first_name = EXCLUDED.first_name,
                updated_at = NOW()
            RETURNING id, username, first_name, created_at
            ",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.first_name)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Get a user by their Telegram id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, username, first_name, created_at
            FROM app_user
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}
