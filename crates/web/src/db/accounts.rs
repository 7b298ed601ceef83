//! Account document repository.
//!
//! Documents are stored as raw `jsonb`; decoding (and tolerating malformed
//! documents) is left to [`crate::services::account_store`].

use chrono::{DateTime, Utc};
use rackz_core::UserId;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use super::RepositoryError;

/// Repository for per-user account documents.
pub struct AccountRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AccountRepository<'a> {
    /// Create a new account repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user's raw document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: &UserId,
    ) -> Result<Option<serde_json::Value>, RepositoryError> {
        let document: Option<Json<serde_json::Value>> = sqlx::query_scalar(
            r"
            SELECT document
            FROM web.account_state
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(document.map(|Json(value)| value))
    }

    /// Open a transaction holding the row lock on a user's document.
    ///
    /// A user without a document gets an empty one inside the transaction so
    /// that concurrent first writers serialize on the same row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the queries fail.
    pub async fn lock(&self, user_id: &UserId) -> Result<LockedDocument, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO web.account_state (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO NOTHING
            ",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let Json(document): Json<serde_json::Value> = sqlx::query_scalar(
            r"
            SELECT document
            FROM web.account_state
            WHERE user_id = $1
            FOR UPDATE
            ",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        Ok(LockedDocument {
            tx,
            user_id: user_id.clone(),
            document,
        })
    }

    /// Delete a user's document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if there was no document.
    pub async fn delete(&self, user_id: &UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM web.account_state WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Check that the database answers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(self.pool).await?;
        Ok(())
    }
}

/// A user's document read under a row lock.
///
/// Dropping it without [`LockedDocument::commit`] rolls back and releases
/// the lock.
pub struct LockedDocument {
    tx: Transaction<'static, Postgres>,
    user_id: UserId,
    /// The stored document.
    pub document: serde_json::Value,
}

impl LockedDocument {
    /// Replace the document and release the lock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write or commit fails.
    pub async fn commit(
        mut self,
        document: &serde_json::Value,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE web.account_state
            SET document = $2, updated_at = $3
            WHERE user_id = $1
            ",
        )
        .bind(&self.user_id)
        .bind(Json(document))
        .bind(updated_at)
        .execute(&mut *self.tx)
        .await?;

        self.tx.commit().await?;
        Ok(())
    }
}
