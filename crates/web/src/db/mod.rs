//! Database operations for the web front end's `PostgreSQL`.
//!
//! The payments API is the source of truth for users and Stripe data. This
//! database only holds what the front end itself remembers:
//!
//! ## Tables
//!
//! - `web.account_state` - One JSON document per user (plan choice,
//!   connected providers, setup requests)
//! - `tower_sessions.session` - Tower-sessions storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/web/migrations/` and run via:
//! ```bash
//! cargo run -p rackz-cli -- migrate
//! ```

pub mod accounts;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use accounts::{AccountRepository, LockedDocument};

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A document could not be encoded for storage.
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Stored data could not be decoded.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
