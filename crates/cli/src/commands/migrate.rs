//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! rackz-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `RACKZ_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Account documents: `crates/web/migrations/`. The session table is
//! created by `tower-sessions-sqlx-store`.

use thiserror::Error;
use tower_sessions_sqlx_store::PostgresStore;

use super::{CommandError, connect};

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Session table error: {0}")]
    Sessions(#[from] sqlx::Error),
}

/// Run the web front end's migrations and create the session table.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    tracing::info!("Running web migrations...");
    sqlx::migrate!("../web/migrations").run(&pool).await?;

    tracing::info!("Creating session table...");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
