//! Account document commands.
//!
//! # Usage
//!
//! ```bash
//! rackz-cli account show -u usr_123
//! rackz-cli account clear -u usr_123
//! rackz-cli setup advance -u usr_123 -r setup_5f0c9e7a2b8d4c1e9a6f3b2d1c0e8a7f -s in_review
//! ```

use chrono::Utc;
use rackz_core::{InvalidTransition, SetupRequestId, SetupStatus, UserId};
use rackz_web::db::RepositoryError;
use rackz_web::services::AccountStore;
use thiserror::Error;

use super::{CommandError, connect};

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Unknown status name.
    #[error("Invalid status: {0}. Valid statuses: in_review, in_progress, testing, completed, on_hold")]
    InvalidStatus(String),

    /// No such setup request for this user.
    #[error("Setup request not found: {0}")]
    RequestNotFound(String),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

async fn store() -> Result<AccountStore, AccountError> {
    Ok(AccountStore::Postgres(connect().await?))
}

/// Print a user's account document.
pub async fn show(user: &str) -> Result<(), AccountError> {
    let account = store().await?.load(&UserId::new(user)).await?;
    let json = serde_json::to_string_pretty(&account)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{json}");
    }
    Ok(())
}

/// Delete a user's account document.
pub async fn clear(user: &str) -> Result<(), AccountError> {
    store().await?.clear(&UserId::new(user)).await?;
    tracing::info!(user_id = %user, "Account document cleared");
    Ok(())
}

/// Move one setup request to `status`, enforcing the status machine.
pub async fn advance_setup(user: &str, request: &str, status: &str) -> Result<(), AccountError> {
    let to: SetupStatus = status
        .parse()
        .map_err(|_| AccountError::InvalidStatus(status.to_owned()))?;
    let user_id = UserId::new(user);
    let request_id = SetupRequestId::new(request);

    let mut from = None;
    store()
        .await?
        .try_update(&user_id, |account| {
            let setup = account
                .setup_request_mut(&request_id)
                .ok_or_else(|| AccountError::RequestNotFound(request.to_owned()))?;
            from = Some(setup.status);
            setup.advance(to, Utc::now())?;
            Ok::<_, AccountError>(())
        })
        .await?;
    let from = from.map_or("unknown", SetupStatus::as_str);

    tracing::info!(
        user_id = %user,
        request_id = %request,
        from,
        to = to.as_str(),
        "Setup request advanced"
    );
    Ok(())
}
