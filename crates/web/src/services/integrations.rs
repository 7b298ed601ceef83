//! Connected payment providers.
//!
//! Stripe's connection lives in the payments API; this service mirrors it
//! into the account document whenever it is read. PayPal and Shopify have
//! no backend yet, so connecting them only edits the persisted set.

use rackz_core::{Provider, UserId};
use rand::Rng;
use serde::Serialize;
use tracing::instrument;

use crate::api::{ApiClient, ApiError, StripeAccount};
use crate::db::RepositoryError;
use crate::models::AccountState;
use crate::services::account_store::AccountStore;

/// Length of the OAuth CSRF state.
const OAUTH_STATE_LEN: usize = 32;

/// Errors from provider management.
#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("Stripe is managed through the payments API")]
    StripeManaged,
    #[error("OAuth state mismatch")]
    StateMismatch,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A provider as listed on the integrations page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub provider: Provider,
    pub connected: bool,
    /// Connection comes from the payments API.
    pub authoritative: bool,
}

/// Provider list for the integrations page.
#[must_use]
pub fn provider_statuses(account: &AccountState) -> Vec<ProviderStatus> {
    Provider::ALL
        .into_iter()
        .map(|provider| ProviderStatus {
            provider,
            connected: account.is_connected(provider),
            authoritative: provider.is_authoritative(),
        })
        .collect()
}

/// Random CSRF state for the Stripe OAuth round trip.
#[must_use]
pub fn generate_oauth_state() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..OAUTH_STATE_LEN)
        .filter_map(|_| CHARSET.get(rng.random_range(0..CHARSET.len())))
        .map(|&b| char::from(b))
        .collect()
}

/// Check the state returned by the OAuth callback.
///
/// # Errors
///
/// Returns `IntegrationError::StateMismatch` if nothing was stored or the
/// values differ.
pub fn verify_oauth_state(
    stored: Option<&str>,
    returned: Option<&str>,
) -> Result<(), IntegrationError> {
    match (stored, returned) {
        (Some(stored), Some(returned)) if stored == returned => Ok(()),
        _ => Err(IntegrationError::StateMismatch),
    }
}

/// Read the Stripe connection and mirror it into the account document.
///
/// `refresh` bypasses the API response cache (after the OAuth callback).
///
/// # Errors
///
/// Returns `IntegrationError::Api` if the API call fails, or
/// `IntegrationError::Repository` if the document cannot be saved.
#[instrument(skip(api, accounts, token), fields(user_id = %user))]
pub async fn sync_stripe(
    api: &ApiClient,
    accounts: &AccountStore,
    user: &UserId,
    token: &str,
    refresh: bool,
) -> Result<(StripeAccount, AccountState), IntegrationError> {
    let stripe = if refresh {
        api.refresh_stripe_account(user, token).await?
    } else {
        api.stripe_account(user, token).await?
    };

    let account = accounts.load(user).await?;
    if account.is_connected(Provider::Stripe) == stripe.connected {
        return Ok((stripe, account));
    }

    let connected = stripe.connected;
    let account = accounts
        .update(user, |account| {
            if connected {
                account.connected_providers.insert(Provider::Stripe);
            } else {
                account.connected_providers.remove(&Provider::Stripe);
            }
        })
        .await?;
    tracing::info!(connected, "Stripe connection mirrored");
    Ok((stripe, account))
}

/// Mark a simulated provider connected.
///
/// # Errors
///
/// Returns `IntegrationError::StripeManaged` for Stripe, or
/// `IntegrationError::Repository` if the document cannot be saved.
#[instrument(skip(accounts), fields(user_id = %user))]
pub async fn connect_simulated(
    accounts: &AccountStore,
    user: &UserId,
    provider: Provider,
) -> Result<AccountState, IntegrationError> {
    if provider.is_authoritative() {
        return Err(IntegrationError::StripeManaged);
    }
    Ok(accounts
        .update(user, |account| {
            account.connected_providers.insert(provider);
        })
        .await?)
}

/// Disconnect a simulated provider. Stripe cannot be disconnected here.
///
/// # Errors
///
/// Returns `IntegrationError::StripeManaged` for Stripe, or
/// `IntegrationError::Repository` if the document cannot be saved.
#[instrument(skip(accounts), fields(user_id = %user))]
pub async fn disconnect(
    accounts: &AccountStore,
    user: &UserId,
    provider: Provider,
) -> Result<AccountState, IntegrationError> {
    if provider.is_authoritative() {
        return Err(IntegrationError::StripeManaged);
    }
    Ok(accounts
        .update(user, |account| {
            account.connected_providers.remove(&provider);
        })
        .await?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_connect_and_disconnect() {
        let accounts = AccountStore::memory();
        let user = UserId::new("usr_1");

        let account = connect_simulated(&accounts, &user, Provider::Shopify)
            .await
            .unwrap();
        assert!(account.is_connected(Provider::Shopify));

        let account = disconnect(&accounts, &user, Provider::Shopify).await.unwrap();
        assert!(!account.is_connected(Provider::Shopify));
    }

    #[tokio::test]
    async fn test_stripe_is_not_simulated() {
        let accounts = AccountStore::memory();
        let user = UserId::new("usr_1");
        assert!(matches!(
            disconnect(&accounts, &user, Provider::Stripe).await,
            Err(IntegrationError::StripeManaged)
        ));
        assert!(matches!(
            connect_simulated(&accounts, &user, Provider::Stripe).await,
            Err(IntegrationError::StripeManaged)
        ));
    }

    #[test]
    fn test_oauth_state() {
        let state = generate_oauth_state();
        assert_eq!(state.len(), OAUTH_STATE_LEN);
        assert_ne!(state, generate_oauth_state());

        assert!(verify_oauth_state(Some(&state), Some(&state)).is_ok());
        assert!(verify_oauth_state(Some(&state), Some("forged")).is_err());
        assert!(verify_oauth_state(None, Some(&state)).is_err());
        assert!(verify_oauth_state(Some(&state), None).is_err());
    }

    #[test]
    fn test_provider_statuses() {
        let mut account = AccountState::default();
        account.connected_providers.insert(Provider::Paypal);
        let statuses = provider_statuses(&account);
        assert_eq!(statuses.len(), 3);
        assert!(statuses.iter().any(|s| s.provider == Provider::Paypal && s.connected));
        assert!(statuses.iter().any(|s| s.provider == Provider::Stripe && s.authoritative));
    }
}
