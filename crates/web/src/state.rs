//! Application state shared across handlers.

use std::sync::Arc;

use crate::api::{ApiClient, ApiError};
use crate::config::WebConfig;
use crate::content::ContentStore;
use crate::events::{SessionEvents, evict_on_sign_out};
use crate::services::relay::RelayError;
use crate::services::{AccountStore, FormRelay};

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("API client: {0}")]
    Api(#[from] ApiError),
    #[error("form relay: {0}")]
    Relay(#[from] RelayError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the account store, API clients and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: WebConfig,
    accounts: AccountStore,
    api: ApiClient,
    relay: FormRelay,
    content: ContentStore,
    events: SessionEvents,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Spawns the task that drops cached API responses on sign-out, so it
    /// must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(
        config: WebConfig,
        accounts: AccountStore,
        content: ContentStore,
    ) -> Result<Self, StateError> {
        let api = ApiClient::new(&config.api)?;
        let relay = FormRelay::new(config.form_relay_url.clone(), config.api.timeout)?;
        let events = SessionEvents::default();

        tokio::spawn(evict_on_sign_out(events.subscribe(), api.clone()));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                accounts,
                api,
                relay,
                content,
                events,
            }),
        })
    }

    /// Get a reference to the web configuration.
    #[must_use]
    pub fn config(&self) -> &WebConfig {
        &self.inner.config
    }

    /// Get a reference to the per-user account store.
    #[must_use]
    pub fn accounts(&self) -> &AccountStore {
        &self.inner.accounts
    }

    /// Get a reference to the payments API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the form relay.
    #[must_use]
    pub fn relay(&self) -> &FormRelay {
        &self.inner.relay
    }

    /// Get a reference to the loaded content.
    #[must_use]
    pub fn content(&self) -> &ContentStore {
        &self.inner.content
    }

    /// Get a reference to the session event bus.
    #[must_use]
    pub fn events(&self) -> &SessionEvents {
        &self.inner.events
    }
}
