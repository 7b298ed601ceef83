//! Per-user account document store.
//!
//! Each user has one [`AccountState`] document, read and written whole.
//! Writes lock the document from read to write. A document that fails to
//! decode reads as absent so a bad write never locks a user out of the
//! dashboard, but it is never overwritten.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rackz_core::UserId;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::instrument;

use crate::db::{AccountRepository, RepositoryError};
use crate::models::AccountState;

/// Account document storage backend.
#[derive(Clone)]
pub enum AccountStore {
    /// `web.account_state` in `PostgreSQL`.
    Postgres(PgPool),
    /// Process-local map, used by tests and local demos.
    Memory(Arc<RwLock<HashMap<UserId, serde_json::Value>>>),
}

impl AccountStore {
    /// An empty in-memory store.
    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(Arc::default())
    }

    /// Load a user's document, or the default document if there is none.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the backend cannot be queried.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn load(&self, user: &UserId) -> Result<AccountState, RepositoryError> {
        let raw = match self {
            Self::Postgres(pool) => AccountRepository::new(pool).get(user).await?,
            Self::Memory(map) => map.read().await.get(user).cloned(),
        };

        let Some(raw) = raw else {
            return Ok(AccountState::default());
        };

        match serde_json::from_value(raw) {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::warn!(
                    user_id = %user,
                    error = %e,
                    "Discarding malformed account document"
                );
                Ok(AccountState::default())
            }
        }
    }

    /// Load, modify and save a user's document, returning the saved state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if loading or saving fails, or
    /// `RepositoryError::DataCorruption` if the stored document does not
    /// decode.
    pub async fn update<F>(&self, user: &UserId, f: F) -> Result<AccountState, RepositoryError>
    where
        F: FnOnce(&mut AccountState) + Send,
    {
        self.try_update(user, |state| {
            f(state);
            Ok::<_, RepositoryError>(())
        })
        .await
    }

    /// Like [`AccountStore::update`], but `f` may refuse the change. Nothing
    /// is written when it does.
    ///
    /// The document stays locked from read to write, so concurrent updates
    /// for one user apply one after the other. A document that does not
    /// decode is never overwritten.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or a `RepositoryError` converted into `E`.
    #[instrument(skip(self, f), fields(user_id = %user))]
    pub async fn try_update<F, E>(&self, user: &UserId, f: F) -> Result<AccountState, E>
    where
        F: FnOnce(&mut AccountState) -> Result<(), E> + Send,
        E: From<RepositoryError>,
    {
        match self {
            Self::Postgres(pool) => {
                let locked = AccountRepository::new(pool).lock(user).await?;
                let mut state = decode_for_update(user, locked.document.clone())?;
                f(&mut state)?;
                let (document, now) = stamp(&mut state)?;
                locked.commit(&document, now).await?;
                Ok(state)
            }
            Self::Memory(map) => {
                let mut map = map.write().await;
                let mut state = match map.get(user) {
                    Some(raw) => decode_for_update(user, raw.clone())?,
                    None => AccountState::default(),
                };
                f(&mut state)?;
                let (document, _) = stamp(&mut state)?;
                map.insert(user.clone(), document);
                Ok(state)
            }
        }
    }

    /// Delete a user's document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user had no document.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn clear(&self, user: &UserId) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(pool) => AccountRepository::new(pool).delete(user).await,
            Self::Memory(map) => map
                .write()
                .await
                .remove(user)
                .map(|_| ())
                .ok_or(RepositoryError::NotFound),
        }
    }

    /// Check that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the database does not answer.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(pool) => AccountRepository::new(pool).ping().await,
            Self::Memory(_) => Ok(()),
        }
    }
}

fn decode_for_update(
    user: &UserId,
    raw: serde_json::Value,
) -> Result<AccountState, RepositoryError> {
    serde_json::from_value(raw).map_err(|e| {
        tracing::error!(
            user_id = %user,
            error = %e,
            "Refusing to overwrite malformed account document"
        );
        RepositoryError::DataCorruption(format!("account document for {user}: {e}"))
    })
}

/// Stamp `updated_at` and encode the document.
fn stamp(state: &mut AccountState) -> Result<(serde_json::Value, DateTime<Utc>), RepositoryError> {
    let now = Utc::now();
    state.updated_at = Some(now);
    Ok((serde_json::to_value(&*state)?, now))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rackz_core::{Provider, SaasPackage, SetupStatus};

    use super::*;
    use crate::models::account::tests::setup_request;

    #[tokio::test]
    async fn test_missing_document_loads_default() {
        let store = AccountStore::memory();
        let state = store.load(&UserId::new("usr_1")).await.unwrap();
        assert_eq!(state, AccountState::default());
    }

    #[tokio::test]
    async fn test_update_round_trips() {
        let store = AccountStore::memory();
        let user = UserId::new("usr_1");
        store
            .update(&user, |state| {
                state.package = Some(SaasPackage::Pro);
                state.connected_providers.insert(Provider::Paypal);
            })
            .await
            .unwrap();

        let state = store.load(&user).await.unwrap();
        assert_eq!(state.package, Some(SaasPackage::Pro));
        assert!(state.is_connected(Provider::Paypal));
        assert!(state.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_malformed_document_is_treated_as_absent() {
        let store = AccountStore::memory();
        let user = UserId::new("usr_1");
        if let AccountStore::Memory(map) = &store {
            map.write()
                .await
                .insert(user.clone(), serde_json::json!({"package": 42}));
        }
        assert_eq!(store.load(&user).await.unwrap(), AccountState::default());
    }

    async fn insert_raw(store: &AccountStore, user: &UserId, raw: serde_json::Value) {
        if let AccountStore::Memory(map) = store {
            map.write().await.insert(user.clone(), raw);
        }
    }

    async fn raw(store: &AccountStore, user: &UserId) -> serde_json::Value {
        match store {
            AccountStore::Memory(map) => map.read().await.get(user).cloned().unwrap(),
            AccountStore::Postgres(_) => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_update_never_overwrites_undecodable_document() {
        let store = AccountStore::memory();
        let user = UserId::new("usr_1");
        let mut document = serde_json::to_value(AccountState {
            setup_requests: vec![setup_request(SetupStatus::InProgress)],
            ..AccountState::default()
        })
        .unwrap();
        document["connected_providers"] = serde_json::json!(["venmo"]);
        insert_raw(&store, &user, document.clone()).await;

        let result = store
            .update(&user, |state| state.package = Some(SaasPackage::Pro))
            .await;
        assert!(matches!(result, Err(RepositoryError::DataCorruption(_))));
        assert_eq!(raw(&store, &user).await, document);
        assert_eq!(
            raw(&store, &user).await["setup_requests"]
                .as_array()
                .map(Vec::len),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_refused_update_writes_nothing() {
        let store = AccountStore::memory();
        let user = UserId::new("usr_1");
        let result = store
            .try_update(&user, |state| {
                state.package = Some(SaasPackage::Scale);
                Err(RepositoryError::NotFound)
            })
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
        assert_eq!(store.load(&user).await.unwrap(), AccountState::default());
        if let AccountStore::Memory(map) = &store {
            assert!(map.read().await.is_empty());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_are_all_kept() {
        let store = AccountStore::memory();
        let user = UserId::new("usr_1");

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                let user = user.clone();
                tokio::spawn(async move {
                    store
                        .update(&user, |state| {
                            state
                                .setup_requests
                                .push(setup_request(SetupStatus::PaymentCompleted));
                        })
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.load(&user).await.unwrap().setup_requests.len(), 50);
    }

    #[tokio::test]
    async fn test_clear_missing_is_not_found() {
        let store = AccountStore::memory();
        assert!(matches!(
            store.clear(&UserId::new("usr_1")).await,
            Err(RepositoryError::NotFound)
        ));
    }
}
