//! Client for the Rackz payments API.
//!
//! The API owns authentication, Stripe OAuth and all Stripe data. This front
//! end only proxies to it with the signed-in user's bearer token.
//!
//! # Caching
//!
//! Stripe reads are cached per user for 60 seconds using `moka`. A user's
//! entries are evicted when they sign out (see [`crate::events`]).
//!
//! # Failure semantics
//!
//! Requests are never retried. Every request carries the client-wide timeout
//! and is cancelled when the handler future awaiting it is dropped.

pub mod types;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use rackz_core::UserId;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::ApiConfig;

pub use types::{
    ApiEntitlements, ApiUser, AuthResponse, Charge, ChargeStatus, ConnectUrl, Dispute, Interval,
    ListResponse, SigninRequest, SignupRequest, StripeAccount, Subscription, SubscriptionStatus,
};

/// How long Stripe reads are served from cache.
const CACHE_TTL: Duration = Duration::from_secs(60);

/// Errors that can occur when calling the API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, expired or revoked bearer token.
    #[error("unauthorized")]
    Unauthorized,

    /// The request conflicts with existing state (e.g. email already registered).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The API rejected the request body.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Any other non-success status.
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ApiError {
    /// Map a non-success response to an error.
    fn from_status(status: StatusCode, body: &str) -> Self {
        let parsed: types::ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .message
            .or(parsed.error)
            .unwrap_or_else(|| body.chars().take(200).collect());

        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::CONFLICT => Self::Conflict(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Self::Rejected(message),
            _ => Self::Status {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Whether this error must end the user's session.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Resolves a bearer token to a user.
///
/// Implemented by [`ApiClient`]; session resolution is written against this
/// trait so it can be exercised without a live API.
pub trait IdentityApi: Send + Sync {
    /// `GET /auth/me`.
    fn me(&self, token: &str) -> impl Future<Output = Result<ApiUser, ApiError>> + Send;
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
enum Endpoint {
    Account,
    Charges,
    Subscriptions,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CacheKey {
    user: UserId,
    endpoint: Endpoint,
}

#[derive(Debug, Clone)]
enum CacheValue {
    Account(StripeAccount),
    Charges(Arc<Vec<Charge>>),
    Subscriptions(Arc<Vec<Subscription>>),
}

/// Client for the Rackz payments API.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<CacheKey, CacheValue>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("rackz-web/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
                cache,
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    /// Send a request and decode a JSON success body.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(status = %status, "API returned non-success status");
            return Err(ApiError::from_status(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse API response"
            );
            ApiError::Parse(e)
        })
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Conflict` if the email is already registered,
    /// `ApiError::Rejected` for invalid input, or a transport error.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn signup(&self, request: &SignupRequest) -> Result<AuthResponse, ApiError> {
        self.send(
            self.inner
                .client
                .post(self.url("/auth/signup"))
                .json(request),
        )
        .await
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for bad credentials, or a transport error.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn signin(&self, request: &SigninRequest) -> Result<AuthResponse, ApiError> {
        self.send(
            self.inner
                .client
                .post(self.url("/auth/signin"))
                .json(request),
        )
        .await
    }

    // =========================================================================
    // Stripe
    // =========================================================================

    /// Get the Stripe OAuth URL to send the user to.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token, state))]
    pub async fn stripe_connect_url(
        &self,
        token: &str,
        redirect_uri: &str,
        state: &str,
    ) -> Result<String, ApiError> {
        let url = format!(
            "{}?redirect_uri={}&state={}",
            self.url("/stripe/connect-url"),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state)
        );

        let connect: ConnectUrl = self
            .send(self.inner.client.get(url).bearer_auth(token))
            .await?;
        Ok(connect.url)
    }

    /// Get the user's Stripe connection (cached).
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token), fields(user_id = %user))]
    pub async fn stripe_account(
        &self,
        user: &UserId,
        token: &str,
    ) -> Result<StripeAccount, ApiError> {
        let key = CacheKey {
            user: user.clone(),
            endpoint: Endpoint::Account,
        };
        if let Some(CacheValue::Account(account)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for stripe account");
            return Ok(account);
        }

        let account: StripeAccount = self
            .send(
                self.inner
                    .client
                    .get(self.url("/stripe/account"))
                    .bearer_auth(token),
            )
            .await?;
        self.inner
            .cache
            .insert(key, CacheValue::Account(account.clone()))
            .await;
        Ok(account)
    }

    /// Re-read the user's Stripe connection, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    pub async fn refresh_stripe_account(
        &self,
        user: &UserId,
        token: &str,
    ) -> Result<StripeAccount, ApiError> {
        self.inner
            .cache
            .invalidate(&CacheKey {
                user: user.clone(),
                endpoint: Endpoint::Account,
            })
            .await;
        self.stripe_account(user, token).await
    }

    /// Get the user's recent charges, newest first (cached).
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token), fields(user_id = %user))]
    pub async fn charges(&self, user: &UserId, token: &str) -> Result<Arc<Vec<Charge>>, ApiError> {
        let key = CacheKey {
            user: user.clone(),
            endpoint: Endpoint::Charges,
        };
        if let Some(CacheValue::Charges(charges)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for charges");
            return Ok(charges);
        }

        let list: ListResponse<Charge> = self
            .send(
                self.inner
                    .client
                    .get(self.url("/stripe/charges"))
                    .bearer_auth(token),
            )
            .await?;
        let mut charges = list.data;
        charges.sort_by(|a, b| b.created.cmp(&a.created));
        let charges = Arc::new(charges);

        self.inner
            .cache
            .insert(key, CacheValue::Charges(Arc::clone(&charges)))
            .await;
        Ok(charges)
    }

    /// Get the user's subscriptions (cached).
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token), fields(user_id = %user))]
    pub async fn subscriptions(
        &self,
        user: &UserId,
        token: &str,
    ) -> Result<Arc<Vec<Subscription>>, ApiError> {
        let key = CacheKey {
            user: user.clone(),
            endpoint: Endpoint::Subscriptions,
        };
        if let Some(CacheValue::Subscriptions(subs)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for subscriptions");
            return Ok(subs);
        }

        let list: ListResponse<Subscription> = self
            .send(
                self.inner
                    .client
                    .get(self.url("/stripe/subscriptions"))
                    .bearer_auth(token),
            )
            .await?;
        let subs = Arc::new(list.data);

        self.inner
            .cache
            .insert(key, CacheValue::Subscriptions(Arc::clone(&subs)))
            .await;
        Ok(subs)
    }

    /// Drop every cached response for a user.
    pub async fn evict_user(&self, user: &UserId) {
        for endpoint in [Endpoint::Account, Endpoint::Charges, Endpoint::Subscriptions] {
            self.inner
                .cache
                .invalidate(&CacheKey {
                    user: user.clone(),
                    endpoint,
                })
                .await;
        }
    }
}

impl IdentityApi for ApiClient {
    #[instrument(skip_all)]
    async fn me(&self, token: &str) -> Result<ApiUser, ApiError> {
        self.send(
            self.inner
                .client
                .get(self.url("/auth/me"))
                .bearer_auth(token),
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(ApiError::from_status(StatusCode::UNAUTHORIZED, "").is_unauthorized());
        assert!(matches!(
            ApiError::from_status(
                StatusCode::CONFLICT,
                r#"{"message":"Email already registered"}"#,
            ),
            ApiError::Conflict(m) if m == "Email already registered"
        ));
        assert!(matches!(
            ApiError::from_status(
                StatusCode::UNPROCESSABLE_ENTITY,
                r#"{"error":"password too short"}"#,
            ),
            ApiError::Rejected(m) if m == "password too short"
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream down"),
            ApiError::Status { status: 502, message } if message == "upstream down"
        ));
    }

    #[tokio::test]
    async fn test_evict_user_only_touches_that_user() {
        let client = ApiClient::new(&ApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();

        let ana = UserId::new("usr_ana");
        let bo = UserId::new("usr_bo");
        for user in [&ana, &bo] {
            client
                .inner
                .cache
                .insert(
                    CacheKey {
                        user: user.clone(),
                        endpoint: Endpoint::Account,
                    },
                    CacheValue::Account(StripeAccount::default()),
                )
                .await;
        }

        client.evict_user(&ana).await;

        let ana_key = CacheKey {
            user: ana,
            endpoint: Endpoint::Account,
        };
        let bo_key = CacheKey {
            user: bo,
            endpoint: Endpoint::Account,
        };
        assert!(client.inner.cache.get(&ana_key).await.is_none());
        assert!(client.inner.cache.get(&bo_key).await.is_some());
    }
}
