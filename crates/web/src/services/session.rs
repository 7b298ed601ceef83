//! Session resolution.
//!
//! A browser's session document holds two scopes with different lifetimes:
//! the bearer token, which expires after the configured TTL, and the
//! non-sensitive user mirror, which lives as long as the session cookie.
//! [`resolve`] turns a stored document into a [`SessionState`] for the
//! current request:
//!
//! 1. A token older than its TTL is dropped.
//! 2. A remaining token is trusted for the revalidation window after its
//!    last successful `/auth/me`; past that window it is re-verified. Any
//!    failure clears the whole document.
//! 3. Without a token, a mirrored user is kept as [`SessionState::Legacy`].
//!    Legacy sessions can render pages but every API call from them fails
//!    as unauthorized, which signs them out.
//! 4. Otherwise the browser is signed out.

use chrono::{DateTime, TimeDelta, Utc};
use rackz_core::UserId;
use tower_sessions::Session;
use tracing::instrument;

use crate::api::{ApiError, AuthResponse, IdentityApi};
use crate::config::SessionConfig;
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::events::{SessionEvent, SessionEvents, SignOutReason};
use crate::models::{BROWSER_SESSION_KEY, BrowserSession, SessionUser, StoredToken};

/// Errors from the session backend.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session store error: {0}")]
    Store(#[from] tower_sessions::session::Error),
}

// =============================================================================
// Store
// =============================================================================

/// Read/write access to the browser's session document.
#[derive(Clone)]
pub struct SessionStore {
    session: Session,
}

impl SessionStore {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    /// Read the document. Missing or undecodable documents read as empty.
    pub async fn read(&self) -> BrowserSession {
        match self.session.get::<BrowserSession>(BROWSER_SESSION_KEY).await {
            Ok(doc) => doc.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable session document");
                BrowserSession::default()
            }
        }
    }

    /// Replace the document.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session backend fails.
    pub async fn write(&self, doc: &BrowserSession) -> Result<(), SessionError> {
        self.session.insert(BROWSER_SESSION_KEY, doc).await?;
        Ok(())
    }

    /// Delete the session and its cookie.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session backend fails.
    pub async fn invalidate(&self) -> Result<(), SessionError> {
        self.session.flush().await?;
        Ok(())
    }

    /// Issue a new session id, keeping the data. Call on privilege change.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session backend fails.
    pub async fn rotate(&self) -> Result<(), SessionError> {
        self.session.cycle_id().await?;
        Ok(())
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Token lifetimes used by [`resolve`].
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    pub token_ttl: TimeDelta,
    pub revalidate_after: TimeDelta,
}

impl From<&SessionConfig> for SessionPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            token_ttl: TimeDelta::from_std(config.token_ttl).unwrap_or(TimeDelta::MAX),
            revalidate_after: TimeDelta::from_std(config.revalidate_after)
                .unwrap_or(TimeDelta::zero()),
        }
    }
}

/// Who the current request belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    SignedOut,
    /// A mirrored user without a usable token.
    Legacy(SessionUser),
    Authenticated { user: SessionUser, token: String },
}

impl SessionState {
    #[must_use]
    pub const fn user(&self) -> Option<&SessionUser> {
        match self {
            Self::SignedOut => None,
            Self::Legacy(user) | Self::Authenticated { user, .. } => Some(user),
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Authenticated { token, .. } => Some(token),
            _ => None,
        }
    }
}

/// How resolution changed the stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocChange {
    Unchanged,
    /// The document must be written back.
    Updated,
    /// The token was rejected; the session must be invalidated.
    Cleared { user_id: Option<UserId> },
}

/// Result of [`resolve`].
#[derive(Debug, Clone)]
pub struct Resolution {
    pub state: SessionState,
    pub doc: BrowserSession,
    pub change: DocChange,
}

/// Resolve a stored session document for the current request.
#[instrument(skip_all)]
pub async fn resolve(
    mut doc: BrowserSession,
    api: &impl IdentityApi,
    now: DateTime<Utc>,
    policy: SessionPolicy,
) -> Resolution {
    let mut change = DocChange::Unchanged;

    if let Some(token) = &doc.token
        && now - token.issued_at >= policy.token_ttl
    {
        tracing::debug!("Bearer token expired, keeping user mirror");
        doc.token = None;
        change = DocChange::Updated;
    }

    if let Some(token) = doc.token.clone() {
        let recently_verified = token
            .verified_at
            .is_some_and(|at| now - at < policy.revalidate_after);
        if recently_verified && let Some(user) = doc.user.clone() {
            return Resolution {
                state: SessionState::Authenticated {
                    user,
                    token: token.value,
                },
                doc,
                change,
            };
        }

        return match api.me(&token.value).await {
            Ok(api_user) => {
                let user = SessionUser::from(api_user);
                doc.user = Some(user.clone());
                doc.token = Some(StoredToken {
                    verified_at: Some(now),
                    ..token.clone()
                });
                Resolution {
                    state: SessionState::Authenticated {
                        user,
                        token: token.value,
                    },
                    doc,
                    change: DocChange::Updated,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stored token rejected, clearing session");
                Resolution {
                    state: SessionState::SignedOut,
                    change: DocChange::Cleared {
                        user_id: doc.user.map(|u| u.id),
                    },
                    doc: BrowserSession::default(),
                }
            }
        };
    }

    let state = doc
        .user
        .clone()
        .map_or(SessionState::SignedOut, SessionState::Legacy);
    Resolution { state, doc, change }
}

// =============================================================================
// Current session
// =============================================================================

/// The resolved session of the current request.
///
/// Extracted in handlers (see [`crate::middleware::auth`]).
#[derive(Clone)]
pub struct CurrentSession {
    pub store: SessionStore,
    pub doc: BrowserSession,
    pub state: SessionState,
}

impl CurrentSession {
    #[must_use]
    pub const fn user(&self) -> Option<&SessionUser> {
        self.state.user()
    }

    /// Bearer token for API calls, if the session has one.
    #[must_use]
    pub fn auth_token(&self) -> Option<&str> {
        self.state.token()
    }

    /// Bearer token for API calls.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for signed-out and legacy sessions.
    pub fn require_token(&self) -> Result<&str, ApiError> {
        self.auth_token().ok_or(ApiError::Unauthorized)
    }

    /// Write the (modified) document back.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session backend fails.
    pub async fn save(&self) -> Result<(), SessionError> {
        self.store.write(&self.doc).await
    }
}

// =============================================================================
// Sign-in / sign-out
// =============================================================================

/// Store a fresh token and user mirror after sign-in or sign-up.
///
/// The session id is rotated. Scratch records of earlier users on this
/// browser are kept; they are keyed by user id.
///
/// # Errors
///
/// Returns `SessionError` if the session backend fails.
#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn establish(
    store: &SessionStore,
    auth: AuthResponse,
    now: DateTime<Utc>,
) -> Result<SessionUser, SessionError> {
    let user = SessionUser::from(auth.user);

    let mut doc = store.read().await;
    doc.token = Some(StoredToken::fresh(auth.token, now));
    doc.user = Some(user.clone());
    doc.oauth_state = None;

    store.rotate().await?;
    store.write(&doc).await?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!("Session established");
    Ok(user)
}

/// End the session and tell the rest of the process.
///
/// # Errors
///
/// Returns `SessionError` if the session backend fails.
#[instrument(skip_all, fields(reason = reason.as_str()))]
pub async fn signout(
    store: &SessionStore,
    events: &SessionEvents,
    reason: SignOutReason,
) -> Result<(), SessionError> {
    let user_id = store.read().await.user.map(|u| u.id);
    store.invalidate().await?;
    events.publish(SessionEvent::SignedOut { user_id, reason });
    clear_sentry_user();
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rackz_core::Email;
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::api::ApiUser;

    struct StubApi {
        user: Option<ApiUser>,
        calls: AtomicUsize,
    }

    impl StubApi {
        fn accepting() -> Self {
            Self {
                user: Some(ApiUser {
                    id: UserId::new("usr_ana"),
                    email: Email::parse("ana@example.com").unwrap(),
                    name: "Ana Lima".into(),
                    company: None,
                    entitlements: None,
                }),
                calls: AtomicUsize::new(0),
            }
        }

        fn rejecting() -> Self {
            Self {
                user: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl IdentityApi for StubApi {
        async fn me(&self, _token: &str) -> Result<ApiUser, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.user.clone().ok_or(ApiError::Unauthorized)
        }
    }

    fn policy() -> SessionPolicy {
        SessionPolicy {
            token_ttl: TimeDelta::hours(8),
            revalidate_after: TimeDelta::minutes(5),
        }
    }

    fn mirrored_user() -> SessionUser {
        SessionUser {
            id: UserId::new("usr_ana"),
            email: Email::parse("ana@example.com").unwrap(),
            name: "Ana".into(),
            company: None,
            entitlements: None,
        }
    }

    fn doc_with_token(issued: DateTime<Utc>, verified: Option<DateTime<Utc>>) -> BrowserSession {
        BrowserSession {
            token: Some(StoredToken {
                value: "tok".into(),
                issued_at: issued,
                verified_at: verified,
            }),
            user: Some(mirrored_user()),
            ..BrowserSession::default()
        }
    }

    #[tokio::test]
    async fn test_recently_verified_token_skips_network() {
        let now = Utc::now();
        let api = StubApi::rejecting();
        let doc = doc_with_token(now - TimeDelta::minutes(10), Some(now - TimeDelta::minutes(1)));

        let resolution = resolve(doc, &api, now, policy()).await;
        assert_eq!(resolution.state.token(), Some("tok"));
        assert_eq!(resolution.change, DocChange::Unchanged);
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_token_is_revalidated() {
        let now = Utc::now();
        let api = StubApi::accepting();
        let doc = doc_with_token(now - TimeDelta::hours(1), Some(now - TimeDelta::minutes(30)));

        let resolution = resolve(doc, &api, now, policy()).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolution.change, DocChange::Updated);
        assert_eq!(resolution.state.user().unwrap().name, "Ana Lima");
        assert_eq!(resolution.doc.token.unwrap().verified_at, Some(now));
    }

    #[tokio::test]
    async fn test_rejected_token_clears_everything() {
        let now = Utc::now();
        let api = StubApi::rejecting();
        let mut doc = doc_with_token(now - TimeDelta::hours(1), None);
        doc.oauth_state = Some("state".into());

        let resolution = resolve(doc, &api, now, policy()).await;
        assert_eq!(resolution.state, SessionState::SignedOut);
        assert_eq!(resolution.doc, BrowserSession::default());
        assert_eq!(
            resolution.change,
            DocChange::Cleared {
                user_id: Some(UserId::new("usr_ana"))
            }
        );
    }

    #[tokio::test]
    async fn test_expired_token_falls_back_to_legacy_user() {
        let now = Utc::now();
        let api = StubApi::accepting();
        let doc = doc_with_token(now - TimeDelta::hours(9), Some(now - TimeDelta::hours(9)));

        let resolution = resolve(doc, &api, now, policy()).await;
        assert_eq!(resolution.state, SessionState::Legacy(mirrored_user()));
        assert_eq!(resolution.change, DocChange::Updated);
        assert!(resolution.doc.token.is_none());
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_document_is_signed_out() {
        let resolution = resolve(
            BrowserSession::default(),
            &StubApi::accepting(),
            Utc::now(),
            policy(),
        )
        .await;
        assert_eq!(resolution.state, SessionState::SignedOut);
    }

    #[tokio::test]
    async fn test_malformed_document_reads_as_signed_out() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        session
            .insert(
                BROWSER_SESSION_KEY,
                serde_json::json!({"token": 42, "user": "ana@example.com"}),
            )
            .await
            .unwrap();
        let store = SessionStore::new(session);

        let doc = store.read().await;
        assert_eq!(doc, BrowserSession::default());

        let api = StubApi::accepting();
        let resolution = resolve(doc, &api, Utc::now(), policy()).await;
        assert_eq!(resolution.state, SessionState::SignedOut);
        assert_eq!(resolution.change, DocChange::Unchanged);
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_signout_publishes_user() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let store = SessionStore::new(session);
        store
            .write(&BrowserSession {
                user: Some(mirrored_user()),
                ..BrowserSession::default()
            })
            .await
            .unwrap();

        let events = SessionEvents::new(4);
        let mut rx = events.subscribe();
        signout(&store, &events, SignOutReason::UserRequested)
            .await
            .unwrap();

        assert_eq!(store.read().await, BrowserSession::default());
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::SignedOut {
                user_id: Some(UserId::new("usr_ana")),
                reason: SignOutReason::UserRequested,
            }
        );
    }
}
