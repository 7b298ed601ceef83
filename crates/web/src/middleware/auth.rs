//! Session extractors.
//!
//! [`CurrentSession`] resolves the browser's session document once per
//! request (see [`crate::services::session::resolve`]) and caches the result
//! in the request extensions. [`RequireUser`] additionally rejects signed-out
//! browsers.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use tower_sessions::Session;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::events::{SessionEvent, SignOutReason};
use crate::models::SessionUser;
use crate::services::session::{
    CurrentSession, DocChange, Resolution, SessionPolicy, SessionStore, resolve,
};
use crate::state::AppState;

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(current) = parts.extensions.get::<Self>() {
            return Ok(current.clone());
        }

        // Set by SessionManagerLayer
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer not installed".to_string()))?;
        let store = SessionStore::new(session);

        let policy = SessionPolicy::from(&state.config().session);
        let Resolution {
            state: resolved,
            doc,
            change,
        } = resolve(store.read().await, state.api(), Utc::now(), policy).await;

        match change {
            DocChange::Unchanged => {}
            DocChange::Updated => store.write(&doc).await?,
            DocChange::Cleared { user_id } => {
                store.invalidate().await?;
                state.events().publish(SessionEvent::SignedOut {
                    user_id,
                    reason: SignOutReason::TokenRejected,
                });
                clear_sentry_user();
            }
        }

        if let Some(user) = resolved.user() {
            set_sentry_user(&user.id, None);
        }

        let current = Self {
            store,
            doc,
            state: resolved,
        };
        parts.extensions.insert(current.clone());
        Ok(current)
    }
}

/// Extractor that requires a signed-in user.
///
/// Legacy sessions (a user mirror without a token) pass; their first API
/// call fails as unauthorized and signs them out.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireUser { user, .. }: RequireUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.first_name())
/// }
/// ```
pub struct RequireUser {
    pub session: CurrentSession,
    pub user: SessionUser,
}

/// Rejection when a signed-in user is required.
pub enum AuthRejection {
    /// Redirect to sign-in, returning to `next` afterwards (HTML requests).
    RedirectToSignin { next: String },
    /// Unauthorized response (API requests).
    Unauthorized,
    /// The session could not be resolved.
    Error(AppError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToSignin { next } => {
                Redirect::to(&format!("/signin?next={}", urlencoding::encode(&next)))
                    .into_response()
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Error(e) => e.into_response(),
        }
    }
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = CurrentSession::from_request_parts(parts, state)
            .await
            .map_err(AuthRejection::Error)?;

        let Some(user) = session.user().cloned() else {
            // Nested routers see the path with their prefix stripped
            let uri = parts
                .extensions
                .get::<OriginalUri>()
                .map_or(&parts.uri, |OriginalUri(uri)| uri);
            if uri.path().starts_with("/api/") {
                return Err(AuthRejection::Unauthorized);
            }
            let next = uri
                .path_and_query()
                .map_or_else(|| "/".to_string(), ToString::to_string);
            return Err(AuthRejection::RedirectToSignin { next });
        };

        Ok(Self { session, user })
    }
}

/// Only same-site absolute paths are accepted as post-sign-in targets.
#[must_use]
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, http::Request, routing::get};
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    use super::*;
    use crate::state::tests::test_state;

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/dashboard?package=pro")), Some("/dashboard?package=pro"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(None), None);
    }

    async fn whoami(RequireUser { user, .. }: RequireUser) -> String {
        user.id.to_string()
    }

    fn nested_app() -> Router {
        let state = test_state();
        Router::new()
            .nest("/api", Router::new().route("/dashboard", get(whoami)))
            .nest("/integrations", Router::new().route("/{provider}", get(whoami)))
            .layer(SessionManagerLayer::new(MemoryStore::default()))
            .with_state(state)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_signed_out_api_request_is_unauthorized() {
        let response = nested_app()
            .oneshot(get_req("/api/dashboard"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signed_out_nested_page_keeps_full_next() {
        let response = nested_app()
            .oneshot(get_req("/integrations/paypal?from=nav"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get("location").and_then(|v| v.to_str().ok()),
            Some("/signin?next=%2Fintegrations%2Fpaypal%3Ffrom%3Dnav")
        );
    }

    #[test]
    fn test_redirect_rejection_encodes_next() {
        let response = AuthRejection::RedirectToSignin {
            next: "/dashboard?package=pro".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get("location").and_then(|v| v.to_str().ok()),
            Some("/signin?next=%2Fdashboard%3Fpackage%3Dpro")
        );
    }
}
