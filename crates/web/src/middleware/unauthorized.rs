//! Global sign-out when the payments API rejects the session's token.
//!
//! Handlers propagate `ApiError::Unauthorized` as an [`AppError`]; its
//! response carries an [`AuthFailure`] marker. This middleware sees the
//! marker on the way out, ends the session and replaces the response.
//!
//! [`AppError`]: crate::error::AppError

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::error::AuthFailure;
use crate::events::SignOutReason;
use crate::services::session::{SessionStore, signout};
use crate::state::AppState;

/// Where browsers land after a forced sign-out.
pub const EXPIRED_SIGNIN_PATH: &str = "/signin?expired=1";

/// Sign out and redirect (HTML) or answer 401 (`/api/`) on auth failure.
///
/// Must run inside the session layer.
pub async fn signout_on_auth_failure(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let session = request.extensions().get::<Session>().cloned();
    let is_api = request.uri().path().starts_with("/api/");
    let is_htmx = request.headers().contains_key("hx-request");

    let response = next.run(request).await;
    if response.extensions().get::<AuthFailure>().is_none() {
        return response;
    }

    if let Some(session) = session
        && let Err(e) = signout(
            &SessionStore::new(session),
            state.events(),
            SignOutReason::Unauthorized,
        )
        .await
    {
        tracing::error!(error = %e, "Failed to end session after auth failure");
    }

    if is_api {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "unauthorized" })),
        )
            .into_response();
    }
    if is_htmx {
        let mut response = StatusCode::UNAUTHORIZED.into_response();
        response
            .headers_mut()
            .insert("hx-redirect", HeaderValue::from_static(EXPIRED_SIGNIN_PATH));
        return response;
    }
    Redirect::to(EXPIRED_SIGNIN_PATH).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, middleware::from_fn_with_state, routing::get};
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    use super::*;
    use crate::api::ApiError;
    use crate::error::AppError;
    use crate::events::SessionEvent;
    use crate::state::tests::test_state;

    async fn rejected() -> Result<&'static str, AppError> {
        Err(AppError::Api(ApiError::Unauthorized))
    }

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/dashboard", get(rejected))
            .route("/api/dashboard", get(rejected))
            .route("/ok", get(|| async { "ok" }))
            .layer(from_fn_with_state(state.clone(), signout_on_auth_failure))
            .layer(SessionManagerLayer::new(MemoryStore::default()))
            .with_state(state)
    }

    fn get_req(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_html_redirects_to_signin() {
        let state = test_state();
        let mut rx = state.events().subscribe();

        let response = app(state).oneshot(get_req("/dashboard")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get("location").unwrap(), EXPIRED_SIGNIN_PATH);

        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::SignedOut {
                user_id: None,
                reason: SignOutReason::Unauthorized
            }
        );
    }

    #[tokio::test]
    async fn test_api_gets_401() {
        let response = app(test_state())
            .oneshot(get_req("/api/dashboard"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_htmx_gets_redirect_header() {
        let request = Request::builder()
            .uri("/dashboard")
            .header("hx-request", "true")
            .body(Body::empty())
            .unwrap();
        let response = app(test_state()).oneshot(request).await.unwrap();
        assert_eq!(response.headers().get("hx-redirect").unwrap(), EXPIRED_SIGNIN_PATH);
    }

    #[tokio::test]
    async fn test_other_responses_untouched() {
        let response = app(test_state()).oneshot(get_req("/ok")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
