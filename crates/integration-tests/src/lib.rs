//! End-to-end tests for the Rackz web front end.
//!
//! Each test gets a [`TestContext`]: the real application router over
//! in-memory stores, talking to a fake payments API. Both listen on
//! loopback ports picked by the OS, and the test client keeps cookies so
//! it behaves like one browser.
//!
//! ```bash
//! cargo test -p rackz-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_sessions::{MemoryStore, SessionManagerLayer};

use rackz_web::config::WebConfig;
use rackz_web::content::ContentStore;
use rackz_web::middleware::create_session_layer;
use rackz_web::services::AccountStore;
use rackz_web::state::AppState;

/// A user registered with the fake payments API.
#[derive(Debug, Clone)]
struct FakeUser {
    id: String,
    name: String,
    email: String,
    password: String,
    company: Option<String>,
}

impl FakeUser {
    fn json(&self) -> Value {
        json!({
            "id": self.id,
            "email": self.email,
            "name": self.name,
            "company": self.company,
            "entitlements": { "saasPlan": null, "setupEligible": true },
        })
    }
}

/// Mutable state behind the fake payments API.
#[derive(Debug, Default)]
pub struct FakeApiState {
    users: Vec<FakeUser>,
    /// Bearer token to user id.
    tokens: HashMap<String, String>,
    /// Every token is rejected with 401 while set.
    pub revoked: bool,
    pub stripe_connected: bool,
    /// Raw Stripe charge objects returned by `/stripe/charges`.
    pub charges: Vec<Value>,
    /// Raw Stripe subscription objects returned by `/stripe/subscriptions`.
    pub subscriptions: Vec<Value>,
}

/// Handle to the fake payments API.
#[derive(Debug, Clone, Default)]
pub struct FakeApi {
    inner: Arc<Mutex<FakeApiState>>,
}

impl FakeApi {
    /// Lock the fake's state for inspection or changes.
    pub fn state(&self) -> MutexGuard<'_, FakeApiState> {
        self.inner.lock().unwrap()
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/auth/signup", post(fake_signup))
            .route("/auth/signin", post(fake_signin))
            .route("/auth/me", get(fake_me))
            .route("/stripe/connect-url", get(fake_connect_url))
            .route("/stripe/account", get(fake_stripe_account))
            .route("/stripe/charges", get(fake_charges))
            .route("/stripe/subscriptions", get(fake_subscriptions))
            .with_state(self.clone())
    }

    /// The user id behind the request's bearer token.
    fn authorize(&self, headers: &HeaderMap) -> Result<String, Response> {
        let state = self.state();
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match token.and_then(|t| state.tokens.get(t)) {
            Some(user_id) if !state.revoked => Ok(user_id.clone()),
            _ => Err(api_error(StatusCode::UNAUTHORIZED, "Invalid token")),
        }
    }
}

fn api_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

#[derive(Debug, Deserialize)]
struct SignupBody {
    name: String,
    email: String,
    password: String,
    company: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SigninBody {
    email: String,
    password: String,
}

fn issue_token(state: &mut FakeApiState, user: &FakeUser) -> Value {
    let token = format!("tok_{}_{}", user.id, state.tokens.len());
    state.tokens.insert(token.clone(), user.id.clone());
    json!({ "token": token, "user": user.json() })
}

async fn fake_signup(State(api): State<FakeApi>, Json(body): Json<SignupBody>) -> Response {
    let mut state = api.state();
    if state.users.iter().any(|u| u.email == body.email) {
        return api_error(StatusCode::CONFLICT, "An account with this email already exists.");
    }
    let user = FakeUser {
        id: format!("usr_{}", state.users.len() + 1),
        name: body.name,
        email: body.email,
        password: body.password,
        company: body.company,
    };
    state.users.push(user.clone());
    (StatusCode::CREATED, Json(issue_token(&mut state, &user))).into_response()
}

async fn fake_signin(State(api): State<FakeApi>, Json(body): Json<SigninBody>) -> Response {
    let mut state = api.state();
    let Some(user) = state
        .users
        .iter()
        .find(|u| u.email == body.email && u.password == body.password)
        .cloned()
    else {
        return api_error(StatusCode::UNAUTHORIZED, "Invalid credentials");
    };
    Json(issue_token(&mut state, &user)).into_response()
}

async fn fake_me(State(api): State<FakeApi>, headers: HeaderMap) -> Response {
    let user_id = match api.authorize(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let state = api.state();
    state
        .users
        .iter()
        .find(|u| u.id == user_id)
        .map_or_else(
            || api_error(StatusCode::UNAUTHORIZED, "Unknown user"),
            |u| Json(u.json()).into_response(),
        )
}

#[derive(Debug, Deserialize)]
struct ConnectUrlQuery {
    redirect_uri: String,
    state: String,
}

async fn fake_connect_url(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    axum::extract::Query(query): axum::extract::Query<ConnectUrlQuery>,
) -> Response {
    if let Err(response) = api.authorize(&headers) {
        return response;
    }
    let url = format!(
        "https://connect.stripe.test/oauth/authorize?redirect_uri={}&state={}",
        query.redirect_uri, query.state
    );
    Json(json!({ "url": url })).into_response()
}

async fn fake_stripe_account(State(api): State<FakeApi>, headers: HeaderMap) -> Response {
    if let Err(response) = api.authorize(&headers) {
        return response;
    }
    let connected = api.state().stripe_connected;
    Json(json!({
        "connected": connected,
        "account_id": connected.then_some("acct_test"),
        "business_name": connected.then_some("Test Shop"),
        "charges_enabled": connected,
    }))
    .into_response()
}

async fn fake_charges(State(api): State<FakeApi>, headers: HeaderMap) -> Response {
    if let Err(response) = api.authorize(&headers) {
        return response;
    }
    Json(json!({ "data": api.state().charges })).into_response()
}

async fn fake_subscriptions(State(api): State<FakeApi>, headers: HeaderMap) -> Response {
    if let Err(response) = api.authorize(&headers) {
        return response;
    }
    Json(json!({ "data": api.state().subscriptions })).into_response()
}

/// A Stripe charge carrying a dispute in `status`.
#[must_use]
pub fn disputed_charge(id: &str, dispute_status: &str, created: i64) -> Value {
    json!({
        "id": id,
        "amount": 4_900,
        "amount_refunded": 0,
        "currency": "usd",
        "status": "succeeded",
        "created": created,
        "receipt_email": "buyer@example.com",
        "dispute": {
            "id": format!("dp_{id}"),
            "amount": 4_900,
            "currency": "usd",
            "status": dispute_status,
            "reason": "fraudulent",
            "created": created + 3_600,
        },
    })
}

async fn serve(listener: TcpListener, router: Router) {
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
}

/// A running application plus its fake payments API.
pub struct TestContext {
    pub client: reqwest::Client,
    pub base_url: String,
    pub api: FakeApi,
    pub accounts: AccountStore,
}

impl TestContext {
    /// Start the fake API and the application.
    pub async fn new() -> Self {
        let api = FakeApi::default();
        let api_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_url = format!("http://{}", api_listener.local_addr().unwrap());
        serve(api_listener, api.router()).await;

        let app_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", app_listener.local_addr().unwrap());

        let config = WebConfig::from_source(|key| match key {
            "RACKZ_DATABASE_URL" => Some("postgres://localhost/rackz_unused".to_string()),
            "RACKZ_BASE_URL" => Some(base_url.clone()),
            "RACKZ_API_URL" => Some(api_url.clone()),
            "RACKZ_API_TIMEOUT_SECS" => Some("5".to_string()),
            _ => None,
        })
        .unwrap();
        let session_layer: SessionManagerLayer<MemoryStore> =
            create_session_layer(MemoryStore::default(), &config);
        let accounts = AccountStore::memory();
        let state = AppState::new(config, accounts.clone(), ContentStore::default()).unwrap();
        serve(app_listener, rackz_web::app(state, session_layer)).await;

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .unwrap();

        Self {
            client,
            base_url,
            api,
            accounts,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client.post(self.url(path)).form(form).send().await.unwrap()
    }

    /// Sign up a fresh user with no plan selected.
    pub async fn sign_up(&self, email: &str) -> reqwest::Response {
        self.post_form(
            "/signup",
            &[
                ("name", "Dana Reyes"),
                ("email", email),
                ("password", "correct horse"),
                ("company", "Reyes Goods"),
            ],
        )
        .await
    }
}

/// The `Location` header of a redirect.
#[must_use]
pub fn location(response: &reqwest::Response) -> Option<&str> {
    response.headers().get("location").and_then(|v| v.to_str().ok())
}
