//! HTTP route handlers for the web front end.
//!
//! # Route Structure
//!
//! ```text
//! # Marketing
//! GET  /                          - Home page
//! GET  /pricing                   - SaaS plans, monthly and yearly
//! GET  /setup                     - Setup packages
//! GET  /book-demo                 - Redirect to the booking link
//! GET  /blog, /blog/{slug}        - Blog
//! GET  /terms, /privacy           - Legal pages
//! POST /newsletter                - Newsletter signup (HTMX fragment)
//! POST /contact                   - Contact form (JSON)
//!
//! # Auth
//! GET  /signup   POST /signup     - Sign up (package/billing query carried)
//! GET  /signin   POST /signin     - Sign in
//! POST /signout                   - Sign out
//!
//! # SaaS funnel (requires auth)
//! GET  /payment                   - Plan payment page
//! GET  /payment/success           - Payment confirmation return
//! GET  /dashboard                 - Plan dashboard (or redirect to setup dashboard)
//! GET  /dashboard/panels/{panel}  - Panel fragment (HTMX)
//!
//! # Setup funnel (requires auth)
//! GET  /setup/form     POST /setup/form     - Four-step setup form
//! GET  /setup/payment  POST /setup/payment  - Upfront payment
//! GET  /setup/status                        - Three-stage status page
//! GET  /setup-dashboard                     - Setup dashboard
//!
//! # Integrations (requires auth)
//! GET  /integrations
//! POST /integrations/{provider}/connect
//! POST /integrations/{provider}/disconnect
//! GET  /integrations/stripe/callback
//!
//! # JSON API
//! GET  /api/session               - Session and resolved dashboard
//! GET  /api/dashboard             - Panels of the resolved plan
//! GET  /api/disputes?status=      - Disputes in one bucket
//! ```

pub mod api;
pub mod auth;
pub mod blog;
pub mod contact;
pub mod dashboard;
pub mod home;
pub mod integrations;
pub mod newsletter;
pub mod pages;
pub mod payment;
pub mod setup;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::auth_rate_limiter;
use crate::models::{AccountState, SessionUser, UserScratch};
use crate::services::CurrentSession;
use crate::services::routing::dashboard_href;
use crate::state::AppState;

/// Header navigation shared by full-page templates.
#[derive(Debug, Clone)]
pub struct Nav {
    /// First name of the signed-in user.
    pub user_name: Option<String>,
    /// Target of the "Dashboard" link.
    pub dashboard_href: String,
}

impl Nav {
    #[must_use]
    pub fn signed_out() -> Self {
        Self {
            user_name: None,
            dashboard_href: "/signin".to_string(),
        }
    }

    #[must_use]
    pub fn for_user(
        user: &SessionUser,
        account: &AccountState,
        scratch: Option<&UserScratch>,
    ) -> Self {
        Self {
            user_name: Some(user.first_name().to_string()),
            dashboard_href: dashboard_href(account, scratch),
        }
    }

    /// Navigation for the current session. Account read failures degrade to
    /// an empty account.
    pub async fn load(state: &AppState, session: &CurrentSession) -> Self {
        let Some(user) = session.user() else {
            return Self::signed_out();
        };
        let account = state.accounts().load(&user.id).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not load account for navigation");
            AccountState::default()
        });
        Self::for_user(user, &account, session.doc.current_scratch())
    }
}

/// Sign-in and sign-up routes. Form posts are rate limited.
fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/signup", post(auth::signup))
        .route("/signin", post(auth::signin))
        .route_layer(auth_rate_limiter());

    Router::new()
        .route("/signup", get(auth::signup_page))
        .route("/signin", get(auth::signin_page))
        .route("/signout", post(auth::signout))
        .merge(limited)
}

/// Setup funnel routes.
fn setup_routes() -> Router<AppState> {
    Router::new()
        .route("/setup", get(setup::packages))
        .route("/setup/form", get(setup::form_page).post(setup::form_submit))
        .route("/setup/payment", get(setup::payment_page).post(setup::pay))
        .route("/setup/status", get(setup::status))
        .route("/setup-dashboard", get(setup::dashboard))
}

/// Provider integration routes.
fn integration_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(integrations::index))
        .route("/stripe/callback", get(integrations::stripe_callback))
        .route("/{provider}/connect", post(integrations::connect))
        .route("/{provider}/disconnect", post(integrations::disconnect))
}

/// JSON API routes.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(api::session))
        .route("/dashboard", get(api::dashboard))
        .route("/disputes", get(api::disputes))
}

/// Create all page and API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Marketing
        .route("/", get(home::home))
        .route("/pricing", get(home::pricing))
        .route("/book-demo", get(home::book_demo))
        .route("/blog", get(blog::index))
        .route("/blog/{slug}", get(blog::show))
        .route("/terms", get(pages::terms))
        .route("/privacy", get(pages::privacy))
        .route("/newsletter", post(newsletter::subscribe))
        .route("/contact", post(contact::submit))
        // Auth
        .merge(auth_routes())
        // SaaS funnel
        .route("/payment", get(payment::show))
        .route("/payment/success", get(payment::success))
        .route("/dashboard", get(dashboard::index))
        .route("/dashboard/panels/{panel}", get(dashboard::panel))
        // Setup funnel
        .merge(setup_routes())
        // Integrations
        .nest("/integrations", integration_routes())
        // JSON API
        .nest("/api", api_routes())
}
