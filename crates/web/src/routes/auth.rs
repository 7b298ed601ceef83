//! Sign-up, sign-in and sign-out.
//!
//! Credentials are forwarded to the payments API; only the returned token
//! and a sanitized user mirror are kept in the session. A plan chosen on the
//! pricing page travels through sign-up as `?package=&billing=` and is
//! persisted before the user reaches the payment page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use rackz_core::{BillingCycle, Email, SaasPackage};
use serde::Deserialize;
use tracing::instrument;

use crate::api::{ApiError, SigninRequest, SignupRequest};
use crate::error::{Result, add_breadcrumb};
use crate::events::SignOutReason;
use crate::filters;
use crate::middleware::safe_next;
use crate::models::SignupIntent;
use crate::routes::Nav;
use crate::services::CurrentSession;
use crate::services::session::{establish, signout as end_session};
use crate::state::AppState;

/// Shortest accepted password.
const MIN_PASSWORD_LEN: usize = 8;

// =============================================================================
// Form Types
// =============================================================================

/// Plan carried from the pricing page.
#[derive(Debug, Default, Deserialize)]
pub struct PlanQuery {
    pub package: Option<String>,
    pub billing: Option<String>,
    pub next: Option<String>,
}

impl PlanQuery {
    fn plan(&self) -> Option<(SaasPackage, BillingCycle)> {
        let package = self.package.as_deref()?.parse().ok()?;
        let billing = self
            .billing
            .as_deref()
            .and_then(|b| b.parse().ok())
            .unwrap_or_default();
        Some((package, billing))
    }
}

/// Sign-up form data.
#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(flatten)]
    pub plan: PlanQuery,
}

/// Sign-in form data.
#[derive(Debug, Deserialize)]
pub struct SigninForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Sign-in page query.
#[derive(Debug, Default, Deserialize)]
pub struct SigninQuery {
    pub next: Option<String>,
    pub expired: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Sign-up page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub nav: Nav,
    pub error: Option<String>,
    pub name: String,
    pub email: String,
    pub company: String,
    pub package: String,
    pub billing: String,
    pub next: String,
    /// e.g. "Pro, $626/yr"
    pub plan_summary: Option<String>,
}

impl SignupTemplate {
    fn new(plan: &PlanQuery) -> Self {
        Self {
            nav: Nav::signed_out(),
            error: None,
            name: String::new(),
            email: String::new(),
            company: String::new(),
            package: plan.package.clone().unwrap_or_default(),
            billing: plan.billing.clone().unwrap_or_default(),
            next: plan.next.clone().unwrap_or_default(),
            plan_summary: plan.plan().map(|(package, billing)| {
                format!(
                    "{}, {}{}",
                    package.display_name(),
                    package.price(billing).display(),
                    billing.period_suffix()
                )
            }),
        }
    }
}

/// Sign-in page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/signin.html")]
pub struct SigninTemplate {
    pub nav: Nav,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub email: String,
    pub next: String,
}

// =============================================================================
// Helpers
// =============================================================================

/// Where to go after sign-in or sign-up.
fn destination(plan: &PlanQuery) -> String {
    if let Some((package, billing)) = plan.plan() {
        return format!("/payment?package={package}&billing={billing}");
    }
    safe_next(plan.next.as_deref()).unwrap_or("/dashboard").to_string()
}

// =============================================================================
// Sign up
// =============================================================================

/// Display the sign-up page.
pub async fn signup_page(session: CurrentSession, Query(query): Query<PlanQuery>) -> Response {
    if session.user().is_some() {
        return Redirect::to(&destination(&query)).into_response();
    }
    SignupTemplate::new(&query).into_response()
}

/// Create an account.
#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    session: CurrentSession,
    Form(form): Form<SignupForm>,
) -> Result<Response> {
    let mut page = SignupTemplate::new(&form.plan);
    page.name.clone_from(&form.name);
    page.email.clone_from(&form.email);
    page.company = form.company.clone().unwrap_or_default();

    let name = form.name.trim();
    if name.is_empty() {
        page.error = Some("Please enter your name.".to_string());
        return Ok(page.into_response());
    }
    let Ok(email) = Email::parse(&form.email) else {
        page.error = Some("Please enter a valid email address.".to_string());
        return Ok(page.into_response());
    };
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        page.error = Some(format!(
            "Passwords must be at least {MIN_PASSWORD_LEN} characters."
        ));
        return Ok(page.into_response());
    }

    let request = SignupRequest {
        name: name.to_string(),
        email,
        password: form.password,
        company: form
            .company
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
    };
    let auth = match state.api().signup(&request).await {
        Ok(auth) => auth,
        Err(ApiError::Conflict(_)) => {
            page.error = Some(
                "An account with this email already exists. Please sign in.".to_string(),
            );
            return Ok(page.into_response());
        }
        Err(ApiError::Rejected(message)) => {
            page.error = Some(message);
            return Ok(page.into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let now = Utc::now();
    let user = establish(&session.store, auth, now).await?;

    if let Some((package, billing)) = form.plan.plan() {
        let mut doc = session.store.read().await;
        doc.scratch_mut(&user.id).signup = Some(SignupIntent {
            package,
            billing,
            created_at: now,
        });
        session.store.write(&doc).await?;

        state
            .accounts()
            .update(&user.id, |account| {
                account.package = Some(package);
                account.billing = Some(billing);
            })
            .await?;
        add_breadcrumb("auth", "Signed up with plan", Some(&[("package", package.as_str())]));
    }

    tracing::info!(user_id = %user.id, "Signed up");
    Ok(Redirect::to(&destination(&form.plan)).into_response())
}

// =============================================================================
// Sign in
// =============================================================================

/// Display the sign-in page.
pub async fn signin_page(session: CurrentSession, Query(query): Query<SigninQuery>) -> Response {
    if session.user().is_some() && query.expired.is_none() {
        let next = safe_next(query.next.as_deref()).unwrap_or("/dashboard");
        return Redirect::to(next).into_response();
    }
    SigninTemplate {
        nav: Nav::signed_out(),
        error: None,
        notice: query
            .expired
            .map(|_| "Your session has expired. Please sign in again.".to_string()),
        email: String::new(),
        next: query.next.unwrap_or_default(),
    }
    .into_response()
}

/// Sign in with email and password.
#[instrument(skip_all)]
pub async fn signin(
    State(state): State<AppState>,
    session: CurrentSession,
    Form(form): Form<SigninForm>,
) -> Result<Response> {
    let mut page = SigninTemplate {
        nav: Nav::signed_out(),
        error: None,
        notice: None,
        email: form.email.clone(),
        next: form.next.clone().unwrap_or_default(),
    };

    let Ok(email) = Email::parse(&form.email) else {
        page.error = Some("Please enter a valid email address.".to_string());
        return Ok(page.into_response());
    };

    let request = SigninRequest {
        email,
        password: form.password,
    };
    let auth = match state.api().signin(&request).await {
        Ok(auth) => auth,
        // Bad credentials, not an expired session
        Err(ApiError::Unauthorized | ApiError::Rejected(_)) => {
            page.error = Some("Invalid email or password.".to_string());
            return Ok(page.into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let user = establish(&session.store, auth, Utc::now()).await?;
    tracing::info!(user_id = %user.id, "Signed in");

    let next = safe_next(form.next.as_deref()).unwrap_or("/dashboard");
    Ok(Redirect::to(next).into_response())
}

// =============================================================================
// Sign out
// =============================================================================

/// Sign out and return home.
#[instrument(skip_all)]
pub async fn signout(State(state): State<AppState>, session: CurrentSession) -> Result<Redirect> {
    end_session(&session.store, state.events(), SignOutReason::UserRequested).await?;
    Ok(Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(package: Option<&str>, billing: Option<&str>, next: Option<&str>) -> PlanQuery {
        PlanQuery {
            package: package.map(String::from),
            billing: billing.map(String::from),
            next: next.map(String::from),
        }
    }

    #[test]
    fn test_plan_parsing() {
        assert_eq!(
            plan(Some("pro"), Some("yearly"), None).plan(),
            Some((SaasPackage::Pro, BillingCycle::Yearly))
        );
        assert_eq!(
            plan(Some("scale"), None, None).plan(),
            Some((SaasPackage::Scale, BillingCycle::Monthly))
        );
        assert_eq!(plan(Some("enterprise"), Some("yearly"), None).plan(), None);
    }

    #[test]
    fn test_destination() {
        assert_eq!(
            destination(&plan(Some("pro"), Some("yearly"), Some("/integrations"))),
            "/payment?package=pro&billing=yearly"
        );
        assert_eq!(destination(&plan(None, None, Some("/integrations"))), "/integrations");
        assert_eq!(destination(&plan(None, None, Some("//evil.example"))), "/dashboard");
    }

    #[test]
    fn test_signup_summary() {
        let page = SignupTemplate::new(&plan(Some("pro"), Some("yearly"), None));
        assert_eq!(page.plan_summary.as_deref(), Some("Pro, $626/yr"));
    }
}
