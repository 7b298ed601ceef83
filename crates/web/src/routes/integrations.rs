//! Connected payment providers.
//!
//! Stripe is connected through the payments API's OAuth flow and its
//! status always comes from the API. `PayPal` and Shopify connections are
//! simulated and only recorded in the account document.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::Redirect,
};
use rackz_core::Provider;
use serde::Deserialize;
use tracing::instrument;

use crate::api::StripeAccount;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireUser;
use crate::routes::Nav;
use crate::services::integrations::{
    ProviderStatus, connect_simulated, disconnect as disconnect_provider, generate_oauth_state,
    provider_statuses, sync_stripe, verify_oauth_state,
};
use crate::state::AppState;

/// Path the payments API returns the browser to.
const STRIPE_CALLBACK_PATH: &str = "/integrations/stripe/callback";

/// Outcome flags set by the connect flows.
#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    pub connected: Option<String>,
    pub disconnected: Option<String>,
    pub error: Option<String>,
}

/// Integrations page template.
#[derive(Template, WebTemplate)]
#[template(path = "integrations/index.html")]
pub struct IntegrationsTemplate {
    pub nav: Nav,
    pub providers: Vec<ProviderStatus>,
    pub stripe: StripeAccount,
    pub notice: Option<String>,
    pub error: Option<String>,
}

fn notice(query: &IndexQuery) -> Option<String> {
    let connected = query.connected.as_deref().and_then(|p| p.parse::<Provider>().ok());
    if let Some(provider) = connected {
        return Some(format!("{} is connected.", provider.display_name()));
    }
    let disconnected = query.disconnected.as_deref().and_then(|p| p.parse::<Provider>().ok());
    disconnected.map(|provider| format!("{} was disconnected.", provider.display_name()))
}

fn error_message(code: &str) -> String {
    match code {
        "state" => "The Stripe connection could not be verified. Please try again.",
        "denied" => "Stripe access was not granted.",
        "not_connected" => "Stripe did not finish connecting. Please try again.",
        _ => "Something went wrong while connecting. Please try again.",
    }
    .to_string()
}

/// List providers and their connection state.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireUser { session, user }: RequireUser,
    Query(query): Query<IndexQuery>,
) -> Result<IntegrationsTemplate> {
    let token = session.require_token()?;
    let (stripe, account) =
        sync_stripe(state.api(), state.accounts(), &user.id, token, false).await?;

    Ok(IntegrationsTemplate {
        nav: Nav::for_user(&user, &account, session.doc.current_scratch()),
        providers: provider_statuses(&account),
        stripe,
        notice: notice(&query),
        error: query.error.as_deref().map(error_message),
    })
}

fn parse_provider(raw: &str) -> Result<Provider> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("provider {raw}")))
}

/// Connect a provider.
///
/// Stripe starts the OAuth round trip; other providers are recorded
/// directly.
#[instrument(skip_all, fields(user_id = %user.id, provider = %provider))]
pub async fn connect(
    State(state): State<AppState>,
    RequireUser { mut session, user }: RequireUser,
    Path(provider): Path<String>,
) -> Result<Redirect> {
    let provider = parse_provider(&provider)?;

    if provider.is_authoritative() {
        let token = session.require_token()?.to_owned();
        let oauth_state = generate_oauth_state();
        session.doc.oauth_state = Some(oauth_state.clone());
        session.save().await?;

        let callback = state.config().absolute_url(STRIPE_CALLBACK_PATH);
        let url = state
            .api()
            .stripe_connect_url(&token, &callback, &oauth_state)
            .await?;
        add_breadcrumb("integrations", "Stripe connect started", None);
        return Ok(Redirect::to(&url));
    }

    connect_simulated(state.accounts(), &user.id, provider).await?;
    tracing::info!("Provider connected");
    Ok(Redirect::to(&format!("/integrations?connected={provider}")))
}

/// Disconnect a simulated provider.
#[instrument(skip_all, fields(user_id = %user.id, provider = %provider))]
pub async fn disconnect(
    State(state): State<AppState>,
    RequireUser { user, .. }: RequireUser,
    Path(provider): Path<String>,
) -> Result<Redirect> {
    let provider = parse_provider(&provider)?;
    disconnect_provider(state.accounts(), &user.id, provider).await?;
    tracing::info!("Provider disconnected");
    Ok(Redirect::to(&format!("/integrations?disconnected={provider}")))
}

/// Query of the Stripe OAuth return.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Finish the Stripe OAuth round trip.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn stripe_callback(
    State(state): State<AppState>,
    RequireUser { mut session, user }: RequireUser,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect> {
    let stored = session.doc.oauth_state.take();
    session.save().await?;

    if verify_oauth_state(stored.as_deref(), query.state.as_deref()).is_err() {
        tracing::warn!("Stripe callback with mismatched state");
        return Ok(Redirect::to("/integrations?error=state"));
    }
    if let Some(error) = query.error {
        tracing::info!(error = %error, "Stripe connect declined");
        return Ok(Redirect::to("/integrations?error=denied"));
    }

    let token = session.require_token()?;
    let (stripe, _) = sync_stripe(state.api(), state.accounts(), &user.id, token, true).await?;
    if !stripe.connected {
        return Ok(Redirect::to("/integrations?error=not_connected"));
    }

    add_breadcrumb("integrations", "Stripe connected", None);
    tracing::info!("Stripe connected");
    Ok(Redirect::to("/integrations?connected=stripe"))
}
