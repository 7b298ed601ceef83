//! Newsletter subscription route handler.
//!
//! The form lives in the site footer and is swapped for a success or error
//! fragment via HTMX.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Form, extract::State, response::IntoResponse};
use rackz_core::Email;
use serde::Deserialize;
use tracing::instrument;

use crate::state::AppState;

/// Newsletter subscription form data.
#[derive(Debug, Deserialize)]
pub struct SubscribeForm {
    pub email: String,
}

/// Success fragment template.
#[derive(Template, WebTemplate)]
#[template(path = "newsletter/success.html")]
pub struct SubscribeSuccessTemplate {
    pub email: String,
}

/// Error fragment template.
#[derive(Template, WebTemplate)]
#[template(path = "newsletter/error.html")]
pub struct SubscribeErrorTemplate {
    pub message: String,
    pub email: String,
}

/// Subscribe to the newsletter (HTMX).
///
/// Addresses that are already subscribed are shown the success fragment.
#[instrument(skip(state, form))]
pub async fn subscribe(
    State(state): State<AppState>,
    Form(form): Form<SubscribeForm>,
) -> impl IntoResponse {
    let Ok(email) = Email::parse(&form.email) else {
        return SubscribeErrorTemplate {
            message: "Please enter a valid email address.".to_string(),
            email: form.email.trim().to_string(),
        }
        .into_response();
    };

    match state.relay().subscribe(&email).await {
        Ok(()) => {
            tracing::info!(domain = email.domain(), "Newsletter subscription successful");
            SubscribeSuccessTemplate {
                email: email.into_inner(),
            }
            .into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Newsletter subscription failed");
            SubscribeErrorTemplate {
                message: e.user_message().to_string(),
                email: email.into_inner(),
            }
            .into_response()
        }
    }
}
