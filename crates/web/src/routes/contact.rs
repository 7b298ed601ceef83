//! Contact form handler (JSON).

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use rackz_core::Email;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::services::relay::{ContactMessage, RelayError};
use crate::state::AppState;

/// Longest accepted message.
const MAX_MESSAGE_LEN: usize = 5000;

/// Contact form body.
#[derive(Debug, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub message: String,
    /// Page the form was submitted from.
    #[serde(default)]
    pub source: Option<String>,
}

/// Contact form result.
#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContactResponse {
    fn failed(status: StatusCode, message: &str) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                ok: false,
                error: Some(message.to_string()),
            }),
        )
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate a submission into a relay message.
fn validate(form: ContactForm) -> Result<ContactMessage, &'static str> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err("Please enter your name.");
    }
    let email = Email::parse(&form.email).map_err(|_| "Please enter a valid email address.")?;
    let message = form.message.trim();
    if message.is_empty() {
        return Err("Please enter a message.");
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err("Messages are limited to 5000 characters.");
    }
    Ok(ContactMessage {
        name: name.to_string(),
        email,
        company: non_empty(form.company),
        phone: non_empty(form.phone),
        message: message.to_string(),
        source: non_empty(form.source).unwrap_or_else(|| "contact".to_string()),
    })
}

/// Forward a contact message to the relay.
#[instrument(skip_all)]
pub async fn submit(
    State(state): State<AppState>,
    Json(form): Json<ContactForm>,
) -> impl IntoResponse {
    let message = match validate(form) {
        Ok(message) => message,
        Err(reason) => return ContactResponse::failed(StatusCode::BAD_REQUEST, reason),
    };

    match state.relay().contact(&message).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ContactResponse {
                ok: true,
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Contact relay failed");
            let status = match e {
                RelayError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                RelayError::Http(_) | RelayError::Relay { .. } => StatusCode::BAD_GATEWAY,
            };
            ContactResponse::failed(status, e.user_message())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(name: &str, email: &str, message: &str) -> ContactForm {
        ContactForm {
            name: name.to_string(),
            email: email.to_string(),
            company: Some("  ".to_string()),
            phone: None,
            message: message.to_string(),
            source: None,
        }
    }

    #[test]
    fn test_validate() {
        let message = validate(form(" Ana ", "ana@example.com", " Hi ")).unwrap();
        assert_eq!(message.name, "Ana");
        assert_eq!(message.message, "Hi");
        assert!(message.company.is_none());
        assert_eq!(message.source, "contact");

        assert_eq!(
            validate(form("Ana", "not-an-email", "Hi")).unwrap_err(),
            "Please enter a valid email address."
        );
        assert_eq!(
            validate(form("", "ana@example.com", "Hi")).unwrap_err(),
            "Please enter your name."
        );
        assert_eq!(
            validate(form("Ana", "ana@example.com", &"x".repeat(5001))).unwrap_err(),
            "Messages are limited to 5000 characters."
        );
    }
}
