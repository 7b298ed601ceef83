//! Form relay client.
//!
//! Newsletter signups and contact messages are forwarded as JSON to a
//! configured relay endpoint that fans them out to the mailing list and the
//! support inbox.

use std::time::Duration;

use rackz_core::Email;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur when relaying a form.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No relay endpoint is configured.
    #[error("form relay not configured")]
    NotConfigured,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The relay returned an error response.
    #[error("relay error: {status} - {message}")]
    Relay { status: u16, message: String },
}

impl RelayError {
    /// Message safe to show to the visitor.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::NotConfigured => "Service temporarily unavailable.",
            Self::Http(_) | Self::Relay { .. } => "Something went wrong. Please try again.",
        }
    }
}

/// A contact form submission.
#[derive(Debug, Clone, Serialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: Email,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub message: String,
    /// Page the form was submitted from.
    pub source: String,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RelayPayload<'a> {
    Newsletter { email: &'a Email },
    Contact(&'a ContactMessage),
}

/// Client for the form relay.
#[derive(Clone)]
pub struct FormRelay {
    client: reqwest::Client,
    url: Option<String>,
}

impl FormRelay {
    /// Create a relay client. `url` of `None` makes every submission fail
    /// with [`RelayError::NotConfigured`].
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    /// Subscribe an address to the newsletter.
    ///
    /// An address that is already subscribed counts as success.
    ///
    /// # Errors
    ///
    /// Returns `RelayError` if the relay is missing or fails.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn subscribe(&self, email: &Email) -> Result<(), RelayError> {
        match self.post(&RelayPayload::Newsletter { email }).await {
            Err(RelayError::Relay { status: 409, .. }) => {
                tracing::info!("Address already subscribed - treating as success");
                Ok(())
            }
            other => other,
        }
    }

    /// Forward a contact message.
    ///
    /// # Errors
    ///
    /// Returns `RelayError` if the relay is missing or fails.
    #[instrument(skip(self, message), fields(email = %message.email))]
    pub async fn contact(&self, message: &ContactMessage) -> Result<(), RelayError> {
        self.post(&RelayPayload::Contact(message)).await
    }

    async fn post(&self, payload: &RelayPayload<'_>) -> Result<(), RelayError> {
        let url = self.url.as_deref().ok_or(RelayError::NotConfigured)?;
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        let message = message.chars().take(200).collect();
        if status != StatusCode::CONFLICT {
            tracing::warn!(status = %status, "Form relay returned an error");
        }
        Err(RelayError::Relay {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_relay() {
        let relay = FormRelay::new(None, Duration::from_secs(1)).unwrap();
        let email = Email::parse("ana@example.com").unwrap();
        let err = relay.subscribe(&email).await.unwrap_err();
        assert!(matches!(err, RelayError::NotConfigured));
        assert_eq!(err.user_message(), "Service temporarily unavailable.");
    }

    #[test]
    fn test_payload_shape() {
        let email = Email::parse("ana@example.com").unwrap();
        let json = serde_json::to_value(RelayPayload::Newsletter { email: &email }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "newsletter", "email": "ana@example.com"})
        );
    }
}
