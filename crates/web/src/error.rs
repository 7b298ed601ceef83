//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! An unauthorized answer from the payments API is special: the response
//! carries an [`AuthFailure`] marker, and
//! [`crate::middleware::signout_on_auth_failure`] turns it into a global
//! sign-out.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::api::ApiError;
use crate::db::RepositoryError;
use crate::services::integrations::IntegrationError;
use crate::services::session::SessionError;
use crate::services::setup::SetupError;

/// Response extension marking a request whose upstream call was unauthorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthFailure;

/// Application-level error type for the web front end.
#[derive(Debug, Error)]
pub enum AppError {
    /// Payments API call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Session backend failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Setup funnel refused the request.
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    /// Provider management refused the request.
    #[error("Integration error: {0}")]
    Integration(IntegrationError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The user's plan does not include this.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<IntegrationError> for AppError {
    fn from(err: IntegrationError) -> Self {
        match err {
            IntegrationError::Api(e) => Self::Api(e),
            IntegrationError::Repository(e) => Self::Database(e),
            other => Self::Integration(other),
        }
    }
}

impl AppError {
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Session(_)
                | Self::Internal(_)
                | Self::Api(ApiError::Status { .. } | ApiError::Http(_) | ApiError::Parse(_))
        )
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Api(err) => match err {
                ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
                ApiError::Conflict(_) => StatusCode::CONFLICT,
                ApiError::Rejected(_) => StatusCode::BAD_REQUEST,
                ApiError::Status { .. } | ApiError::Http(_) | ApiError::Parse(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
            Self::Setup(SetupError::Transition(_)) => StatusCode::CONFLICT,
            Self::Setup(_) | Self::Integration(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Message shown to the client. Internal details are never exposed.
    fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Api(err) => match err {
                ApiError::Unauthorized => {
                    "Your session has expired. Please sign in again.".to_string()
                }
                ApiError::Conflict(msg) | ApiError::Rejected(msg) => msg.clone(),
                _ => "External service error".to_string(),
            },
            Self::Setup(err) => err.to_string(),
            Self::Integration(err) => err.to_string(),
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::Forbidden(what) => what.clone(),
            Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let mut response = (self.status(), self.public_message()).into_response();
        if matches!(self, Self::Api(ApiError::Unauthorized)) {
            response.extensions_mut().insert(AuthFailure);
        }
        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("setup", "Setup payment taken", Some(&[("package", "crm")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Api(ApiError::Conflict("taken".into()))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Api(ApiError::Status {
                status: 503,
                message: "down".into()
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Setup(SetupError::NoDraft)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unauthorized_is_marked() {
        let response = AppError::Api(ApiError::Unauthorized).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.extensions().get::<AuthFailure>().is_some());

        let response = AppError::BadRequest("nope".into()).into_response();
        assert!(response.extensions().get::<AuthFailure>().is_none());
    }

    #[test]
    fn test_integration_errors_are_unwrapped() {
        assert!(matches!(
            AppError::from(IntegrationError::Api(ApiError::Unauthorized)),
            AppError::Api(ApiError::Unauthorized)
        ));
        assert!(matches!(
            AppError::from(IntegrationError::StripeManaged),
            AppError::Integration(_)
        ));
    }
}
