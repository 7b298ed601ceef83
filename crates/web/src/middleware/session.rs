//! Session middleware configuration.
//!
//! The cookie-bound session is the long-lived half of a browser's session
//! document: it expires after 30 days of inactivity. The bearer token stored
//! inside it carries its own, shorter lifetime.

use tower_sessions::{Expiry, SessionManagerLayer, SessionStore as SessionBackend};

use crate::config::WebConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "rackz_session";

/// Session expiry time in seconds (30 days).
const SESSION_EXPIRY_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Create the session layer over any session backend.
///
/// Production passes a `PostgresStore` (its table is created by
/// `rackz-cli migrate`); tests pass a `MemoryStore`.
#[must_use]
pub fn create_session_layer<S: SessionBackend>(
    store: S,
    config: &WebConfig,
) -> SessionManagerLayer<S> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
