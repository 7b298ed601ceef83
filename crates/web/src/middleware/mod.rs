//! HTTP middleware stack for the web front end.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (CSP, frame-deny, nosniff, no-referrer)
//! 5. Session layer (tower-sessions)
//! 6. Sign-out on upstream 401
//! 7. Rate limiting (sign-in and sign-up only)

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;
pub mod unauthorized;

pub use auth::{RequireUser, safe_next};
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
pub use unauthorized::signout_on_auth_failure;
