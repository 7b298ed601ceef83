//! Business logic services for the web front end.
//!
//! # Services
//!
//! - `session` - Session document access and resolution, sign-in/sign-out
//! - `account_store` - Persisted per-user account documents
//! - `routing` - Which dashboard a user lands on
//! - `setup` - Multi-step setup form and upfront payment
//! - `dashboard` - Plan-tiered dashboard panels
//! - `integrations` - Connected payment providers
//! - `relay` - Newsletter and contact form relay

pub mod account_store;
pub mod dashboard;
pub mod integrations;
pub mod relay;
pub mod routing;
pub mod session;
pub mod setup;

pub use account_store::AccountStore;
pub use relay::FormRelay;
pub use session::{CurrentSession, SessionStore};
