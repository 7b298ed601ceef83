//! Core types for Rackz.
//!
//! This module provides type-safe wrappers for the front end's domain concepts.

pub mod dispute;
pub mod email;
pub mod id;
pub mod package;
pub mod price;
pub mod provider;
pub mod status;

pub use dispute::{DisputeFilter, DisputeStatus};
pub use email::{Email, EmailError};
pub use id::*;
pub use package::{BillingCycle, PackageParseError, SaasPackage, SetupPackage};
pub use price::{CurrencyCode, Price};
pub use provider::Provider;
pub use status::*;
