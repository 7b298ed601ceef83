//! Rackz Core - Shared domain types.
//!
//! This crate provides the types shared by the Rackz components:
//! - `web` - Customer-facing front end (marketing, funnels, dashboards)
//! - `cli` - Operator tooling for migrations and account documents
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. Pricing, the setup status machine and dispute
//! bucketing live here so every surface computes them the same way.
//!
//! # Modules
//!
//! - [`types`] - Ids, emails, prices, plans, setup packages and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
