//! Persisted per-user account document.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rackz_core::{
    BillingCycle, InvalidTransition, Price, Provider, SaasPackage, SetupPackage, SetupRequestId,
    SetupStatus,
};
use serde::{Deserialize, Serialize};

use super::setup::{ContactMethod, Timeline};

/// Everything the front end remembers about a user between sessions.
///
/// Stored as one JSON document per user id. Missing fields default so that
/// documents written by older releases still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Resolved SaaS plan.
    #[serde(default)]
    pub package: Option<SaasPackage>,
    #[serde(default)]
    pub billing: Option<BillingCycle>,
    #[serde(default)]
    pub connected_providers: BTreeSet<Provider>,
    /// Setup requests, oldest first. Never deleted by the front end.
    #[serde(default)]
    pub setup_requests: Vec<SetupRequest>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AccountState {
    /// Whether any persisted setup request has been paid for.
    #[must_use]
    pub fn has_paid_setup(&self) -> bool {
        self.setup_requests.iter().any(|r| r.status.is_paid())
    }

    #[must_use]
    pub fn latest_setup_request(&self) -> Option<&SetupRequest> {
        self.setup_requests.last()
    }

    #[must_use]
    pub fn setup_request(&self, id: &SetupRequestId) -> Option<&SetupRequest> {
        self.setup_requests.iter().find(|r| &r.id == id)
    }

    pub fn setup_request_mut(&mut self, id: &SetupRequestId) -> Option<&mut SetupRequest> {
        self.setup_requests.iter_mut().find(|r| &r.id == id)
    }

    #[must_use]
    pub fn is_connected(&self, provider: Provider) -> bool {
        self.connected_providers.contains(&provider)
    }
}

/// A paid, done-for-you setup engagement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupRequest {
    pub id: SetupRequestId,
    pub package_name: SetupPackage,
    pub company: String,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub industry: String,
    pub status: SetupStatus,
    pub timeline: Timeline,
    pub preferred_contact_method: ContactMethod,
    #[serde(default)]
    pub notes: Option<String>,
    pub amount_paid: Price,
    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SetupRequest {
    /// Move the request along its status machine.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] if the move is not allowed; the request
    /// is left unchanged.
    pub fn advance(
        &mut self,
        to: SetupStatus,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        self.status = self.status.transition(to)?;
        self.updated_at = now;
        Ok(())
    }
}
