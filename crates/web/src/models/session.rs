//! Session-scoped documents.
//!
//! Everything the front end keeps for a browser lives in one
//! [`BrowserSession`] document stored under a single session key. The
//! session cookie outlives the bearer token inside it: when the token's TTL
//! passes it is dropped while the non-sensitive user mirror stays.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rackz_core::{
    BillingCycle, Email, Price, SaasPackage, SetupPackage, SetupRequestId, SetupStatus, UserId,
};
use serde::{Deserialize, Serialize};

use super::setup::SetupDraft;
use crate::api::ApiUser;

/// Session key holding the [`BrowserSession`] document.
pub const BROWSER_SESSION_KEY: &str = "rackz";

/// The whole session-scoped state of one browser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserSession {
    /// Bearer token for the payments API.
    #[serde(default)]
    pub token: Option<StoredToken>,
    /// Non-sensitive mirror of the signed-in user.
    #[serde(default)]
    pub user: Option<SessionUser>,
    /// CSRF state of a pending Stripe OAuth round trip.
    #[serde(default)]
    pub oauth_state: Option<String>,
    /// Per-user short-lived records, keyed so that a shared browser never
    /// shows one account's drafts to another.
    #[serde(default)]
    pub scratch: HashMap<UserId, UserScratch>,
}

impl BrowserSession {
    /// Scratch records of the mirrored user.
    #[must_use]
    pub fn current_scratch(&self) -> Option<&UserScratch> {
        self.user.as_ref().and_then(|u| self.scratch.get(&u.id))
    }

    /// Scratch records for `user`, created on first use.
    pub fn scratch_mut(&mut self, user: &UserId) -> &mut UserScratch {
        self.scratch.entry(user.clone()).or_default()
    }
}

/// A bearer token with its lifecycle timestamps.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    /// Last time `/auth/me` accepted the token.
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// A token just returned by sign-in or sign-up.
    #[must_use]
    pub const fn fresh(value: String, now: DateTime<Utc>) -> Self {
        Self {
            value,
            issued_at: now,
            verified_at: Some(now),
        }
    }
}

impl fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredToken")
            .field("value", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("verified_at", &self.verified_at)
            .finish()
    }
}

/// Session-stored user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub entitlements: Option<Entitlements>,
}

/// What the API says the user is entitled to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlements {
    #[serde(default)]
    pub saas_plan: Option<SaasPackage>,
    #[serde(default)]
    pub setup_eligible: Option<bool>,
}

impl SessionUser {
    /// First word of the display name, or the email's local part.
    #[must_use]
    pub fn first_name(&self) -> &str {
        self.name
            .split_whitespace()
            .next()
            .unwrap_or_else(|| self.email.as_str().split('@').next().unwrap_or_default())
    }
}

impl From<ApiUser> for SessionUser {
    fn from(user: ApiUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            company: user.company,
            entitlements: user.entitlements.map(|e| Entitlements {
                saas_plan: e.saas_package(),
                setup_eligible: e.setup_eligible,
            }),
        }
    }
}

/// Short-lived records for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserScratch {
    /// Plan chosen on the signup page.
    #[serde(default)]
    pub signup: Option<SignupIntent>,
    /// Fresh SaaS payment confirmation.
    #[serde(default)]
    pub payment: Option<PaymentRecord>,
    /// In-progress setup form.
    #[serde(default)]
    pub setup_draft: Option<SetupDraft>,
    /// Latest setup payment.
    #[serde(default)]
    pub setup_payment: Option<SetupPaymentRecord>,
}

/// Plan picked before an account existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupIntent {
    pub package: SaasPackage,
    pub billing: BillingCycle,
    pub created_at: DateTime<Utc>,
}

/// Confirmation that a SaaS plan was paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub package: SaasPackage,
    pub billing: BillingCycle,
    pub amount: Price,
    pub confirmed_at: DateTime<Utc>,
}

/// Receipt of the latest setup payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupPaymentRecord {
    pub request_id: SetupRequestId,
    pub package: SetupPackage,
    pub amount: Price,
    pub status: SetupStatus,
    pub paid_at: DateTime<Utc>,
}

impl SetupPaymentRecord {
    /// Whether this payment went through.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.status.is_paid()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(id: &str) -> SessionUser {
        SessionUser {
            id: UserId::new(id),
            email: Email::parse("ana@example.com").unwrap(),
            name: "Ana Lima".to_string(),
            company: None,
            entitlements: None,
        }
    }

    #[test]
    fn test_scratch_is_per_user() {
        let mut doc = BrowserSession {
            user: Some(user("usr_ana")),
            ..BrowserSession::default()
        };
        doc.scratch_mut(&UserId::new("usr_bo")).signup = Some(SignupIntent {
            package: SaasPackage::Scale,
            billing: BillingCycle::Monthly,
            created_at: Utc::now(),
        });
        assert!(doc.current_scratch().is_none());

        doc.scratch_mut(&UserId::new("usr_ana"));
        assert_eq!(doc.current_scratch(), Some(&UserScratch::default()));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = StoredToken::fresh("tok_secret".to_string(), Utc::now());
        assert!(!format!("{token:?}").contains("tok_secret"));
    }

    #[test]
    fn test_document_tolerates_missing_fields() {
        let doc: BrowserSession = serde_json::from_str("{}").unwrap();
        assert_eq!(doc, BrowserSession::default());
    }

    #[test]
    fn test_first_name() {
        assert_eq!(user("usr_ana").first_name(), "Ana");
        let mut nameless = user("usr_ana");
        nameless.name = String::new();
        assert_eq!(nameless.first_name(), "ana");
    }
}
