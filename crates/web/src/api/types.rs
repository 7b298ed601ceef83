//! Request and response types for the Rackz payments API.
//!
//! Auth payloads use the API's camelCase field names. Stripe objects are
//! passed through from Stripe unchanged and keep its snake_case names.

use core::fmt;

use chrono::{DateTime, TimeZone, Utc};
use rackz_core::{CurrencyCode, DisputeStatus, Email, Price, SaasPackage, UserId};
use serde::{Deserialize, Serialize};

// =============================================================================
// Auth
// =============================================================================

/// Body of `POST /auth/signup`.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub email: Email,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("company", &self.company)
            .finish()
    }
}

/// Body of `POST /auth/signin`.
#[derive(Clone, Serialize)]
pub struct SigninRequest {
    pub email: Email,
    pub password: String,
}

impl fmt::Debug for SigninRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigninRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Response of `POST /auth/signup` and `POST /auth/signin`.
#[derive(Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: ApiUser,
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("token", &"[REDACTED]")
            .field("user", &self.user)
            .finish()
    }
}

/// A user as returned by the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUser {
    pub id: UserId,
    pub email: Email,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub entitlements: Option<ApiEntitlements>,
}

/// Entitlements attached to an API user.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEntitlements {
    #[serde(default)]
    pub saas_plan: Option<String>,
    #[serde(default)]
    pub setup_eligible: Option<bool>,
}

impl ApiEntitlements {
    /// The entitled plan, ignoring values this front end does not know.
    #[must_use]
    pub fn saas_package(&self) -> Option<SaasPackage> {
        self.saas_plan.as_deref().and_then(|plan| plan.parse().ok())
    }
}

/// Error body returned by the API on failures.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// =============================================================================
// Stripe
// =============================================================================

/// Response of `GET /stripe/connect-url`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectUrl {
    pub url: String,
}

/// Response of `GET /stripe/account`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StripeAccount {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub charges_enabled: bool,
}

/// Stripe list envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

/// Charge outcome as reported by Stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Succeeded,
    Pending,
    Failed,
    #[serde(other)]
    Other,
}

impl ChargeStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Succeeded => "Succeeded",
            Self::Pending => "Pending",
            Self::Failed => "Failed",
            Self::Other => "Unknown",
        }
    }
}

/// A Stripe charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    pub id: String,
    /// Amount in minor units.
    pub amount: i64,
    #[serde(default)]
    pub amount_refunded: i64,
    pub currency: String,
    pub status: ChargeStatus,
    /// Unix timestamp.
    pub created: i64,
    #[serde(default)]
    pub failure_code: Option<String>,
    #[serde(default)]
    pub receipt_email: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dispute: Option<Dispute>,
}

impl Charge {
    #[must_use]
    pub fn price(&self) -> Price {
        Price::from_minor_units(self.amount, currency(&self.currency))
    }

    #[must_use]
    pub fn refunded(&self) -> Price {
        Price::from_minor_units(self.amount_refunded, currency(&self.currency))
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        timestamp(self.created)
    }
}

/// A Stripe dispute, as expanded on its charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: DisputeStatus,
    #[serde(default)]
    pub reason: Option<String>,
    pub created: i64,
}

impl Dispute {
    #[must_use]
    pub fn price(&self) -> Price {
        Price::from_minor_units(self.amount, currency(&self.currency))
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        timestamp(self.created)
    }
}

/// Subscription status as reported by Stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Unpaid,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Paused,
    #[serde(other)]
    Other,
}

impl SubscriptionStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Trialing => "Trialing",
            Self::PastDue => "Past due",
            Self::Unpaid => "Unpaid",
            Self::Canceled => "Canceled",
            Self::Incomplete => "Incomplete",
            Self::IncompleteExpired => "Expired",
            Self::Paused => "Paused",
            Self::Other => "Unknown",
        }
    }

    /// Whether the subscription is in dunning.
    #[must_use]
    pub const fn is_delinquent(self) -> bool {
        matches!(self, Self::PastDue | Self::Unpaid)
    }
}

/// Billing interval of a subscription price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Day,
    Week,
    #[default]
    Month,
    Year,
}

/// A Stripe subscription, flattened to its single price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub status: SubscriptionStatus,
    /// Amount per interval in minor units.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub interval: Interval,
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Unix timestamp.
    pub current_period_end: i64,
}

impl Subscription {
    #[must_use]
    pub fn currency_code(&self) -> CurrencyCode {
        currency(&self.currency)
    }

    #[must_use]
    pub fn price(&self) -> Price {
        Price::from_minor_units(self.amount, self.currency_code())
    }

    #[must_use]
    pub fn current_period_end_at(&self) -> DateTime<Utc> {
        timestamp(self.current_period_end)
    }
}

fn currency(code: &str) -> CurrencyCode {
    CurrencyCode::from_code(code).unwrap_or_default()
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_api_user_camel_case() {
        let user: ApiUser = serde_json::from_str(
            r#"{"id":"usr_1","email":"ana@example.com","name":"Ana",
                "entitlements":{"saasPlan":"pro","setupEligible":true}}"#,
        )
        .unwrap();
        let entitlements = user.entitlements.unwrap();
        assert_eq!(entitlements.saas_package(), Some(SaasPackage::Pro));
        assert_eq!(entitlements.setup_eligible, Some(true));
    }

    #[test]
    fn test_unknown_plan_entitlement_is_ignored() {
        let entitlements = ApiEntitlements {
            saas_plan: Some("enterprise".into()),
            setup_eligible: None,
        };
        assert_eq!(entitlements.saas_package(), None);
    }

    #[test]
    fn test_charge_with_dispute() {
        let charge: Charge = serde_json::from_str(
            r#"{"id":"ch_1","amount":1250,"currency":"usd","status":"succeeded","created":1700000000,
                "dispute":{"id":"dp_1","amount":1250,"currency":"usd","status":"needs_response","created":1700000100}}"#,
        )
        .unwrap();
        assert_eq!(charge.price().display(), "$12.50");
        assert_eq!(charge.refunded().display(), "$0");
        assert_eq!(
            charge.dispute.unwrap().status,
            DisputeStatus::NeedsResponse
        );
    }

    #[test]
    fn test_unknown_statuses_do_not_fail_parsing() {
        let sub: Subscription = serde_json::from_str(
            r#"{"id":"sub_1","status":"brand_new","amount":2900,"currency":"xyz","current_period_end":0}"#,
        )
        .unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Other);
        assert_eq!(sub.currency_code(), CurrencyCode::USD);
        assert_eq!(sub.interval, Interval::Month);
    }

    #[test]
    fn test_credentials_are_redacted() {
        let request = SigninRequest {
            email: Email::parse("ana@example.com").unwrap(),
            password: "correct horse".into(),
        };
        assert!(!format!("{request:?}").contains("correct horse"));
    }
}
