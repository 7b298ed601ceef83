//! SaaS plans, billing cycles and one-time setup packages.
//!
//! All list prices are whole US dollars. Yearly billing is 34% off the
//! monthly price times twelve, rounded half away from zero. Setup packages
//! charge half of their price upfront, rounded up.

use core::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::price::Price;

/// Error returned when a plan, cycle or package name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct PackageParseError {
    kind: &'static str,
    value: String,
}

impl PackageParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

// =============================================================================
// SaaS plans
// =============================================================================

/// A SaaS pricing tier controlling the dashboard feature set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum SaasPackage {
    #[default]
    Starter,
    Pro,
    Scale,
}

impl SaasPackage {
    /// Every plan, cheapest first.
    pub const ALL: [Self; 3] = [Self::Starter, Self::Pro, Self::Scale];

    /// Lowercase identifier used in URLs and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Scale => "scale",
        }
    }

    /// Human-readable plan name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Starter => "Starter",
            Self::Pro => "Pro",
            Self::Scale => "Scale",
        }
    }

    /// Monthly list price in whole dollars.
    #[must_use]
    pub const fn monthly_price(self) -> u32 {
        match self {
            Self::Starter => 29,
            Self::Pro => 79,
            Self::Scale => 199,
        }
    }

    /// Price charged for one billing period of the given cycle.
    ///
    /// ```
    /// use rackz_core::{BillingCycle, Price, SaasPackage};
    ///
    /// assert_eq!(SaasPackage::Pro.price(BillingCycle::Monthly), Price::usd(79));
    /// // round(79 * 12 * 0.66)
    /// assert_eq!(SaasPackage::Pro.price(BillingCycle::Yearly), Price::usd(626));
    /// ```
    #[must_use]
    pub fn price(self, billing: BillingCycle) -> Price {
        let monthly = Price::usd(self.monthly_price());
        match billing {
            BillingCycle::Monthly => monthly,
            BillingCycle::Yearly => Price::new(
                monthly.amount * Decimal::from(12) * BillingCycle::yearly_factor(),
                monthly.currency_code,
            )
            .round_whole(),
        }
    }

    /// Whether this plan includes everything `other` includes.
    #[must_use]
    pub fn includes(self, other: Self) -> bool {
        self >= other
    }
}

impl fmt::Display for SaasPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaasPackage {
    type Err = PackageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starter" => Ok(Self::Starter),
            "pro" => Ok(Self::Pro),
            "scale" => Ok(Self::Scale),
            _ => Err(PackageParseError::new("plan", s)),
        }
    }
}

/// Billing cycle for a SaaS plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Yearly,
}

impl BillingCycle {
    /// Multiplier applied to twelve monthly payments for yearly billing.
    #[must_use]
    pub fn yearly_factor() -> Decimal {
        Decimal::new(66, 2)
    }

    /// Lowercase identifier used in URLs and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Suffix shown after a price (`/mo`, `/yr`).
    #[must_use]
    pub const fn period_suffix(self) -> &'static str {
        match self {
            Self::Monthly => "/mo",
            Self::Yearly => "/yr",
        }
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingCycle {
    type Err = PackageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Ok(Self::Monthly),
            "yearly" | "annual" | "year" => Ok(Self::Yearly),
            _ => Err(PackageParseError::new("billing cycle", s)),
        }
    }
}

// =============================================================================
// Setup packages
// =============================================================================

/// A one-time, done-for-you setup engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetupPackage {
    Checkout,
    Subscriptions,
    Crm,
    Marketplace,
}

impl SetupPackage {
    /// Every setup package in catalogue order.
    pub const ALL: [Self; 4] = [
        Self::Checkout,
        Self::Subscriptions,
        Self::Crm,
        Self::Marketplace,
    ];

    /// Lowercase identifier used in URLs and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checkout => "checkout",
            Self::Subscriptions => "subscriptions",
            Self::Crm => "crm",
            Self::Marketplace => "marketplace",
        }
    }

    /// Human-readable package name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Checkout => "Checkout Setup",
            Self::Subscriptions => "Subscriptions Setup",
            Self::Crm => "CRM Integration",
            Self::Marketplace => "Marketplace Payments",
        }
    }

    /// Full package price in whole dollars.
    #[must_use]
    pub const fn full_price(self) -> u32 {
        match self {
            Self::Checkout => 499,
            Self::Subscriptions => 749,
            Self::Crm => 999,
            Self::Marketplace => 1499,
        }
    }

    /// Amount charged upfront: half the full price, rounded up.
    ///
    /// ```
    /// use rackz_core::{Price, SetupPackage};
    ///
    /// assert_eq!(SetupPackage::Subscriptions.upfront_amount(), Price::usd(375));
    /// ```
    #[must_use]
    pub fn upfront_amount(self) -> Price {
        let full = Price::usd(self.full_price());
        Price::new(full.amount / Decimal::from(2), full.currency_code).ceil_whole()
    }
}

impl fmt::Display for SetupPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SetupPackage {
    type Err = PackageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "checkout" => Ok(Self::Checkout),
            "subscriptions" => Ok(Self::Subscriptions),
            "crm" => Ok(Self::Crm),
            "marketplace" => Ok(Self::Marketplace),
            _ => Err(PackageParseError::new("setup package", s)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_yearly_prices() {
        assert_eq!(
            SaasPackage::Starter.price(BillingCycle::Yearly),
            Price::usd(230)
        );
        assert_eq!(SaasPackage::Pro.price(BillingCycle::Yearly), Price::usd(626));
        assert_eq!(
            SaasPackage::Scale.price(BillingCycle::Yearly),
            Price::usd(1576)
        );
    }

    #[test]
    fn test_upfront_amounts_round_up() {
        assert_eq!(SetupPackage::Checkout.upfront_amount(), Price::usd(250));
        assert_eq!(SetupPackage::Subscriptions.upfront_amount(), Price::usd(375));
        assert_eq!(SetupPackage::Crm.upfront_amount(), Price::usd(500));
        assert_eq!(SetupPackage::Marketplace.upfront_amount(), Price::usd(750));
    }

    #[test]
    fn test_plan_parsing_is_lenient_about_case() {
        assert_eq!(" PRO ".parse::<SaasPackage>().unwrap(), SaasPackage::Pro);
        assert!("enterprise".parse::<SaasPackage>().is_err());
        assert_eq!(
            "annual".parse::<BillingCycle>().unwrap(),
            BillingCycle::Yearly
        );
        assert_eq!("CRM".parse::<SetupPackage>().unwrap(), SetupPackage::Crm);
    }

    #[test]
    fn test_tier_inclusion() {
        assert!(SaasPackage::Scale.includes(SaasPackage::Pro));
        assert!(SaasPackage::Pro.includes(SaasPackage::Starter));
        assert!(!SaasPackage::Starter.includes(SaasPackage::Pro));
    }

    #[test]
    fn test_parse_error_message() {
        let err = "gold".parse::<SaasPackage>().unwrap_err();
        assert_eq!(err.to_string(), "unknown plan: gold");
    }
}
