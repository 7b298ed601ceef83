//! Payment providers a user can link to their account.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A payment provider.
///
/// Only Stripe is backed by a real connection (through the payments API).
/// PayPal and Shopify are placeholders whose connected state is recorded
/// locally until their integrations ship.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Stripe,
    Paypal,
    Shopify,
}

impl Provider {
    /// Every provider in display order.
    pub const ALL: [Self; 3] = [Self::Stripe, Self::Paypal, Self::Shopify];

    /// Lowercase identifier used in URLs and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::Paypal => "paypal",
            Self::Shopify => "shopify",
        }
    }

    /// Human-readable provider name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Stripe => "Stripe",
            Self::Paypal => "PayPal",
            Self::Shopify => "Shopify",
        }
    }

    /// Whether the connection state comes from the payments API rather than
    /// local bookkeeping.
    #[must_use]
    pub const fn is_authoritative(self) -> bool {
        matches!(self, Self::Stripe)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stripe" => Ok(Self::Stripe),
            "paypal" => Ok(Self::Paypal),
            "shopify" => Ok(Self::Shopify),
            _ => Err(format!("unknown provider: {s}")),
        }
    }
}
