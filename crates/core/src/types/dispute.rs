//! Dispute statuses and the status buckets used to filter them.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Dispute status as reported by Stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    WarningNeedsResponse,
    WarningUnderReview,
    WarningClosed,
    NeedsResponse,
    UnderReview,
    Won,
    Lost,
    /// Any status Stripe adds later.
    #[serde(other)]
    Other,
}

impl DisputeStatus {
    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::WarningNeedsResponse => "Inquiry: needs response",
            Self::WarningUnderReview => "Inquiry: under review",
            Self::WarningClosed => "Inquiry closed",
            Self::NeedsResponse => "Needs response",
            Self::UnderReview => "Under review",
            Self::Won => "Won",
            Self::Lost => "Lost",
            Self::Other => "Unknown",
        }
    }

    /// Whether the dispute still awaits a response or a decision.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::WarningNeedsResponse
                | Self::WarningUnderReview
                | Self::NeedsResponse
                | Self::UnderReview
        )
    }
}

/// Bucket used by the disputes panel filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisputeFilter {
    #[default]
    All,
    Active,
    Won,
    Lost,
}

impl DisputeFilter {
    /// Every bucket in tab order.
    pub const ALL: [Self; 4] = [Self::All, Self::Active, Self::Won, Self::Lost];

    /// Whether a dispute with `status` falls in this bucket.
    ///
    /// ```
    /// use rackz_core::{DisputeFilter, DisputeStatus};
    ///
    /// let statuses = [DisputeStatus::Won, DisputeStatus::Lost, DisputeStatus::NeedsResponse];
    /// let won: Vec<_> = statuses.into_iter().filter(|s| DisputeFilter::Won.matches(*s)).collect();
    /// assert_eq!(won, vec![DisputeStatus::Won]);
    /// ```
    #[must_use]
    pub const fn matches(self, status: DisputeStatus) -> bool {
        match self {
            Self::All => true,
            Self::Active => status.is_active(),
            Self::Won => matches!(status, DisputeStatus::Won),
            Self::Lost => matches!(status, DisputeStatus::Lost),
        }
    }

    /// Lowercase identifier used in query strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }
}

impl fmt::Display for DisputeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisputeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            _ => Err(format!("unknown dispute filter: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: [DisputeStatus; 5] = [
        DisputeStatus::Won,
        DisputeStatus::Lost,
        DisputeStatus::NeedsResponse,
        DisputeStatus::WarningClosed,
        DisputeStatus::UnderReview,
    ];

    fn bucket(filter: DisputeFilter) -> Vec<DisputeStatus> {
        SAMPLE.into_iter().filter(|s| filter.matches(*s)).collect()
    }

    #[test]
    fn test_buckets() {
        assert_eq!(bucket(DisputeFilter::All).len(), SAMPLE.len());
        assert_eq!(bucket(DisputeFilter::Won), vec![DisputeStatus::Won]);
        assert_eq!(bucket(DisputeFilter::Lost), vec![DisputeStatus::Lost]);
        assert_eq!(
            bucket(DisputeFilter::Active),
            vec![DisputeStatus::NeedsResponse, DisputeStatus::UnderReview]
        );
    }

    #[test]
    fn test_unknown_status_deserializes_as_other() {
        let status: DisputeStatus = serde_json::from_str("\"charge_refunded\"").unwrap();
        assert_eq!(status, DisputeStatus::Other);
        assert!(!DisputeFilter::Active.matches(status));
        assert!(DisputeFilter::All.matches(status));
    }

    #[test]
    fn test_filter_parsing() {
        assert_eq!("".parse::<DisputeFilter>().unwrap(), DisputeFilter::All);
        assert_eq!("WON".parse::<DisputeFilter>().unwrap(), DisputeFilter::Won);
        assert!("pending".parse::<DisputeFilter>().is_err());
    }
}
