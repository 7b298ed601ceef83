//! Setup request status machine.
//!
//! One canonical status drives every view of a setup request. The setup
//! dashboard shows a five-stage timeline and the post-payment status page a
//! three-stage indicator; both are projections of [`SetupStatus`].
//!
//! ```text
//! payment_pending -> payment_completed -> in_review -> in_progress -> testing -> completed
//!                          |                  |             |            |
//!                          +------------------+---- on_hold -+------------+
//! ```
//!
//! `on_hold` can be entered from any paid, unfinished stage and resumes into
//! `in_review`, `in_progress` or `testing`. `completed` is terminal.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a setup request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SetupStatus {
    #[default]
    PaymentPending,
    PaymentCompleted,
    InReview,
    InProgress,
    Testing,
    Completed,
    OnHold,
}

/// Error returned for a transition the status machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move setup request from {from} to {to}")]
pub struct InvalidTransition {
    pub from: SetupStatus,
    pub to: SetupStatus,
}

impl SetupStatus {
    /// Snake-case identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PaymentPending => "payment_pending",
            Self::PaymentCompleted => "payment_completed",
            Self::InReview => "in_review",
            Self::InProgress => "in_progress",
            Self::Testing => "testing",
            Self::Completed => "completed",
            Self::OnHold => "on_hold",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PaymentPending => "Payment pending",
            Self::PaymentCompleted => "Payment completed",
            Self::InReview => "In review",
            Self::InProgress => "In progress",
            Self::Testing => "Testing",
            Self::Completed => "Completed",
            Self::OnHold => "On hold",
        }
    }

    /// Whether the upfront payment has been received.
    #[must_use]
    pub const fn is_paid(self) -> bool {
        !matches!(self, Self::PaymentPending)
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// The next stage on the main path, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::PaymentPending => Some(Self::PaymentCompleted),
            Self::PaymentCompleted => Some(Self::InReview),
            Self::InReview => Some(Self::InProgress),
            Self::InProgress => Some(Self::Testing),
            Self::Testing => Some(Self::Completed),
            Self::Completed | Self::OnHold => None,
        }
    }

    /// Whether `self -> to` is an allowed transition.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        if self.next() == Some(to) {
            return true;
        }
        match (self, to) {
            (from, Self::OnHold) => from.is_paid() && !from.is_terminal() && from != Self::OnHold,
            (Self::OnHold, Self::InReview | Self::InProgress | Self::Testing) => true,
            _ => false,
        }
    }

    /// Apply a transition.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] if the status machine does not allow it.
    pub fn transition(self, to: Self) -> Result<Self, InvalidTransition> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }

    /// Projection onto the five-stage setup-dashboard timeline.
    ///
    /// `on_hold` has no stage of its own; it is shown where work paused,
    /// which the timeline approximates as `in_progress`.
    #[must_use]
    pub const fn timeline_stage(self) -> Option<TimelineStage> {
        match self {
            Self::PaymentPending => None,
            Self::PaymentCompleted => Some(TimelineStage::PaymentCompleted),
            Self::InReview => Some(TimelineStage::InReview),
            Self::InProgress | Self::OnHold => Some(TimelineStage::InProgress),
            Self::Testing => Some(TimelineStage::Testing),
            Self::Completed => Some(TimelineStage::Completed),
        }
    }

    /// Projection onto the three-stage status-page indicator.
    #[must_use]
    pub const fn progress_stage(self) -> Option<ProgressStage> {
        match self {
            Self::PaymentPending => None,
            Self::PaymentCompleted | Self::InReview => Some(ProgressStage::PaymentCompleted),
            Self::InProgress | Self::Testing | Self::OnHold => Some(ProgressStage::InProgress),
            Self::Completed => Some(ProgressStage::Complete),
        }
    }
}

impl fmt::Display for SetupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SetupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment_pending" => Ok(Self::PaymentPending),
            "payment_completed" => Ok(Self::PaymentCompleted),
            "in_review" => Ok(Self::InReview),
            "in_progress" => Ok(Self::InProgress),
            "testing" => Ok(Self::Testing),
            "completed" => Ok(Self::Completed),
            "on_hold" => Ok(Self::OnHold),
            _ => Err(format!("invalid setup status: {s}")),
        }
    }
}

/// Stage of the five-stage setup-dashboard timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineStage {
    PaymentCompleted,
    InReview,
    InProgress,
    Testing,
    Completed,
}

impl TimelineStage {
    /// All stages in order.
    pub const ALL: [Self; 5] = [
        Self::PaymentCompleted,
        Self::InReview,
        Self::InProgress,
        Self::Testing,
        Self::Completed,
    ];

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PaymentCompleted => "Payment completed",
            Self::InReview => "In review",
            Self::InProgress => "In progress",
            Self::Testing => "Testing",
            Self::Completed => "Completed",
        }
    }
}

/// Stage of the three-stage status-page indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    PaymentCompleted,
    InProgress,
    Complete,
}

impl ProgressStage {
    /// All stages in order.
    pub const ALL: [Self; 3] = [Self::PaymentCompleted, Self::InProgress, Self::Complete];

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PaymentCompleted => "Payment completed",
            Self::InProgress => "In progress",
            Self::Complete => "Complete",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_main_path_walks_to_completed() {
        let mut status = SetupStatus::PaymentPending;
        let mut steps = 0;
        while let Some(next) = status.next() {
            status = status.transition(next).unwrap();
            steps += 1;
        }
        assert_eq!(status, SetupStatus::Completed);
        assert_eq!(steps, 5);
        assert!(status.is_terminal());
    }

    #[test]
    fn test_on_hold_rules() {
        assert!(SetupStatus::InProgress.can_transition_to(SetupStatus::OnHold));
        assert!(SetupStatus::PaymentCompleted.can_transition_to(SetupStatus::OnHold));
        assert!(!SetupStatus::PaymentPending.can_transition_to(SetupStatus::OnHold));
        assert!(!SetupStatus::Completed.can_transition_to(SetupStatus::OnHold));
        assert!(!SetupStatus::OnHold.can_transition_to(SetupStatus::OnHold));
        assert!(SetupStatus::OnHold.can_transition_to(SetupStatus::Testing));
        assert!(!SetupStatus::OnHold.can_transition_to(SetupStatus::Completed));
    }

    #[test]
    fn test_skipping_stages_is_rejected() {
        let err = SetupStatus::PaymentCompleted
            .transition(SetupStatus::Completed)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot move setup request from payment_completed to completed"
        );
    }

    #[test]
    fn test_projections_agree_on_ordering() {
        // Both views must never show a later stage for an earlier status.
        let path = [
            SetupStatus::PaymentCompleted,
            SetupStatus::InReview,
            SetupStatus::InProgress,
            SetupStatus::Testing,
            SetupStatus::Completed,
        ];
        for pair in path.windows(2) {
            let [a, b] = pair else { continue };
            assert!(a.timeline_stage() < b.timeline_stage());
            assert!(a.progress_stage() <= b.progress_stage());
        }
    }

    #[test]
    fn test_three_stage_projection() {
        assert_eq!(SetupStatus::PaymentPending.progress_stage(), None);
        assert_eq!(
            SetupStatus::InReview.progress_stage(),
            Some(ProgressStage::PaymentCompleted)
        );
        assert_eq!(
            SetupStatus::OnHold.progress_stage(),
            Some(ProgressStage::InProgress)
        );
        assert_eq!(
            SetupStatus::Completed.progress_stage(),
            Some(ProgressStage::Complete)
        );
    }

    #[test]
    fn test_round_trip_names() {
        for status in [
            SetupStatus::PaymentPending,
            SetupStatus::InReview,
            SetupStatus::OnHold,
        ] {
            assert_eq!(status.as_str().parse::<SetupStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_string(&status).unwrap(),
                format!("\"{}\"", status.as_str())
            );
        }
    }
}
