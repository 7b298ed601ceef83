//! Multi-step setup form draft.

use core::fmt;
use std::str::FromStr;

use rackz_core::SetupPackage;
use serde::{Deserialize, Serialize};

/// A step of the setup form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FormStep {
    #[default]
    Contact,
    Business,
    Project,
    Review,
}

impl FormStep {
    pub const ALL: [Self; 4] = [Self::Contact, Self::Business, Self::Project, Self::Review];

    /// One-based position shown in the progress header.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Contact => 1,
            Self::Business => 2,
            Self::Project => 3,
            Self::Review => 4,
        }
    }

    #[must_use]
    pub const fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Contact),
            2 => Some(Self::Business),
            3 => Some(Self::Project),
            4 => Some(Self::Review),
            _ => None,
        }
    }

    #[must_use]
    pub const fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    #[must_use]
    pub const fn prev(self) -> Option<Self> {
        Self::from_number(self.number() - 1)
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Contact => "Contact details",
            Self::Business => "Your business",
            Self::Project => "Project details",
            Self::Review => "Review",
        }
    }
}

/// When the customer wants the setup done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeline {
    Asap,
    TwoWeeks,
    OneMonth,
    Flexible,
}

impl Timeline {
    pub const ALL: [Self; 4] = [Self::Asap, Self::TwoWeeks, Self::OneMonth, Self::Flexible];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asap => "asap",
            Self::TwoWeeks => "two_weeks",
            Self::OneMonth => "one_month",
            Self::Flexible => "flexible",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Asap => "As soon as possible",
            Self::TwoWeeks => "Within 2 weeks",
            Self::OneMonth => "Within a month",
            Self::Flexible => "Flexible",
        }
    }
}

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("invalid timeline: {s}"))
    }
}

/// How the customer prefers to be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactMethod {
    Email,
    Phone,
    Video,
}

impl ContactMethod {
    pub const ALL: [Self; 3] = [Self::Email, Self::Phone, Self::Video];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Video => "video",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Email => "Email",
            Self::Phone => "Phone call",
            Self::Video => "Video call",
        }
    }
}

impl fmt::Display for ContactMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ContactMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("invalid contact method: {s}"))
    }
}

/// The in-progress setup form, kept in the user's session scratch.
///
/// Fields hold what the user typed; validation happens per step so a
/// half-filled draft survives navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupDraft {
    pub package: SetupPackage,
    #[serde(default)]
    pub step: FormStep,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub timeline: Option<Timeline>,
    #[serde(default)]
    pub preferred_contact_method: Option<ContactMethod>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub confirmed: bool,
    /// All steps validated and the user pressed submit.
    #[serde(default)]
    pub submitted: bool,
}

impl SetupDraft {
    /// An empty draft for `package`, prefilled from the signed-in user.
    #[must_use]
    pub fn new(package: SetupPackage, name: &str, email: &str, company: Option<&str>) -> Self {
        Self {
            package,
            step: FormStep::Contact,
            name: name.to_owned(),
            email: email.to_owned(),
            phone: String::new(),
            company: company.unwrap_or_default().to_owned(),
            industry: String::new(),
            timeline: None,
            preferred_contact_method: None,
            notes: String::new(),
            confirmed: false,
            submitted: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_navigation_bounds() {
        assert_eq!(FormStep::Contact.prev(), None);
        assert_eq!(FormStep::Contact.next(), Some(FormStep::Business));
        assert_eq!(FormStep::Review.next(), None);
        assert_eq!(FormStep::Review.prev(), Some(FormStep::Project));
    }

    #[test]
    fn test_choice_parsing() {
        assert_eq!("two_weeks".parse::<Timeline>(), Ok(Timeline::TwoWeeks));
        assert!("soon".parse::<Timeline>().is_err());
        assert_eq!("video".parse::<ContactMethod>(), Ok(ContactMethod::Video));
        assert!("".parse::<ContactMethod>().is_err());
    }
}
