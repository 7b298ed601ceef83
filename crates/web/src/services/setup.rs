//! Setup funnel: the four-step form and the upfront payment.
//!
//! Forward navigation is gated on the steps being left validating; going
//! back is always allowed. Submitting validates every step and marks the
//! draft ready for payment. Payment takes half the package price, rounded
//! up, and turns the draft into a [`SetupRequest`].

use chrono::{DateTime, Utc};
use rackz_core::{Email, InvalidTransition, SetupRequestId, SetupStatus};
use serde::{Deserialize, Serialize};

use crate::models::{
    ContactMethod, FormStep, SetupDraft, SetupPaymentRecord, SetupRequest, Timeline,
};

/// Longest accepted notes field.
pub const MAX_NOTES_LEN: usize = 2000;

/// Minimum number of digits in a phone number.
const MIN_PHONE_DIGITS: usize = 7;

/// Errors from the setup funnel.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("no setup in progress")]
    NoDraft,
    #[error("setup form incomplete at step {}", .0.number())]
    Incomplete(FormStep),
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// A validation message for one form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl FieldError {
    const fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

/// Validate the fields belonging to one step.
#[must_use]
pub fn validate_step(draft: &SetupDraft, step: FormStep) -> Vec<FieldError> {
    let mut errors = Vec::new();
    match step {
        FormStep::Contact => {
            if draft.name.trim().is_empty() {
                errors.push(FieldError::new("name", "Please enter your name."));
            }
            if Email::parse(&draft.email).is_err() {
                errors.push(FieldError::new("email", "Please enter a valid email address."));
            }
            let digits = draft.phone.chars().filter(char::is_ascii_digit).count();
            if digits < MIN_PHONE_DIGITS {
                errors.push(FieldError::new("phone", "Please enter a valid phone number."));
            }
        }
        FormStep::Business => {
            if draft.company.trim().is_empty() {
                errors.push(FieldError::new("company", "Please enter your company name."));
            }
            if draft.industry.trim().is_empty() {
                errors.push(FieldError::new("industry", "Please tell us your industry."));
            }
        }
        FormStep::Project => {
            if draft.timeline.is_none() {
                errors.push(FieldError::new("timeline", "Please choose a timeline."));
            }
            if draft.preferred_contact_method.is_none() {
                errors.push(FieldError::new(
                    "preferred_contact_method",
                    "Please choose how we should reach you.",
                ));
            }
            if draft.notes.chars().count() > MAX_NOTES_LEN {
                errors.push(FieldError::new("notes", "Notes are limited to 2000 characters."));
            }
        }
        FormStep::Review => {
            if !draft.confirmed {
                errors.push(FieldError::new(
                    "confirmed",
                    "Please confirm the details are correct.",
                ));
            }
        }
    }
    errors
}

/// Fields posted by one step of the form. Only the current step's fields
/// are present.
#[derive(Debug, Default, Deserialize)]
pub struct SetupFormInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub industry: Option<String>,
    pub timeline: Option<String>,
    pub preferred_contact_method: Option<String>,
    pub notes: Option<String>,
    /// Checkbox; present only when ticked.
    pub confirmed: Option<String>,
}

/// Copy posted fields of `step` into the draft.
pub fn apply_input(draft: &mut SetupDraft, step: FormStep, input: SetupFormInput) {
    match step {
        FormStep::Contact => {
            if let Some(name) = input.name {
                draft.name = name.trim().to_owned();
            }
            if let Some(email) = input.email {
                draft.email = email.trim().to_owned();
            }
            if let Some(phone) = input.phone {
                draft.phone = phone.trim().to_owned();
            }
        }
        FormStep::Business => {
            if let Some(company) = input.company {
                draft.company = company.trim().to_owned();
            }
            if let Some(industry) = input.industry {
                draft.industry = industry.trim().to_owned();
            }
        }
        FormStep::Project => {
            if let Some(timeline) = input.timeline {
                draft.timeline = timeline.parse::<Timeline>().ok();
            }
            if let Some(method) = input.preferred_contact_method {
                draft.preferred_contact_method = method.parse::<ContactMethod>().ok();
            }
            if let Some(notes) = input.notes {
                draft.notes = notes.trim().to_owned();
            }
        }
        FormStep::Review => draft.confirmed = input.confirmed.is_some(),
    }
    draft.submitted = false;
}

/// A navigation request from the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Back,
    Next,
    Goto(FormStep),
    Submit,
}

impl Navigation {
    /// Parse the submit button value (`back`, `next`, `submit`, `goto-<n>`).
    #[must_use]
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "back" => Some(Self::Back),
            "next" => Some(Self::Next),
            "submit" => Some(Self::Submit),
            other => other
                .strip_prefix("goto-")
                .and_then(|n| n.parse().ok())
                .and_then(FormStep::from_number)
                .map(Self::Goto),
        }
    }
}

/// Outcome of [`navigate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    /// The draft now shows `step`.
    Moved(FormStep),
    /// Navigation refused; the draft shows `step` with its errors.
    Blocked {
        step: FormStep,
        errors: Vec<FieldError>,
    },
    /// All steps validate; the draft is ready for payment.
    Submitted,
}

/// Apply a navigation request to the draft.
pub fn navigate(draft: &mut SetupDraft, nav: Navigation) -> NavOutcome {
    let current = draft.step;
    let target = match nav {
        Navigation::Back => current.prev().unwrap_or(current),
        Navigation::Next => match current.next() {
            Some(next) => next,
            None => return submit(draft),
        },
        Navigation::Goto(step) => step,
        Navigation::Submit => return submit(draft),
    };

    let skipped = FormStep::ALL
        .into_iter()
        .filter(|s| *s >= current && *s < target);
    if target > current
        && let Some(blocked) = first_invalid(draft, skipped)
    {
        return blocked;
    }

    draft.step = target;
    NavOutcome::Moved(target)
}

fn submit(draft: &mut SetupDraft) -> NavOutcome {
    if let Some(blocked) = first_invalid(draft, FormStep::ALL.into_iter()) {
        return blocked;
    }
    draft.submitted = true;
    NavOutcome::Submitted
}

fn first_invalid(
    draft: &mut SetupDraft,
    steps: impl Iterator<Item = FormStep>,
) -> Option<NavOutcome> {
    for step in steps {
        let errors = validate_step(draft, step);
        if !errors.is_empty() {
            draft.step = step;
            return Some(NavOutcome::Blocked { step, errors });
        }
    }
    None
}

/// Take the upfront payment for a submitted draft.
///
/// The charge itself is simulated: no card data passes through this
/// service. The returned request is already `payment_completed`.
///
/// # Errors
///
/// Returns `SetupError::Incomplete` if the draft was not submitted or does
/// not validate.
pub fn charge(
    draft: &SetupDraft,
    now: DateTime<Utc>,
) -> Result<(SetupRequest, SetupPaymentRecord), SetupError> {
    if !draft.submitted {
        return Err(SetupError::Incomplete(draft.step));
    }
    if let Some(step) = FormStep::ALL
        .into_iter()
        .find(|step| !validate_step(draft, *step).is_empty())
    {
        return Err(SetupError::Incomplete(step));
    }
    let (Some(timeline), Some(preferred_contact_method)) =
        (draft.timeline, draft.preferred_contact_method)
    else {
        return Err(SetupError::Incomplete(FormStep::Project));
    };
    let email = Email::parse(&draft.email).map_err(|_| SetupError::Incomplete(FormStep::Contact))?;

    let status = SetupStatus::PaymentPending.transition(SetupStatus::PaymentCompleted)?;
    let amount = draft.package.upfront_amount();
    let id = SetupRequestId::generate();

    let request = SetupRequest {
        id: id.clone(),
        package_name: draft.package,
        company: draft.company.clone(),
        email: email.into_inner(),
        name: draft.name.clone(),
        phone: draft.phone.clone(),
        industry: draft.industry.clone(),
        status,
        timeline,
        preferred_contact_method,
        notes: (!draft.notes.is_empty()).then(|| draft.notes.clone()),
        amount_paid: amount,
        payment_date: Some(now),
        created_at: now,
        updated_at: now,
    };
    let record = SetupPaymentRecord {
        request_id: id,
        package: draft.package,
        amount,
        status,
        paid_at: now,
    };
    Ok((request, record))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rackz_core::{Price, SetupPackage};

    use super::*;

    fn complete_draft() -> SetupDraft {
        let mut draft = SetupDraft::new(
            SetupPackage::Subscriptions,
            "Ana Lima",
            "ana@example.com",
            Some("Acme"),
        );
        draft.phone = "+1 (555) 010-0200".into();
        draft.industry = "Retail".into();
        draft.timeline = Some(Timeline::TwoWeeks);
        draft.preferred_contact_method = Some(ContactMethod::Video);
        draft.confirmed = true;
        draft
    }

    #[test]
    fn test_contact_step_errors() {
        let draft = SetupDraft::new(SetupPackage::Crm, "", "not-an-email", None);
        let fields: Vec<_> = validate_step(&draft, FormStep::Contact)
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(fields, ["name", "email", "phone"]);
    }

    #[test]
    fn test_next_is_gated_on_current_step() {
        let mut draft = SetupDraft::new(SetupPackage::Crm, "Ana", "ana@example.com", None);
        let outcome = navigate(&mut draft, Navigation::Next);
        assert!(matches!(
            outcome,
            NavOutcome::Blocked {
                step: FormStep::Contact,
                ..
            }
        ));

        draft.phone = "5550100200".into();
        assert_eq!(
            navigate(&mut draft, Navigation::Next),
            NavOutcome::Moved(FormStep::Business)
        );
    }

    #[test]
    fn test_back_is_always_allowed() {
        let mut draft = SetupDraft::new(SetupPackage::Crm, "", "", None);
        draft.step = FormStep::Project;
        assert_eq!(
            navigate(&mut draft, Navigation::Back),
            NavOutcome::Moved(FormStep::Business)
        );
        assert_eq!(
            navigate(&mut draft, Navigation::Goto(FormStep::Contact)),
            NavOutcome::Moved(FormStep::Contact)
        );
    }

    #[test]
    fn test_cannot_jump_past_invalid_step() {
        let mut draft = complete_draft();
        draft.company.clear();
        let outcome = navigate(&mut draft, Navigation::Goto(FormStep::Review));
        assert!(matches!(
            outcome,
            NavOutcome::Blocked {
                step: FormStep::Business,
                ..
            }
        ));
        assert_eq!(draft.step, FormStep::Business);
    }

    #[test]
    fn test_submit_then_charge_half_price() {
        let mut draft = complete_draft();
        draft.step = FormStep::Review;
        assert_eq!(navigate(&mut draft, Navigation::Submit), NavOutcome::Submitted);

        let now = Utc::now();
        let (request, record) = charge(&draft, now).unwrap();
        assert_eq!(request.amount_paid, Price::usd(375));
        assert_eq!(request.status, SetupStatus::PaymentCompleted);
        assert_eq!(request.payment_date, Some(now));
        assert_eq!(record.request_id, request.id);
        assert!(record.is_completed());
    }

    #[test]
    fn test_charge_requires_submission() {
        let draft = complete_draft();
        assert!(matches!(
            charge(&draft, Utc::now()),
            Err(SetupError::Incomplete(_))
        ));
    }

    #[test]
    fn test_apply_input_resets_submission() {
        let mut draft = complete_draft();
        draft.submitted = true;
        apply_input(
            &mut draft,
            FormStep::Project,
            SetupFormInput {
                timeline: Some("flexible".into()),
                preferred_contact_method: Some("carrier-pigeon".into()),
                ..SetupFormInput::default()
            },
        );
        assert_eq!(draft.timeline, Some(Timeline::Flexible));
        assert_eq!(draft.preferred_contact_method, None);
        assert!(!draft.submitted);
    }

    #[test]
    fn test_parse_navigation() {
        assert_eq!(Navigation::parse("goto-3"), Some(Navigation::Goto(FormStep::Project)));
        assert_eq!(Navigation::parse("goto-9"), None);
        assert_eq!(Navigation::parse("back"), Some(Navigation::Back));
    }
}
