//! Done-for-you setup funnel.
//!
//! `/setup` lists the packages. Picking one starts a four-step form whose
//! draft lives in the user's session scratch; the final step leads to the
//! upfront payment, after which the request is persisted and the user
//! follows its progress on the status page and the setup dashboard.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use rackz_core::{Price, ProgressStage, SetupPackage, SetupStatus, TimelineStage};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireUser;
use crate::models::{AccountState, ContactMethod, FormStep, SetupDraft, SetupRequest, Timeline};
use crate::routes::Nav;
use crate::services::CurrentSession;
use crate::services::routing::has_completed_setup;
use crate::services::setup::{
    FieldError, NavOutcome, Navigation, SetupError, SetupFormInput, apply_input, charge, navigate,
};
use crate::state::AppState;

// =============================================================================
// View helpers
// =============================================================================

/// A setup package as listed in the catalogue.
pub struct PackageCard {
    pub package: SetupPackage,
    pub full_price: Price,
    pub upfront: Price,
}

impl From<SetupPackage> for PackageCard {
    fn from(package: SetupPackage) -> Self {
        Self {
            package,
            full_price: Price::usd(package.full_price()),
            upfront: package.upfront_amount(),
        }
    }
}

/// An option of a radio group.
pub struct Choice {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// One stage of a progress indicator.
pub struct StageView {
    pub label: &'static str,
    /// `done`, `current` or `upcoming`.
    pub state: &'static str,
}

/// Lay out `all` stages around `current`. A finished request shows every
/// stage as done.
fn stages<S: Ord + Copy>(
    all: &[S],
    current: S,
    finished: bool,
    label: impl Fn(S) -> &'static str,
) -> Vec<StageView> {
    all.iter()
        .map(|&stage| StageView {
            label: label(stage),
            state: if stage < current || (finished && stage == current) {
                "done"
            } else if stage == current {
                "current"
            } else {
                "upcoming"
            },
        })
        .collect()
}

fn progress_stages(status: SetupStatus) -> Vec<StageView> {
    let current = status.progress_stage().unwrap_or(ProgressStage::PaymentCompleted);
    stages(&ProgressStage::ALL, current, status.is_terminal(), ProgressStage::label)
}

fn timeline_stages(status: SetupStatus) -> Vec<StageView> {
    let current = status.timeline_stage().unwrap_or(TimelineStage::PaymentCompleted);
    stages(&TimelineStage::ALL, current, status.is_terminal(), TimelineStage::label)
}

// =============================================================================
// Packages
// =============================================================================

/// Setup packages page template.
#[derive(Template, WebTemplate)]
#[template(path = "setup/packages.html")]
pub struct PackagesTemplate {
    pub nav: Nav,
    pub packages: Vec<PackageCard>,
}

/// Display the setup packages.
pub async fn packages(State(state): State<AppState>, session: CurrentSession) -> PackagesTemplate {
    PackagesTemplate {
        nav: Nav::load(&state, &session).await,
        packages: SetupPackage::ALL.into_iter().map(PackageCard::from).collect(),
    }
}

// =============================================================================
// Form
// =============================================================================

/// `?package=` selecting the package to set up.
#[derive(Debug, Default, Deserialize)]
pub struct FormQuery {
    pub package: Option<String>,
}

/// A posted form step.
#[derive(Debug, Deserialize)]
pub struct FormSubmission {
    /// `back`, `next`, `goto-N` or `submit`.
    pub action: String,
    #[serde(flatten)]
    pub input: SetupFormInput,
}

/// Setup form template.
#[derive(Template, WebTemplate)]
#[template(path = "setup/form.html")]
pub struct FormTemplate {
    pub nav: Nav,
    pub draft: SetupDraft,
    pub card: PackageCard,
    pub steps: Vec<StageView>,
    pub step_number: u8,
    pub step_title: &'static str,
    pub is_first: bool,
    pub is_last: bool,
    pub errors: Vec<FieldError>,
    pub timelines: Vec<Choice>,
    pub contact_methods: Vec<Choice>,
}

impl FormTemplate {
    fn new(nav: Nav, draft: SetupDraft, errors: Vec<FieldError>) -> Self {
        let step = draft.step;
        let timelines = Timeline::ALL
            .into_iter()
            .map(|t| Choice {
                value: t.as_str(),
                label: t.label(),
                selected: draft.timeline == Some(t),
            })
            .collect();
        let contact_methods = ContactMethod::ALL
            .into_iter()
            .map(|m| Choice {
                value: m.as_str(),
                label: m.label(),
                selected: draft.preferred_contact_method == Some(m),
            })
            .collect();
        Self {
            nav,
            card: PackageCard::from(draft.package),
            steps: stages(&FormStep::ALL, step, false, FormStep::title),
            step_number: step.number(),
            step_title: step.title(),
            is_first: step.prev().is_none(),
            is_last: step.next().is_none(),
            draft,
            errors,
            timelines,
            contact_methods,
        }
    }

    /// Error message for a field, if any.
    #[must_use]
    pub fn error_for(&self, field: &str) -> Option<&'static str> {
        self.errors.iter().find(|e| e.field == field).map(|e| e.message)
    }
}

/// Display the current step of the setup form.
///
/// `?package=` starts a new draft unless one for the same package is in
/// progress.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn form_page(
    State(state): State<AppState>,
    RequireUser { mut session, user }: RequireUser,
    Query(query): Query<FormQuery>,
) -> Result<Response> {
    let requested: Option<SetupPackage> = query.package.as_deref().and_then(|p| p.parse().ok());
    let scratch = session.doc.scratch_mut(&user.id);

    if let Some(package) = requested
        && scratch.setup_draft.as_ref().is_none_or(|d| d.package != package)
    {
        scratch.setup_draft = Some(SetupDraft::new(
            package,
            &user.name,
            user.email.as_str(),
            user.company.as_deref(),
        ));
        session.save().await?;
        tracing::info!(package = %package, "Setup draft started");
    }

    let Some(draft) = session.doc.current_scratch().and_then(|s| s.setup_draft.clone()) else {
        return Ok(Redirect::to("/setup").into_response());
    };

    let account = state.accounts().load(&user.id).await?;
    let nav = Nav::for_user(&user, &account, session.doc.current_scratch());
    Ok(FormTemplate::new(nav, draft, Vec::new()).into_response())
}

/// Save the posted step and move through the form.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn form_submit(
    State(state): State<AppState>,
    RequireUser { mut session, user }: RequireUser,
    Form(submission): Form<FormSubmission>,
) -> Result<Response> {
    let nav_request = Navigation::parse(&submission.action)
        .ok_or_else(|| AppError::BadRequest(format!("unknown action: {}", submission.action)))?;

    let scratch = session.doc.scratch_mut(&user.id);
    let draft = scratch.setup_draft.as_mut().ok_or(SetupError::NoDraft)?;
    let step = draft.step;
    apply_input(draft, step, submission.input);
    let outcome = navigate(draft, nav_request);
    let draft = draft.clone();
    session.save().await?;

    match outcome {
        NavOutcome::Moved(_) => Ok(Redirect::to("/setup/form").into_response()),
        NavOutcome::Submitted => {
            tracing::info!(package = %draft.package, "Setup form submitted");
            Ok(Redirect::to("/setup/payment").into_response())
        }
        NavOutcome::Blocked { errors, .. } => {
            let account = state.accounts().load(&user.id).await?;
            let nav = Nav::for_user(&user, &account, session.doc.current_scratch());
            Ok(FormTemplate::new(nav, draft, errors).into_response())
        }
    }
}

// =============================================================================
// Payment
// =============================================================================

/// Setup payment page template.
#[derive(Template, WebTemplate)]
#[template(path = "setup/payment.html")]
pub struct SetupPaymentTemplate {
    pub nav: Nav,
    pub draft: SetupDraft,
    pub card: PackageCard,
    /// Left to pay on completion.
    pub balance: Price,
}

/// Display the upfront payment for a submitted draft.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn payment_page(
    State(state): State<AppState>,
    RequireUser { session, user }: RequireUser,
) -> Result<Response> {
    let scratch = session.doc.current_scratch();
    let Some(draft) = scratch.and_then(|s| s.setup_draft.clone()) else {
        return Ok(Redirect::to("/setup").into_response());
    };
    if !draft.submitted {
        return Ok(Redirect::to("/setup/form").into_response());
    }

    let account = state.accounts().load(&user.id).await?;
    let card = PackageCard::from(draft.package);
    Ok(SetupPaymentTemplate {
        nav: Nav::for_user(&user, &account, scratch),
        balance: Price::new(
            card.full_price.amount - card.upfront.amount,
            card.full_price.currency_code,
        ),
        card,
        draft,
    }
    .into_response())
}

/// Take the upfront payment and record the setup request.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn pay(
    State(state): State<AppState>,
    RequireUser { mut session, user }: RequireUser,
) -> Result<Redirect> {
    let draft = session
        .doc
        .current_scratch()
        .and_then(|s| s.setup_draft.clone())
        .ok_or(SetupError::NoDraft)?;
    let (request, record) = charge(&draft, Utc::now())?;
    let request_id = request.id.clone();

    state
        .accounts()
        .update(&user.id, move |account| account.setup_requests.push(request))
        .await?;

    let scratch = session.doc.scratch_mut(&user.id);
    scratch.setup_payment = Some(record);
    scratch.setup_draft = None;
    session.save().await?;

    add_breadcrumb(
        "setup",
        "Setup payment taken",
        Some(&[("package", draft.package.as_str()), ("request_id", request_id.as_str())]),
    );
    tracing::info!(package = %draft.package, request_id = %request_id, "Setup payment taken");

    Ok(Redirect::to("/setup/status"))
}

// =============================================================================
// Status and dashboard
// =============================================================================

/// The setup request to show: the one just paid for, else the latest.
fn current_request<'a>(
    account: &'a AccountState,
    session: &CurrentSession,
) -> Option<&'a SetupRequest> {
    session
        .doc
        .current_scratch()
        .and_then(|s| s.setup_payment.as_ref())
        .and_then(|record| account.setup_request(&record.request_id))
        .or_else(|| account.latest_setup_request())
}

/// Post-payment status page template.
#[derive(Template, WebTemplate)]
#[template(path = "setup/status.html")]
pub struct StatusTemplate {
    pub nav: Nav,
    pub package: SetupPackage,
    pub amount: Price,
    pub status: SetupStatus,
    pub stages: Vec<StageView>,
}

/// Display the three-stage status of the latest setup payment.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn status(
    State(state): State<AppState>,
    RequireUser { session, user }: RequireUser,
) -> Result<Response> {
    let account = state.accounts().load(&user.id).await?;
    let record = session.doc.current_scratch().and_then(|s| s.setup_payment.as_ref());

    let (package, amount, status) = match (current_request(&account, &session), record) {
        (Some(request), _) => (request.package_name, request.amount_paid, request.status),
        // Not persisted (yet); show the receipt
        (None, Some(record)) => (record.package, record.amount, record.status),
        (None, None) => return Ok(Redirect::to("/setup").into_response()),
    };

    Ok(StatusTemplate {
        nav: Nav::for_user(&user, &account, session.doc.current_scratch()),
        package,
        amount,
        status,
        stages: progress_stages(status),
    }
    .into_response())
}

/// Setup dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "setup/dashboard.html")]
pub struct SetupDashboardTemplate {
    pub nav: Nav,
    pub request: Option<SetupRequest>,
    pub on_hold: bool,
    pub timeline: Vec<StageView>,
    /// Earlier requests, newest first.
    pub history: Vec<SetupRequest>,
}

/// Display the five-stage timeline of the customer's setup engagement.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn dashboard(
    State(state): State<AppState>,
    RequireUser { session, user }: RequireUser,
) -> Result<Response> {
    let account = state.accounts().load(&user.id).await?;
    let scratch = session.doc.current_scratch();
    if !has_completed_setup(&account, scratch) {
        return Ok(Redirect::to("/setup").into_response());
    }

    let request = current_request(&account, &session).cloned();
    let status = request.as_ref().map_or_else(
        || {
            scratch
                .and_then(|s| s.setup_payment.as_ref())
                .map_or(SetupStatus::PaymentCompleted, |r| r.status)
        },
        |r| r.status,
    );
    let history = account
        .setup_requests
        .iter()
        .rev()
        .filter(|r| request.as_ref().is_none_or(|current| current.id != r.id))
        .cloned()
        .collect();

    Ok(SetupDashboardTemplate {
        nav: Nav::for_user(&user, &account, scratch),
        on_hold: status == SetupStatus::OnHold,
        timeline: timeline_stages(status),
        request,
        history,
    }
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(views: &[StageView]) -> Vec<&'static str> {
        views.iter().map(|v| v.state).collect()
    }

    #[test]
    fn test_progress_projection() {
        assert_eq!(
            states(&progress_stages(SetupStatus::PaymentCompleted)),
            ["current", "upcoming", "upcoming"]
        );
        assert_eq!(
            states(&progress_stages(SetupStatus::Testing)),
            ["done", "current", "upcoming"]
        );
        assert_eq!(
            states(&progress_stages(SetupStatus::Completed)),
            ["done", "done", "done"]
        );
    }

    #[test]
    fn test_timeline_projection() {
        assert_eq!(
            states(&timeline_stages(SetupStatus::InReview)),
            ["done", "current", "upcoming", "upcoming", "upcoming"]
        );
        assert_eq!(
            states(&timeline_stages(SetupStatus::OnHold)),
            ["done", "done", "current", "upcoming", "upcoming"]
        );
    }

    #[test]
    fn test_package_card() {
        let card = PackageCard::from(SetupPackage::Subscriptions);
        assert_eq!(card.full_price.display(), "$749");
        assert_eq!(card.upfront.display(), "$375");
    }
}
