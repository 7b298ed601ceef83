//! SaaS plan payment.
//!
//! The page shows the price of the chosen plan and links to the hosted
//! payment page for it. The hosted page returns the customer to
//! `/payment/success`, which records the confirmation and hands over to the
//! dashboard router.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::Redirect,
};
use chrono::Utc;
use rackz_core::{BillingCycle, Price, SaasPackage};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireUser;
use crate::models::{PaymentRecord, UserScratch};
use crate::routes::Nav;
use crate::state::AppState;

/// Plan selection carried in the query string.
#[derive(Debug, Default, Deserialize)]
pub struct PlanParams {
    pub package: Option<String>,
    pub billing: Option<String>,
}

/// Plan payment page template.
#[derive(Template, WebTemplate)]
#[template(path = "payment/index.html")]
pub struct PaymentTemplate {
    pub nav: Nav,
    pub package: SaasPackage,
    pub billing: BillingCycle,
    pub price: Price,
    /// Hosted payment page, if one is configured for this plan.
    pub payment_link: Option<String>,
    /// Confirmation link used when no hosted page is configured.
    pub confirm_href: String,
}

/// Plan to charge for: query, then the plan picked at sign-up, then the
/// persisted plan.
fn resolve_plan(
    params: &PlanParams,
    scratch: Option<&UserScratch>,
    persisted: (Option<SaasPackage>, Option<BillingCycle>),
) -> (SaasPackage, BillingCycle) {
    let intent = scratch.and_then(|s| s.signup);
    let package = params
        .package
        .as_deref()
        .and_then(|p| p.parse().ok())
        .or(intent.map(|i| i.package))
        .or(persisted.0)
        .unwrap_or(SaasPackage::Starter);
    let billing = params
        .billing
        .as_deref()
        .and_then(|b| b.parse().ok())
        .or(intent.map(|i| i.billing))
        .or(persisted.1)
        .unwrap_or_default();
    (package, billing)
}

/// Display the payment page.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser { session, user }: RequireUser,
    Query(params): Query<PlanParams>,
) -> Result<PaymentTemplate> {
    let account = state.accounts().load(&user.id).await?;
    let scratch = session.doc.current_scratch();
    let (package, billing) = resolve_plan(&params, scratch, (account.package, account.billing));

    Ok(PaymentTemplate {
        nav: Nav::for_user(&user, &account, scratch),
        package,
        billing,
        price: package.price(billing),
        payment_link: state
            .config()
            .payment_links
            .get(package, billing)
            .map(String::from),
        confirm_href: format!("/payment/success?package={package}&billing={billing}"),
    })
}

/// Record a completed plan payment and continue to the dashboard.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn success(
    State(state): State<AppState>,
    RequireUser { mut session, user }: RequireUser,
    Query(params): Query<PlanParams>,
) -> Result<Redirect> {
    let account = state.accounts().load(&user.id).await?;
    let (package, billing) = resolve_plan(
        &params,
        session.doc.current_scratch(),
        (account.package, account.billing),
    );

    let scratch = session.doc.scratch_mut(&user.id);
    scratch.signup = None;
    scratch.payment = Some(PaymentRecord {
        package,
        billing,
        amount: package.price(billing),
        confirmed_at: Utc::now(),
    });
    session.save().await?;

    state
        .accounts()
        .update(&user.id, |account| {
            account.package = Some(package);
            account.billing = Some(billing);
        })
        .await?;

    add_breadcrumb(
        "payment",
        "Plan payment confirmed",
        Some(&[("package", package.as_str()), ("billing", billing.as_str())]),
    );
    tracing::info!(package = %package, billing = %billing, "Plan payment confirmed");

    Ok(Redirect::to(&format!("/dashboard?package={package}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignupIntent;

    fn params(package: Option<&str>, billing: Option<&str>) -> PlanParams {
        PlanParams {
            package: package.map(String::from),
            billing: billing.map(String::from),
        }
    }

    fn intent(package: SaasPackage, billing: BillingCycle) -> UserScratch {
        UserScratch {
            signup: Some(SignupIntent {
                package,
                billing,
                created_at: Utc::now(),
            }),
            ..UserScratch::default()
        }
    }

    #[test]
    fn test_query_wins() {
        let scratch = intent(SaasPackage::Scale, BillingCycle::Monthly);
        assert_eq!(
            resolve_plan(&params(Some("pro"), Some("yearly")), Some(&scratch), (None, None)),
            (SaasPackage::Pro, BillingCycle::Yearly)
        );
    }

    #[test]
    fn test_intent_then_persisted() {
        let scratch = intent(SaasPackage::Pro, BillingCycle::Yearly);
        assert_eq!(
            resolve_plan(
                &params(None, None),
                Some(&scratch),
                (Some(SaasPackage::Scale), Some(BillingCycle::Monthly))
            ),
            (SaasPackage::Pro, BillingCycle::Yearly)
        );
        assert_eq!(
            resolve_plan(
                &params(Some("bogus"), None),
                None,
                (Some(SaasPackage::Scale), None)
            ),
            (SaasPackage::Scale, BillingCycle::Monthly)
        );
        assert_eq!(
            resolve_plan(&params(None, None), None, (None, None)),
            (SaasPackage::Starter, BillingCycle::Monthly)
        );
    }

    #[test]
    fn test_yearly_pro_price() {
        assert_eq!(
            SaasPackage::Pro.price(BillingCycle::Yearly).display(),
            "$626"
        );
    }
}
