//! Marketing page handlers: home, pricing and the demo booking redirect.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect},
};
use rackz_core::{BillingCycle, SaasPackage};
use tracing::instrument;

use crate::content::Post;
use crate::filters;
use crate::routes::Nav;
use crate::services::CurrentSession;
use crate::state::AppState;

/// Number of posts teased on the home page.
const HOME_POSTS: usize = 3;

/// A plan as shown on the home and pricing pages.
#[derive(Clone)]
pub struct PlanCard {
    pub slug: &'static str,
    pub name: &'static str,
    pub monthly: String,
    pub yearly: String,
    pub features: &'static [&'static str],
    pub highlighted: bool,
}

impl PlanCard {
    fn new(package: SaasPackage) -> Self {
        Self {
            slug: package.as_str(),
            name: package.display_name(),
            monthly: package.price(BillingCycle::Monthly).display(),
            yearly: package.price(BillingCycle::Yearly).display(),
            features: plan_features(package),
            highlighted: package == SaasPackage::Pro,
        }
    }

    fn all() -> Vec<Self> {
        SaasPackage::ALL.into_iter().map(Self::new).collect()
    }
}

const fn plan_features(package: SaasPackage) -> &'static [&'static str] {
    match package {
        SaasPackage::Starter => &[
            "Payment volume and success rate",
            "Recent payments",
            "Subscription count and MRR",
        ],
        SaasPackage::Pro => &[
            "Everything in Starter",
            "Dispute tracking by status",
            "Dunning list of past-due subscriptions",
            "Weekday failure forecast",
        ],
        SaasPackage::Scale => &[
            "Everything in Pro",
            "Stripe, PayPal and Shopify in one place",
            "Revenue at risk and top failure codes",
        ],
    }
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub nav: Nav,
    pub plans: Vec<PlanCard>,
    pub posts: Vec<Post>,
}

/// Pricing page template.
#[derive(Template, WebTemplate)]
#[template(path = "pricing.html")]
pub struct PricingTemplate {
    pub nav: Nav,
    pub plans: Vec<PlanCard>,
}

/// Display the home page.
#[instrument(skip_all)]
pub async fn home(State(state): State<AppState>, session: CurrentSession) -> impl IntoResponse {
    HomeTemplate {
        nav: Nav::load(&state, &session).await,
        plans: PlanCard::all(),
        posts: state
            .content()
            .recent_posts(HOME_POSTS, None)
            .into_iter()
            .cloned()
            .collect(),
    }
}

/// Display the pricing page.
#[instrument(skip_all)]
pub async fn pricing(State(state): State<AppState>, session: CurrentSession) -> impl IntoResponse {
    PricingTemplate {
        nav: Nav::load(&state, &session).await,
        plans: PlanCard::all(),
    }
}

/// Send visitors to the demo booking page.
pub async fn book_demo(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.config().calendly_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_cards() {
        let cards = PlanCard::all();
        assert_eq!(cards.len(), 3);
        let pro = cards.iter().find(|c| c.slug == "pro");
        assert!(pro.is_some_and(|c| c.monthly == "$79" && c.yearly == "$626" && c.highlighted));
    }
}
