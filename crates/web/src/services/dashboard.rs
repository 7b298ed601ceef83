//! Dashboard panels.
//!
//! Each plan shows the panels of the plan below it plus its own:
//!
//! | plan    | panels                                   |
//! |---------|------------------------------------------|
//! | Starter | overview, payments, subscriptions        |
//! | Pro     | + disputes, dunning, prediction          |
//! | Scale   | + providers, risk                        |
//!
//! Every panel is a [`PanelState`]. Panels backed by Stripe data are idle
//! until Stripe is connected; a failed fetch puts only the panels that need
//! that data into the error state. An unauthorized answer is never
//! swallowed here: it propagates so the session can be ended.

use core::fmt;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rackz_core::{
    CurrencyCode, DisputeFilter, DisputeStatus, Price, Provider, SaasPackage, UserId,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use tracing::instrument;

use crate::api::{
    ApiClient, ApiError, Charge, ChargeStatus, Interval, Subscription, SubscriptionStatus,
};

/// Number of charges in the payments panel.
pub const RECENT_PAYMENTS: usize = 10;

/// Number of failure codes in the risk panel.
pub const TOP_FAILURE_CODES: usize = 3;

/// Weekday multipliers applied to the failure rate, Monday first.
const WEEKDAY_FACTORS: [(&str, i64); 7] = [
    ("Mon", 115),
    ("Tue", 95),
    ("Wed", 90),
    ("Thu", 100),
    ("Fri", 120),
    ("Sat", 85),
    ("Sun", 95),
];

// =============================================================================
// Panel state
// =============================================================================

/// Lifecycle of one panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum PanelState<T> {
    /// Nothing to show yet (Stripe not connected).
    Idle,
    /// Placeholder until the fragment is fetched.
    Loading,
    Loaded(T),
    Error(String),
}

impl<T> PanelState<T> {
    #[must_use]
    pub const fn loaded(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }

    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Loaded(_) => "loaded",
            Self::Error(_) => "error",
        }
    }

    #[must_use]
    pub fn map<U>(&self, f: impl FnOnce(&T) -> U) -> PanelState<U> {
        match self {
            Self::Idle => PanelState::Idle,
            Self::Loading => PanelState::Loading,
            Self::Loaded(value) => PanelState::Loaded(f(value)),
            Self::Error(message) => PanelState::Error(message.clone()),
        }
    }

    /// Combine two states; errors win over idle, idle over loading.
    #[must_use]
    pub fn zip<U, R>(&self, other: &PanelState<U>, f: impl FnOnce(&T, &U) -> R) -> PanelState<R> {
        match (self, other) {
            (Self::Loaded(a), PanelState::Loaded(b)) => PanelState::Loaded(f(a, b)),
            (Self::Error(m), _) | (_, PanelState::Error(m)) => PanelState::Error(m.clone()),
            (Self::Idle, _) | (_, PanelState::Idle) => PanelState::Idle,
            _ => PanelState::Loading,
        }
    }
}

// =============================================================================
// Panels
// =============================================================================

/// A dashboard panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Panel {
    Overview,
    Payments,
    Subscriptions,
    Disputes,
    Dunning,
    Prediction,
    Providers,
    Risk,
}

impl Panel {
    pub const ALL: [Self; 8] = [
        Self::Overview,
        Self::Payments,
        Self::Subscriptions,
        Self::Disputes,
        Self::Dunning,
        Self::Prediction,
        Self::Providers,
        Self::Risk,
    ];

    /// Cheapest plan showing this panel.
    #[must_use]
    pub const fn min_package(self) -> SaasPackage {
        match self {
            Self::Overview | Self::Payments | Self::Subscriptions => SaasPackage::Starter,
            Self::Disputes | Self::Dunning | Self::Prediction => SaasPackage::Pro,
            Self::Providers | Self::Risk => SaasPackage::Scale,
        }
    }

    /// Panels shown for a plan, in page order.
    #[must_use]
    pub fn for_package(package: SaasPackage) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|p| package.includes(p.min_package()))
            .collect()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Payments => "payments",
            Self::Subscriptions => "subscriptions",
            Self::Disputes => "disputes",
            Self::Dunning => "dunning",
            Self::Prediction => "prediction",
            Self::Providers => "providers",
            Self::Risk => "risk",
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Payments => "Recent payments",
            Self::Subscriptions => "Subscriptions",
            Self::Disputes => "Disputes",
            Self::Dunning => "Dunning",
            Self::Prediction => "Failure forecast",
            Self::Providers => "Payment providers",
            Self::Risk => "Revenue at risk",
        }
    }

    const fn needs_charges(self) -> bool {
        matches!(
            self,
            Self::Overview | Self::Payments | Self::Disputes | Self::Prediction | Self::Risk
        )
    }

    const fn needs_subscriptions(self) -> bool {
        matches!(self, Self::Subscriptions | Self::Dunning | Self::Risk)
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Panel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown panel: {s}"))
    }
}

// =============================================================================
// Panel data
// =============================================================================

/// Headline payment numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overview {
    /// Sum of successful charges.
    pub volume: Price,
    pub successful: usize,
    pub failed: usize,
    /// Percentage of settled charges that succeeded, one decimal.
    pub success_rate: Decimal,
    pub refunds: Price,
}

impl Overview {
    /// Percentage of settled charges that failed, one decimal.
    #[must_use]
    pub fn failure_rate(&self) -> Decimal {
        if self.successful + self.failed == 0 {
            Decimal::ZERO
        } else {
            Decimal::ONE_HUNDRED - self.success_rate
        }
    }
}

/// One row of the payments panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRow {
    pub id: String,
    pub amount: Price,
    pub status: ChargeStatus,
    pub customer: Option<String>,
    pub description: Option<String>,
    pub failure_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Subscription counts and monthly recurring revenue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionSummary {
    pub active: usize,
    pub trialing: usize,
    pub past_due: usize,
    pub canceled: usize,
    /// Monthly recurring revenue of active subscriptions.
    pub mrr: Price,
}

/// A dispute with the charge it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisputeRow {
    pub id: String,
    pub charge_id: String,
    pub amount: Price,
    pub status: DisputeStatus,
    pub reason: Option<String>,
    pub customer: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Dispute totals per bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DisputeCounts {
    pub all: usize,
    pub active: usize,
    pub won: usize,
    pub lost: usize,
}

impl DisputeCounts {
    #[must_use]
    pub const fn get(&self, filter: DisputeFilter) -> usize {
        match filter {
            DisputeFilter::All => self.all,
            DisputeFilter::Active => self.active,
            DisputeFilter::Won => self.won,
            DisputeFilter::Lost => self.lost,
        }
    }
}

/// Disputes filtered by bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisputesPanel {
    pub filter: DisputeFilter,
    pub disputes: Vec<DisputeRow>,
    pub counts: DisputeCounts,
}

/// A subscription in dunning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DunningRow {
    pub id: String,
    pub customer_email: Option<String>,
    pub amount: Price,
    pub status: SubscriptionStatus,
    pub current_period_end: DateTime<Utc>,
}

/// Past-due and unpaid subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dunning {
    pub subscriptions: Vec<DunningRow>,
    /// Monthly revenue of the listed subscriptions.
    pub at_risk: Price,
}

/// Projected failure rate for one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictionDay {
    pub label: &'static str,
    pub rate: Decimal,
    /// Bar height relative to the highest day, 0-100.
    pub bar: u32,
}

/// Weekday failure forecast derived from the overall failure rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prediction {
    pub failure_rate: Decimal,
    pub days: Vec<PredictionDay>,
}

/// A provider and whether it is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderRow {
    pub provider: Provider,
    pub connected: bool,
}

/// Connected providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvidersPanel {
    pub providers: Vec<ProviderRow>,
}

/// A failure code and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureCode {
    pub code: String,
    pub count: usize,
}

/// Revenue exposed to dunning and disputes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Risk {
    pub revenue_at_risk: Price,
    pub past_due_mrr: Price,
    pub disputed: Price,
    pub top_failure_codes: Vec<FailureCode>,
}

// =============================================================================
// Builders
// =============================================================================

fn sum(prices: impl Iterator<Item = Price>, currency: CurrencyCode) -> Price {
    Price::new(prices.map(|p| p.amount).sum(), currency)
}

fn charge_currency(charges: &[Charge]) -> CurrencyCode {
    charges
        .first()
        .map(|c| c.price().currency_code)
        .unwrap_or_default()
}

/// Headline numbers over all charges.
#[must_use]
pub fn overview(charges: &[Charge]) -> Overview {
    let currency = charge_currency(charges);
    let successful = charges
        .iter()
        .filter(|c| c.status == ChargeStatus::Succeeded)
        .count();
    let failed = charges
        .iter()
        .filter(|c| c.status == ChargeStatus::Failed)
        .count();
    let settled = successful + failed;
    let success_rate = if settled == 0 {
        Decimal::ZERO
    } else {
        (Decimal::from(successful) * Decimal::ONE_HUNDRED / Decimal::from(settled)).round_dp(1)
    };

    Overview {
        volume: sum(
            charges
                .iter()
                .filter(|c| c.status == ChargeStatus::Succeeded)
                .map(Charge::price),
            currency,
        ),
        successful,
        failed,
        success_rate,
        refunds: sum(charges.iter().map(Charge::refunded), currency),
    }
}

/// The most recent charges. Expects charges newest first.
#[must_use]
pub fn recent_payments(charges: &[Charge]) -> Vec<PaymentRow> {
    charges
        .iter()
        .take(RECENT_PAYMENTS)
        .map(|c| PaymentRow {
            id: c.id.clone(),
            amount: c.price(),
            status: c.status,
            customer: c.receipt_email.clone(),
            description: c.description.clone(),
            failure_code: c.failure_code.clone(),
            created_at: c.created_at(),
        })
        .collect()
}

/// Normalize a subscription's amount to one month.
fn monthly_amount(sub: &Subscription) -> Decimal {
    let amount = sub.price().amount;
    match sub.interval {
        Interval::Day => amount * Decimal::from(365) / Decimal::from(12),
        Interval::Week => amount * Decimal::from(52) / Decimal::from(12),
        Interval::Month => amount,
        Interval::Year => amount / Decimal::from(12),
    }
}

fn mrr<'a>(subs: impl Iterator<Item = &'a Subscription>) -> Price {
    let mut currency = None;
    let total: Decimal = subs
        .inspect(|s| {
            currency.get_or_insert(s.currency_code());
        })
        .map(monthly_amount)
        .sum();
    Price::new(total.round_dp(2), currency.unwrap_or_default())
}

/// Subscription counts and MRR.
#[must_use]
pub fn subscription_summary(subs: &[Subscription]) -> SubscriptionSummary {
    let count = |status| subs.iter().filter(|s| s.status == status).count();
    SubscriptionSummary {
        active: count(SubscriptionStatus::Active),
        trialing: count(SubscriptionStatus::Trialing),
        past_due: count(SubscriptionStatus::PastDue),
        canceled: count(SubscriptionStatus::Canceled),
        mrr: mrr(subs.iter().filter(|s| s.status == SubscriptionStatus::Active)),
    }
}

/// Every dispute attached to a charge, newest first.
#[must_use]
pub fn dispute_rows(charges: &[Charge]) -> Vec<DisputeRow> {
    let mut rows: Vec<DisputeRow> = charges
        .iter()
        .filter_map(|c| {
            c.dispute.as_ref().map(|d| DisputeRow {
                id: d.id.clone(),
                charge_id: c.id.clone(),
                amount: d.price(),
                status: d.status,
                reason: d.reason.clone(),
                customer: c.receipt_email.clone(),
                created_at: d.created_at(),
            })
        })
        .collect();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    rows
}

/// Disputes in `filter`'s bucket, with counts for every bucket.
#[must_use]
pub fn disputes(charges: &[Charge], filter: DisputeFilter) -> DisputesPanel {
    let rows = dispute_rows(charges);
    let count = |f: DisputeFilter| rows.iter().filter(|r| f.matches(r.status)).count();
    let counts = DisputeCounts {
        all: rows.len(),
        active: count(DisputeFilter::Active),
        won: count(DisputeFilter::Won),
        lost: count(DisputeFilter::Lost),
    };
    DisputesPanel {
        filter,
        disputes: rows.into_iter().filter(|r| filter.matches(r.status)).collect(),
        counts,
    }
}

/// Subscriptions in dunning.
#[must_use]
pub fn dunning(subs: &[Subscription]) -> Dunning {
    let delinquent: Vec<&Subscription> = subs.iter().filter(|s| s.status.is_delinquent()).collect();
    Dunning {
        at_risk: mrr(delinquent.iter().copied()),
        subscriptions: delinquent
            .into_iter()
            .map(|s| DunningRow {
                id: s.id.clone(),
                customer_email: s.customer_email.clone(),
                amount: s.price(),
                status: s.status,
                current_period_end: s.current_period_end_at(),
            })
            .collect(),
    }
}

/// Weekday forecast from the overall failure rate.
#[must_use]
pub fn prediction(overview: &Overview) -> Prediction {
    let failure_rate = overview.failure_rate();
    let rates: Vec<(&'static str, Decimal)> = WEEKDAY_FACTORS
        .iter()
        .map(|&(label, factor)| {
            let rate = (failure_rate * Decimal::new(factor, 2))
                .min(Decimal::ONE_HUNDRED)
                .round_dp(1);
            (label, rate)
        })
        .collect();
    let max = rates
        .iter()
        .map(|(_, rate)| *rate)
        .max()
        .unwrap_or(Decimal::ZERO);

    Prediction {
        failure_rate,
        days: rates
            .into_iter()
            .map(|(label, rate)| PredictionDay {
                label,
                rate,
                bar: if max.is_zero() {
                    0
                } else {
                    (rate * Decimal::ONE_HUNDRED / max)
                        .round()
                        .to_u32()
                        .unwrap_or_default()
                },
            })
            .collect(),
    }
}

/// Every provider with its connection flag.
#[must_use]
pub fn providers(connected: &BTreeSet<Provider>) -> ProvidersPanel {
    ProvidersPanel {
        providers: Provider::ALL
            .into_iter()
            .map(|provider| ProviderRow {
                provider,
                connected: connected.contains(&provider),
            })
            .collect(),
    }
}

/// Revenue at risk and the most common failure codes.
#[must_use]
pub fn risk(charges: &[Charge], subs: &[Subscription]) -> Risk {
    let past_due_mrr = mrr(subs.iter().filter(|s| s.status.is_delinquent()));
    let disputed = sum(
        charges
            .iter()
            .filter_map(|c| c.dispute.as_ref())
            .filter(|d| d.status.is_active())
            .map(crate::api::Dispute::price),
        past_due_mrr.currency_code,
    );

    let mut codes: HashMap<&str, usize> = HashMap::new();
    for charge in charges.iter().filter(|c| c.status == ChargeStatus::Failed) {
        *codes
            .entry(charge.failure_code.as_deref().unwrap_or("unknown"))
            .or_default() += 1;
    }
    let mut top: Vec<FailureCode> = codes
        .into_iter()
        .map(|(code, count)| FailureCode {
            code: code.to_owned(),
            count,
        })
        .collect();
    top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.code.cmp(&b.code)));
    top.truncate(TOP_FAILURE_CODES);

    Risk {
        revenue_at_risk: Price::new(
            past_due_mrr.amount + disputed.amount,
            past_due_mrr.currency_code,
        ),
        past_due_mrr,
        disputed,
        top_failure_codes: top,
    }
}

// =============================================================================
// Sources and composition
// =============================================================================

/// Upstream data the panels are built from.
#[derive(Debug, Clone)]
pub struct Sources {
    pub stripe_connected: bool,
    pub charges: PanelState<Arc<Vec<Charge>>>,
    pub subscriptions: PanelState<Arc<Vec<Subscription>>>,
    /// Connected providers, Stripe included when connected.
    pub providers: BTreeSet<Provider>,
}

const FETCH_FAILED: &str = "We couldn't load this data. Please try again shortly.";

fn settle<T>(result: Result<T, ApiError>, what: &'static str) -> Result<PanelState<T>, ApiError> {
    match result {
        Ok(value) => Ok(PanelState::Loaded(value)),
        Err(ApiError::Unauthorized) => Err(ApiError::Unauthorized),
        Err(e) => {
            tracing::warn!(error = %e, source = what, "Dashboard source failed");
            Ok(PanelState::Error(FETCH_FAILED.to_owned()))
        }
    }
}

/// Fetch what `panels` need, concurrently.
///
/// # Errors
///
/// Returns `ApiError::Unauthorized` if any call was unauthorized. Other
/// failures are reported in the affected [`PanelState`]s.
#[instrument(skip(api, token, connected), fields(user_id = %user))]
pub async fn fetch_sources(
    api: &ApiClient,
    user: &UserId,
    token: &str,
    connected: &BTreeSet<Provider>,
    panels: &[Panel],
) -> Result<Sources, ApiError> {
    let mut providers: BTreeSet<Provider> = connected
        .iter()
        .copied()
        .filter(|p| !p.is_authoritative())
        .collect();

    let account = match api.stripe_account(user, token).await {
        Ok(account) => account,
        Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read Stripe connection");
            return Ok(Sources {
                stripe_connected: false,
                charges: PanelState::Error(FETCH_FAILED.to_owned()),
                subscriptions: PanelState::Error(FETCH_FAILED.to_owned()),
                providers,
            });
        }
    };

    if !account.connected {
        return Ok(Sources {
            stripe_connected: false,
            charges: PanelState::Idle,
            subscriptions: PanelState::Idle,
            providers,
        });
    }
    providers.insert(Provider::Stripe);

    let needs_charges = panels.iter().any(|p| p.needs_charges());
    let needs_subscriptions = panels.iter().any(|p| p.needs_subscriptions());

    let (charges, subscriptions) = tokio::join!(
        async {
            if needs_charges {
                settle(api.charges(user, token).await, "charges")
            } else {
                Ok(PanelState::Idle)
            }
        },
        async {
            if needs_subscriptions {
                settle(api.subscriptions(user, token).await, "subscriptions")
            } else {
                Ok(PanelState::Idle)
            }
        },
    );

    Ok(Sources {
        stripe_connected: true,
        charges: charges?,
        subscriptions: subscriptions?,
        providers,
    })
}

/// Starter panels.
#[derive(Debug, Clone, Serialize)]
pub struct StarterDashboard {
    pub overview: PanelState<Overview>,
    pub payments: PanelState<Vec<PaymentRow>>,
    pub subscriptions: PanelState<SubscriptionSummary>,
}

/// Pro panels: Starter plus disputes, dunning and the forecast.
#[derive(Debug, Clone, Serialize)]
pub struct ProDashboard {
    #[serde(flatten)]
    pub starter: StarterDashboard,
    pub disputes: PanelState<DisputesPanel>,
    pub dunning: PanelState<Dunning>,
    pub prediction: PanelState<Prediction>,
}

/// Scale panels: Pro plus providers and risk.
#[derive(Debug, Clone, Serialize)]
pub struct ScaleDashboard {
    #[serde(flatten)]
    pub pro: ProDashboard,
    pub providers: PanelState<ProvidersPanel>,
    pub risk: PanelState<Risk>,
}

/// A plan's dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "package", rename_all = "lowercase")]
pub enum Dashboard {
    Starter(StarterDashboard),
    Pro(ProDashboard),
    Scale(ScaleDashboard),
}

impl Sources {
    #[must_use]
    pub fn starter(&self) -> StarterDashboard {
        StarterDashboard {
            overview: self.charges.map(|c| overview(c)),
            payments: self.charges.map(|c| recent_payments(c)),
            subscriptions: self.subscriptions.map(|s| subscription_summary(s)),
        }
    }

    #[must_use]
    pub fn pro(&self, filter: DisputeFilter) -> ProDashboard {
        let starter = self.starter();
        let prediction = starter.overview.map(prediction);
        ProDashboard {
            starter,
            disputes: self.disputes(filter),
            dunning: self.subscriptions.map(|s| dunning(s)),
            prediction,
        }
    }

    #[must_use]
    pub fn scale(&self, filter: DisputeFilter) -> ScaleDashboard {
        ScaleDashboard {
            pro: self.pro(filter),
            providers: PanelState::Loaded(providers(&self.providers)),
            risk: self.risk(),
        }
    }

    #[must_use]
    pub fn disputes(&self, filter: DisputeFilter) -> PanelState<DisputesPanel> {
        self.charges.map(|c| disputes(c, filter))
    }

    #[must_use]
    pub fn risk(&self) -> PanelState<Risk> {
        self.charges.zip(&self.subscriptions, |c, s| risk(c, s))
    }

    /// The dashboard for `package`.
    #[must_use]
    pub fn dashboard(&self, package: SaasPackage, filter: DisputeFilter) -> Dashboard {
        match package {
            SaasPackage::Starter => Dashboard::Starter(self.starter()),
            SaasPackage::Pro => Dashboard::Pro(self.pro(filter)),
            SaasPackage::Scale => Dashboard::Scale(self.scale(filter)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::Dispute;

    fn charge(id: &str, status: ChargeStatus, amount: i64, created: i64) -> Charge {
        Charge {
            id: id.into(),
            amount,
            amount_refunded: 0,
            currency: "usd".into(),
            status,
            created,
            failure_code: None,
            receipt_email: None,
            description: None,
            dispute: None,
        }
    }

    fn disputed(id: &str, status: DisputeStatus, created: i64) -> Charge {
        let mut c = charge(id, ChargeStatus::Succeeded, 5000, created);
        c.dispute = Some(Dispute {
            id: format!("dp_{id}"),
            amount: 5000,
            currency: "usd".into(),
            status,
            reason: Some("fraudulent".into()),
            created,
        });
        c
    }

    fn subscription(status: SubscriptionStatus, amount: i64, interval: Interval) -> Subscription {
        Subscription {
            id: "sub".into(),
            status,
            amount,
            currency: "usd".into(),
            interval,
            customer_email: None,
            current_period_end: 0,
        }
    }

    #[test]
    fn test_panels_per_package() {
        assert_eq!(Panel::for_package(SaasPackage::Starter).len(), 3);
        assert_eq!(Panel::for_package(SaasPackage::Pro).len(), 6);
        assert_eq!(Panel::for_package(SaasPackage::Scale), Panel::ALL.to_vec());
        assert!(!SaasPackage::Starter.includes(Panel::Risk.min_package()));
    }

    #[test]
    fn test_overview_rates() {
        let mut refunded = charge("a", ChargeStatus::Succeeded, 1000, 3);
        refunded.amount_refunded = 250;
        let charges = vec![
            refunded,
            charge("b", ChargeStatus::Succeeded, 2000, 2),
            charge("c", ChargeStatus::Succeeded, 1050, 1),
            charge("d", ChargeStatus::Failed, 999, 0),
            charge("e", ChargeStatus::Pending, 500, 0),
        ];
        let o = overview(&charges);
        assert_eq!(o.volume.display(), "$40.50");
        assert_eq!(o.refunds.display(), "$2.50");
        assert_eq!((o.successful, o.failed), (3, 1));
        assert_eq!(o.success_rate, Decimal::new(750, 1));
        assert_eq!(o.failure_rate(), Decimal::new(250, 1));
    }

    #[test]
    fn test_recent_payments_are_capped() {
        let charges: Vec<Charge> = (0..15)
            .map(|i| charge(&format!("ch_{i}"), ChargeStatus::Succeeded, 100, 100 - i))
            .collect();
        let rows = recent_payments(&charges);
        assert_eq!(rows.len(), RECENT_PAYMENTS);
        assert_eq!(rows.first().unwrap().id, "ch_0");
    }

    #[test]
    fn test_dispute_filter_won() {
        let charges = vec![
            disputed("a", DisputeStatus::Won, 3),
            disputed("b", DisputeStatus::Lost, 2),
            disputed("c", DisputeStatus::NeedsResponse, 1),
            charge("d", ChargeStatus::Succeeded, 100, 0),
        ];
        let panel = disputes(&charges, DisputeFilter::Won);
        assert_eq!(panel.disputes.len(), 1);
        assert_eq!(panel.disputes.first().unwrap().status, DisputeStatus::Won);
        assert_eq!(
            panel.counts,
            DisputeCounts {
                all: 3,
                active: 1,
                won: 1,
                lost: 1
            }
        );
        assert_eq!(disputes(&charges, DisputeFilter::All).disputes.len(), 3);
    }

    #[test]
    fn test_mrr_normalizes_intervals() {
        let subs = vec![
            subscription(SubscriptionStatus::Active, 2900, Interval::Month),
            subscription(SubscriptionStatus::Active, 120_000, Interval::Year),
            subscription(SubscriptionStatus::Canceled, 9900, Interval::Month),
            subscription(SubscriptionStatus::PastDue, 4900, Interval::Month),
        ];
        let summary = subscription_summary(&subs);
        assert_eq!(summary.mrr, Price::usd(129));
        assert_eq!((summary.active, summary.past_due, summary.canceled), (2, 1, 1));

        let d = dunning(&subs);
        assert_eq!(d.subscriptions.len(), 1);
        assert_eq!(d.at_risk, Price::usd(49));
    }

    #[test]
    fn test_prediction_scales_failure_rate() {
        let o = Overview {
            volume: Price::usd(0),
            successful: 9,
            failed: 1,
            success_rate: Decimal::from(90),
            refunds: Price::usd(0),
        };
        let p = prediction(&o);
        assert_eq!(p.failure_rate, Decimal::from(10));
        let friday = p.days.iter().find(|d| d.label == "Fri").unwrap();
        assert_eq!(friday.rate, Decimal::from(12));
        assert_eq!(friday.bar, 100);
        assert_eq!(p.days.len(), 7);
    }

    #[test]
    fn test_risk_adds_past_due_and_active_disputes() {
        let mut failed = charge("f", ChargeStatus::Failed, 100, 0);
        failed.failure_code = Some("card_declined".into());
        let charges = vec![
            disputed("a", DisputeStatus::NeedsResponse, 2),
            disputed("b", DisputeStatus::Won, 1),
            failed.clone(),
            failed,
            charge("g", ChargeStatus::Failed, 100, 0),
        ];
        let subs = vec![subscription(SubscriptionStatus::Unpaid, 1000, Interval::Month)];
        let r = risk(&charges, &subs);
        assert_eq!(r.revenue_at_risk, Price::usd(60));
        let codes: Vec<_> = r.top_failure_codes.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, ["card_declined", "unknown"]);
    }

    #[test]
    fn test_panel_state_serialization() {
        let idle: PanelState<u8> = PanelState::Idle;
        assert_eq!(serde_json::to_value(&idle).unwrap(), serde_json::json!({"status": "idle"}));
        let error: PanelState<u8> = PanelState::Error("boom".into());
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            serde_json::json!({"status": "error", "data": "boom"})
        );
    }

    #[test]
    fn test_dashboard_composition_is_flat() {
        let sources = Sources {
            stripe_connected: false,
            charges: PanelState::Idle,
            subscriptions: PanelState::Idle,
            providers: BTreeSet::from([Provider::Paypal]),
        };
        let json =
            serde_json::to_value(sources.dashboard(SaasPackage::Scale, DisputeFilter::All))
                .unwrap();
        assert_eq!(json["package"], "scale");
        assert_eq!(json["overview"]["status"], "idle");
        assert_eq!(json["risk"]["status"], "idle");
        assert_eq!(json["providers"]["status"], "loaded");
    }

    #[tokio::test]
    async fn test_unreachable_api_fails_both_sources() {
        let api = ApiClient::new(&crate::config::ApiConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout: std::time::Duration::from_secs(1),
        })
        .unwrap();
        let sources = fetch_sources(
            &api,
            &UserId::from("usr_1"),
            "tok",
            &BTreeSet::from([Provider::Shopify]),
            &Panel::for_package(SaasPackage::Pro),
        )
        .await
        .unwrap();
        assert!(!sources.stripe_connected);
        assert!(matches!(sources.charges, PanelState::Error(_)));
        assert!(matches!(sources.subscriptions, PanelState::Error(_)));
        assert_eq!(sources.providers, BTreeSet::from([Provider::Shopify]));
    }
}
