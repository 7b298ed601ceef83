//! Which dashboard a user lands on.
//!
//! Customers who paid for a setup engagement get the setup dashboard and
//! never see a SaaS dashboard. Everyone else gets the SaaS dashboard of the
//! plan resolved as: `package` query parameter, then a fresh payment
//! confirmation, then the persisted plan, then Starter. The header's
//! dashboard link is computed with the same rules.

use rackz_core::SaasPackage;
use serde::Serialize;

use crate::models::{AccountState, PaymentRecord, UserScratch};

/// Where a resolved package came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageSource {
    Query,
    PaymentRecord,
    Persisted,
    Default,
}

/// Dashboard a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DashboardRoute {
    Setup,
    Saas {
        package: SaasPackage,
        source: PackageSource,
    },
}

impl DashboardRoute {
    /// Path of the page this route renders.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Setup => "/setup-dashboard",
            Self::Saas { .. } => "/dashboard",
        }
    }

    /// Package to write back, if it differs from what is stored.
    #[must_use]
    pub fn package_to_persist(self, account: &AccountState) -> Option<SaasPackage> {
        match self {
            Self::Saas { package, .. } if account.package != Some(package) => Some(package),
            _ => None,
        }
    }
}

/// Whether the user has paid for a setup engagement.
#[must_use]
pub fn has_completed_setup(account: &AccountState, scratch: Option<&UserScratch>) -> bool {
    account.has_paid_setup()
        || scratch
            .and_then(|s| s.setup_payment.as_ref())
            .is_some_and(|p| p.is_completed())
}

/// Resolve the SaaS plan to show. Unknown query values are ignored.
#[must_use]
pub fn resolve_package(
    query: Option<&str>,
    payment: Option<&PaymentRecord>,
    persisted: Option<SaasPackage>,
) -> (SaasPackage, PackageSource) {
    if let Some(package) = query.and_then(|q| q.parse().ok()) {
        return (package, PackageSource::Query);
    }
    if let Some(payment) = payment {
        return (payment.package, PackageSource::PaymentRecord);
    }
    if let Some(package) = persisted {
        return (package, PackageSource::Persisted);
    }
    (SaasPackage::Starter, PackageSource::Default)
}

/// Route a `/dashboard` request.
#[must_use]
pub fn route_dashboard(
    query: Option<&str>,
    account: &AccountState,
    scratch: Option<&UserScratch>,
) -> DashboardRoute {
    if has_completed_setup(account, scratch) {
        return DashboardRoute::Setup;
    }
    let (package, source) = resolve_package(
        query,
        scratch.and_then(|s| s.payment.as_ref()),
        account.package,
    );
    DashboardRoute::Saas { package, source }
}

/// Target of the header's "Dashboard" link.
#[must_use]
pub fn dashboard_href(account: &AccountState, scratch: Option<&UserScratch>) -> String {
    match route_dashboard(None, account, scratch) {
        DashboardRoute::Setup => DashboardRoute::Setup.path().to_owned(),
        DashboardRoute::Saas { package, .. } => format!("/dashboard?package={package}"),
    }
}
