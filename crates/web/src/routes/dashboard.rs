//! SaaS dashboard.
//!
//! The page itself only lays out the panels of the resolved plan; each
//! panel is then fetched as its own HTMX fragment so one slow upstream call
//! never blocks the rest of the page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use rackz_core::{DisputeFilter, SaasPackage, UserId};
use serde::Deserialize;
use tracing::instrument;

use crate::db::RepositoryError;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireUser;
use crate::models::AccountState;
use crate::routes::Nav;
use crate::services::dashboard::{
    Dunning, DisputesPanel, Overview, Panel, PanelState, PaymentRow, Prediction, ProvidersPanel,
    Risk, SubscriptionSummary, fetch_sources,
};
use crate::services::routing::{DashboardRoute, PackageSource, route_dashboard};
use crate::state::AppState;

/// Dashboard query string.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub package: Option<String>,
    /// Dispute bucket.
    pub status: Option<String>,
}

impl DashboardQuery {
    /// The dispute bucket; absent means all. Unknown buckets are a bad request.
    pub(crate) fn filter(&self) -> Result<DisputeFilter> {
        self.status
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(AppError::BadRequest)
    }
}

/// Write the resolved package back so later visits resolve the same way.
pub(crate) async fn persist_route(
    state: &AppState,
    user: &UserId,
    account: &AccountState,
    route: DashboardRoute,
) -> Result<()> {
    let Some(package) = route.package_to_persist(account) else {
        return Ok(());
    };
    match state
        .accounts()
        .update(user, |account| account.package = Some(package))
        .await
    {
        Ok(_) => tracing::info!(package = %package, "Persisted resolved package"),
        // The stored document is kept for repair; the page still renders
        Err(RepositoryError::DataCorruption(e)) => {
            tracing::warn!(error = %e, "Resolved package not persisted");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

// =============================================================================
// Page
// =============================================================================

/// A panel the current plan does not include.
pub struct LockedPanel {
    pub panel: Panel,
    pub package: SaasPackage,
}

/// Dashboard page template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard/index.html")]
pub struct DashboardTemplate {
    pub nav: Nav,
    pub package: SaasPackage,
    /// Shown when the plan came from a fresh payment.
    pub just_paid: bool,
    pub panels: Vec<Panel>,
    pub locked: Vec<LockedPanel>,
    /// Query string appended to panel fragment URLs.
    pub fragment_query: String,
}

/// Display the dashboard of the resolved plan, or send setup customers to
/// their own dashboard.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireUser { session, user }: RequireUser,
    Query(query): Query<DashboardQuery>,
) -> Result<Response> {
    let filter = query.filter()?;
    let account = state.accounts().load(&user.id).await?;
    let scratch = session.doc.current_scratch();
    let route = route_dashboard(query.package.as_deref(), &account, scratch);

    let DashboardRoute::Saas { package, source } = route else {
        return Ok(Redirect::to(route.path()).into_response());
    };
    persist_route(&state, &user.id, &account, route).await?;

    let locked = Panel::ALL
        .into_iter()
        .filter(|p| !package.includes(p.min_package()))
        .map(|panel| LockedPanel {
            panel,
            package: panel.min_package(),
        })
        .collect();

    let mut account = account;
    account.package = Some(package);

    Ok(DashboardTemplate {
        nav: Nav::for_user(&user, &account, scratch),
        package,
        just_paid: source == PackageSource::PaymentRecord,
        panels: Panel::for_package(package),
        locked,
        fragment_query: format!("package={package}&status={filter}"),
    }
    .into_response())
}

// =============================================================================
// Panel fragments
// =============================================================================

/// A dispute bucket tab.
pub struct DisputeTab {
    pub label: &'static str,
    pub href: String,
    pub count: usize,
    pub active: bool,
}

/// One panel, rendered as an HTMX fragment.
///
/// At most one of the data fields is set, and only when `status` is
/// `loaded`.
#[derive(Template, WebTemplate, Default)]
#[template(path = "dashboard/panel.html")]
pub struct PanelTemplate {
    pub name: &'static str,
    pub title: &'static str,
    /// URL of this fragment, for retries.
    pub url: String,
    pub status: &'static str,
    pub error: Option<String>,
    pub overview: Option<Overview>,
    pub payments: Option<Vec<PaymentRow>>,
    pub subscriptions: Option<SubscriptionSummary>,
    pub disputes: Option<DisputesPanel>,
    pub tabs: Vec<DisputeTab>,
    pub dunning: Option<Dunning>,
    pub prediction: Option<Prediction>,
    pub providers: Option<ProvidersPanel>,
    pub risk: Option<Risk>,
}

impl PanelTemplate {
    /// Record the state's status and error; return its data.
    fn take<T: Clone>(&mut self, state: &PanelState<T>) -> Option<T> {
        self.status = state.status();
        self.error = state.error().map(String::from);
        state.loaded().cloned()
    }
}

fn panel_url(panel: Panel, package: SaasPackage, filter: DisputeFilter) -> String {
    format!("/dashboard/panels/{panel}?package={package}&status={filter}")
}

fn dispute_tabs(package: SaasPackage, disputes: &DisputesPanel) -> Vec<DisputeTab> {
    DisputeFilter::ALL
        .into_iter()
        .map(|filter| DisputeTab {
            label: filter_label(filter),
            href: panel_url(Panel::Disputes, package, filter),
            count: disputes.counts.get(filter),
            active: filter == disputes.filter,
        })
        .collect()
}

const fn filter_label(filter: DisputeFilter) -> &'static str {
    match filter {
        DisputeFilter::All => "All",
        DisputeFilter::Active => "Needs action",
        DisputeFilter::Won => "Won",
        DisputeFilter::Lost => "Lost",
    }
}

/// Render one panel of the resolved plan.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn panel(
    State(state): State<AppState>,
    RequireUser { session, user }: RequireUser,
    Path(panel): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> Result<PanelTemplate> {
    let panel: Panel = panel
        .parse()
        .map_err(|_| AppError::NotFound(format!("panel {panel}")))?;
    let filter = query.filter()?;

    let account = state.accounts().load(&user.id).await?;
    let route = route_dashboard(
        query.package.as_deref(),
        &account,
        session.doc.current_scratch(),
    );
    let DashboardRoute::Saas { package, .. } = route else {
        return Err(AppError::Forbidden(
            "Setup customers have no plan dashboard.".to_string(),
        ));
    };
    if !package.includes(panel.min_package()) {
        return Err(AppError::Forbidden(format!(
            "{} is available on the {} plan.",
            panel.title(),
            panel.min_package().display_name()
        )));
    }

    let token = session.require_token()?;
    let sources = fetch_sources(
        state.api(),
        &user.id,
        token,
        &account.connected_providers,
        &[panel],
    )
    .await?;

    let mut page = PanelTemplate {
        name: panel.as_str(),
        title: panel.title(),
        url: panel_url(panel, package, filter),
        ..PanelTemplate::default()
    };
    match panel {
        Panel::Overview => {
            page.overview = page.take(&sources.starter().overview);
        }
        Panel::Payments => {
            page.payments = page.take(&sources.starter().payments);
        }
        Panel::Subscriptions => {
            page.subscriptions = page.take(&sources.starter().subscriptions);
        }
        Panel::Disputes => {
            page.disputes = page.take(&sources.disputes(filter));
            if let Some(disputes) = &page.disputes {
                page.tabs = dispute_tabs(package, disputes);
            }
        }
        Panel::Dunning => {
            page.dunning = page.take(&sources.pro(filter).dunning);
        }
        Panel::Prediction => {
            page.prediction = page.take(&sources.pro(filter).prediction);
        }
        Panel::Providers => {
            page.providers = page.take(&sources.scale(filter).providers);
        }
        Panel::Risk => {
            page.risk = page.take(&sources.risk());
        }
    }
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_param() {
        let query = |status: Option<&str>| DashboardQuery {
            package: None,
            status: status.map(String::from),
        };
        assert_eq!(query(None).filter().ok(), Some(DisputeFilter::All));
        assert_eq!(query(Some("won")).filter().ok(), Some(DisputeFilter::Won));
        assert!(matches!(
            query(Some("pending")).filter(),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_dispute_tabs() {
        let disputes = DisputesPanel {
            filter: DisputeFilter::Won,
            disputes: Vec::new(),
            counts: crate::services::dashboard::DisputeCounts {
                all: 3,
                active: 1,
                won: 1,
                lost: 1,
            },
        };
        let tabs = dispute_tabs(SaasPackage::Pro, &disputes);
        assert_eq!(tabs.len(), 4);
        let active: Vec<_> = tabs.iter().filter(|t| t.active).map(|t| t.label).collect();
        assert_eq!(active, ["Won"]);
        assert_eq!(
            tabs.first().map(|t| t.href.as_str()),
            Some("/dashboard/panels/disputes?package=pro&status=all")
        );
    }

    #[test]
    fn test_take_records_state() {
        let mut page = PanelTemplate::default();
        let value = page.take(&PanelState::Error::<u32>("down".to_string()));
        assert!(value.is_none());
        assert_eq!(page.status, "error");
        assert_eq!(page.error.as_deref(), Some("down"));

        let value = page.take(&PanelState::Loaded(7_u32));
        assert_eq!(value, Some(7));
        assert_eq!(page.status, "loaded");
        assert!(page.error.is_none());
    }
}
