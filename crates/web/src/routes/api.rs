//! JSON endpoints for client-side widgets.

use axum::{
    Json,
    extract::{Query, State},
};
use rackz_core::SaasPackage;
use serde::Serialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::models::SessionUser;
use crate::routes::dashboard::{DashboardQuery, persist_route};
use crate::services::CurrentSession;
use crate::services::dashboard::{Dashboard, DisputesPanel, Panel, PanelState, fetch_sources};
use crate::services::routing::{DashboardRoute, dashboard_href, route_dashboard};
use crate::state::AppState;

/// Session summary.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    /// A user mirror without a token.
    pub legacy: bool,
    pub user: Option<SessionUser>,
    pub dashboard: Option<DashboardRoute>,
    pub dashboard_href: Option<String>,
}

/// Report who is signed in and where their dashboard is.
pub async fn session(
    State(state): State<AppState>,
    session: CurrentSession,
) -> Result<Json<SessionResponse>> {
    let Some(user) = session.user().cloned() else {
        return Ok(Json(SessionResponse {
            authenticated: false,
            legacy: false,
            user: None,
            dashboard: None,
            dashboard_href: None,
        }));
    };

    let account = state.accounts().load(&user.id).await?;
    let scratch = session.doc.current_scratch();
    Ok(Json(SessionResponse {
        authenticated: true,
        legacy: session.auth_token().is_none(),
        dashboard: Some(route_dashboard(None, &account, scratch)),
        dashboard_href: Some(dashboard_href(&account, scratch)),
        user: Some(user),
    }))
}

/// Dashboard payload: the route, and the panels when it is a plan dashboard.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub route: DashboardRoute,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<Dashboard>,
}

/// Panels of the resolved plan.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn dashboard(
    State(state): State<AppState>,
    RequireUser { session, user }: RequireUser,
    Query(params): Query<DashboardQuery>,
) -> Result<Json<DashboardResponse>> {
    let filter = params.filter()?;
    let account = state.accounts().load(&user.id).await?;
    let route = route_dashboard(
        params.package.as_deref(),
        &account,
        session.doc.current_scratch(),
    );
    let DashboardRoute::Saas { package, .. } = route else {
        return Ok(Json(DashboardResponse {
            route,
            dashboard: None,
        }));
    };
    persist_route(&state, &user.id, &account, route).await?;

    let sources = fetch_sources(
        state.api(),
        &user.id,
        session.require_token()?,
        &account.connected_providers,
        &Panel::for_package(package),
    )
    .await?;

    Ok(Json(DashboardResponse {
        route,
        dashboard: Some(sources.dashboard(package, filter)),
    }))
}

/// Disputes in one bucket. Requires a plan with the disputes panel.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn disputes(
    State(state): State<AppState>,
    RequireUser { session, user }: RequireUser,
    Query(params): Query<DashboardQuery>,
) -> Result<Json<PanelState<DisputesPanel>>> {
    let filter = params.filter()?;
    let account = state.accounts().load(&user.id).await?;
    let route = route_dashboard(
        params.package.as_deref(),
        &account,
        session.doc.current_scratch(),
    );
    let included = matches!(
        route,
        DashboardRoute::Saas { package, .. } if package.includes(SaasPackage::Pro)
    );
    if !included {
        return Err(AppError::Forbidden(
            "Disputes are available on the Pro plan.".to_string(),
        ));
    }

    let sources = fetch_sources(
        state.api(),
        &user.id,
        session.require_token()?,
        &account.connected_providers,
        &[Panel::Disputes],
    )
    .await?;
    Ok(Json(sources.disputes(filter)))
}
