//! Markdown-backed static pages.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};

use crate::content::Page;
use crate::error::{AppError, Result};
use crate::filters;
use crate::routes::Nav;
use crate::services::CurrentSession;
use crate::state::AppState;

/// Static page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/content.html")]
pub struct PageTemplate {
    pub nav: Nav,
    pub page: Page,
}

async fn show(state: &AppState, session: &CurrentSession, slug: &str) -> Result<PageTemplate> {
    let page = state
        .content()
        .page(slug)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("page {slug}")))?;
    Ok(PageTemplate {
        nav: Nav::load(state, session).await,
        page,
    })
}

/// Terms of service.
pub async fn terms(
    State(state): State<AppState>,
    session: CurrentSession,
) -> Result<impl IntoResponse> {
    show(&state, &session, "terms").await
}

/// Privacy policy.
pub async fn privacy(
    State(state): State<AppState>,
    session: CurrentSession,
) -> Result<impl IntoResponse> {
    show(&state, &session, "privacy").await
}
