//! Blog route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::instrument;

use crate::content::Post;
use crate::error::{AppError, Result};
use crate::filters;
use crate::routes::Nav;
use crate::services::CurrentSession;
use crate::state::AppState;

/// Number of related posts under an article.
const RELATED_POSTS: usize = 2;

/// Blog index template.
#[derive(Template, WebTemplate)]
#[template(path = "blog/index.html")]
pub struct BlogIndexTemplate {
    pub nav: Nav,
    pub posts: Vec<Post>,
}

/// Blog post template.
#[derive(Template, WebTemplate)]
#[template(path = "blog/show.html")]
pub struct BlogPostTemplate {
    pub nav: Nav,
    pub post: Post,
    pub related: Vec<Post>,
}

/// List published posts, newest first.
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>, session: CurrentSession) -> impl IntoResponse {
    BlogIndexTemplate {
        nav: Nav::load(&state, &session).await,
        posts: state.content().published_posts().cloned().collect(),
    }
}

/// Show one post.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: CurrentSession,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let post = state
        .content()
        .post(&slug)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("post {slug}")))?;
    let related = state
        .content()
        .recent_posts(RELATED_POSTS, Some(&slug))
        .into_iter()
        .cloned()
        .collect();

    Ok(BlogPostTemplate {
        nav: Nav::load(&state, &session).await,
        post,
        related,
    })
}
