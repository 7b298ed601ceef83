//! Markdown-backed marketing content: blog posts and legal pages.
//!
//! Files are read from `content/blog` and `content/pages` once at startup.
//! Each file starts with YAML front matter followed by the markdown body.

use chrono::NaiveDate;
use comrak::{Options, markdown_to_html};
use gray_matter::{Matter, ParsedEntity, engine::YAML};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Words read per minute for the reading-time estimate.
const WORDS_PER_MINUTE: usize = 200;

/// Metadata for static pages (terms, privacy).
#[derive(Debug, Clone, Deserialize)]
pub struct PageMeta {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub updated_at: Option<NaiveDate>,
}

/// Metadata for blog posts.
#[derive(Debug, Clone, Deserialize)]
pub struct PostMeta {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    pub published_at: NaiveDate,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub draft: bool,
}

/// A rendered page.
#[derive(Debug, Clone)]
pub struct Page {
    pub slug: String,
    pub meta: PageMeta,
    pub content_html: String,
}

/// A rendered blog post.
#[derive(Debug, Clone)]
pub struct Post {
    pub slug: String,
    pub meta: PostMeta,
    pub content_html: String,
    pub reading_time_minutes: usize,
}

/// Content loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
}

/// All loaded content, held in memory.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    pages: Arc<HashMap<String, Page>>,
    posts: Arc<Vec<Post>>,
}

impl ContentStore {
    /// Load all content below `content_dir`.
    ///
    /// A missing subdirectory yields no content of that kind. A file that
    /// fails to parse is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing directory cannot be read.
    pub fn load(content_dir: &Path) -> Result<Self, ContentError> {
        let mut pages = HashMap::new();
        for (slug, raw) in read_markdown_dir(&content_dir.join("pages"))? {
            match parse_page(&slug, &raw) {
                Ok(page) => {
                    pages.insert(page.slug.clone(), page);
                }
                Err(e) => tracing::error!(slug = %slug, error = %e, "Failed to load page"),
            }
        }

        let mut posts = Vec::new();
        for (stem, raw) in read_markdown_dir(&content_dir.join("blog"))? {
            match parse_post(&stem, &raw) {
                Ok(post) => posts.push(post),
                Err(e) => tracing::error!(file = %stem, error = %e, "Failed to load post"),
            }
        }
        posts.sort_by(|a, b| b.meta.published_at.cmp(&a.meta.published_at));

        tracing::info!(pages = pages.len(), posts = posts.len(), "Content loaded");
        Ok(Self {
            pages: Arc::new(pages),
            posts: Arc::new(posts),
        })
    }

    /// Get a page by slug.
    #[must_use]
    pub fn page(&self, slug: &str) -> Option<&Page> {
        self.pages.get(slug)
    }

    /// Get a published post by slug. Drafts are not reachable.
    #[must_use]
    pub fn post(&self, slug: &str) -> Option<&Post> {
        self.published_posts().find(|p| p.slug == slug)
    }

    /// Published posts, newest first.
    pub fn published_posts(&self) -> impl Iterator<Item = &Post> {
        self.posts.iter().filter(|p| !p.meta.draft)
    }

    /// Recent published posts, optionally excluding one slug.
    #[must_use]
    pub fn recent_posts(&self, limit: usize, exclude_slug: Option<&str>) -> Vec<&Post> {
        self.published_posts()
            .filter(|p| exclude_slug.is_none_or(|s| p.slug != s))
            .take(limit)
            .collect()
    }
}

/// `(file stem, contents)` for every `.md` file in `dir`.
fn read_markdown_dir(dir: &Path) -> Result<Vec<(String, String)>, ContentError> {
    if !dir.exists() {
        tracing::warn!(dir = %dir.display(), "Content directory does not exist");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "md") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        files.push((stem.to_string(), std::fs::read_to_string(&path)?));
    }
    Ok(files)
}

fn parse_front_matter<T: serde::de::DeserializeOwned>(
    raw: &str,
) -> Result<(T, String), ContentError> {
    let matter = Matter::<YAML>::new();
    let parsed: ParsedEntity<T> = matter
        .parse(raw)
        .map_err(|e| ContentError::Parse(format!("Failed to parse frontmatter: {e}")))?;
    let meta = parsed
        .data
        .ok_or_else(|| ContentError::Parse("Missing frontmatter".to_string()))?;
    Ok((meta, parsed.content))
}

fn parse_page(slug: &str, raw: &str) -> Result<Page, ContentError> {
    let (meta, body) = parse_front_matter::<PageMeta>(raw)?;
    Ok(Page {
        slug: slug.to_string(),
        meta,
        content_html: render_markdown(&body),
    })
}

fn parse_post(stem: &str, raw: &str) -> Result<Post, ContentError> {
    let (meta, body) = parse_front_matter::<PostMeta>(raw)?;
    Ok(Post {
        slug: strip_date_prefix(stem).to_string(),
        meta,
        content_html: render_markdown(&body),
        reading_time_minutes: reading_time(&body),
    })
}

/// `2025-01-15-my-post` becomes `my-post`.
fn strip_date_prefix(stem: &str) -> &str {
    match stem.get(..11) {
        Some(prefix)
            if NaiveDate::parse_from_str(prefix.trim_end_matches('-'), "%Y-%m-%d").is_ok()
                && prefix.ends_with('-') =>
        {
            stem.get(11..).filter(|rest| !rest.is_empty()).unwrap_or(stem)
        }
        _ => stem,
    }
}

/// Minutes to read `body`, rounded up, at least one.
fn reading_time(body: &str) -> usize {
    body.split_whitespace()
        .count()
        .div_ceil(WORDS_PER_MINUTE)
        .max(1)
}

/// Render markdown to HTML with GitHub Flavored Markdown extensions.
fn render_markdown(content: &str) -> String {
    let mut options = Options::default();

    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.header_ids = Some(String::new());
    options.extension.footnotes = true;

    // Content is authored in-repo
    options.render.r#unsafe = true;

    markdown_to_html(content, &options)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const POST: &str = "---\ntitle: Why payments fail\npublished_at: 2025-03-04\ntags: [dunning]\n---\n\n# Heading\n\nSome **bold** words.\n";

    #[test]
    fn test_parse_post() {
        let post = parse_post("2025-03-04-why-payments-fail", POST).unwrap();
        assert_eq!(post.slug, "why-payments-fail");
        assert_eq!(post.meta.title, "Why payments fail");
        assert!(!post.meta.draft);
        assert!(post.content_html.contains("<strong>bold</strong>"));
        assert_eq!(post.reading_time_minutes, 1);
    }

    #[test]
    fn test_missing_front_matter() {
        assert!(parse_post("plain", "just text").is_err());
    }

    #[test]
    fn test_strip_date_prefix() {
        assert_eq!(strip_date_prefix("2025-01-15-my-post"), "my-post");
        assert_eq!(strip_date_prefix("my-post"), "my-post");
        assert_eq!(strip_date_prefix("2025-01-15-"), "2025-01-15-");
        assert_eq!(strip_date_prefix("abcd-efgh-ij-post"), "abcd-efgh-ij-post");
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(reading_time(""), 1);
        assert_eq!(reading_time(&"word ".repeat(200)), 1);
        assert_eq!(reading_time(&"word ".repeat(201)), 2);
    }

    #[test]
    fn test_drafts_hidden_and_sorted() {
        let draft = "---\ntitle: Draft\npublished_at: 2025-06-01\ndraft: true\n---\nsoon";
        let newer = "---\ntitle: Newer\npublished_at: 2025-05-01\n---\nnew";
        let mut posts = vec![
            parse_post("older", POST).unwrap(),
            parse_post("draft", draft).unwrap(),
            parse_post("newer", newer).unwrap(),
        ];
        posts.sort_by(|a, b| b.meta.published_at.cmp(&a.meta.published_at));
        let store = ContentStore {
            pages: Arc::new(HashMap::new()),
            posts: Arc::new(posts),
        };

        let slugs: Vec<_> = store.published_posts().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, ["newer", "older"]);
        assert!(store.post("draft").is_none());
        assert_eq!(store.recent_posts(5, Some("newer")).len(), 1);
    }

    #[test]
    fn test_shipped_content_loads() {
        let store = ContentStore::load(Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/content")))
            .unwrap();
        assert!(store.page("terms").is_some());
        assert!(store.page("privacy").is_some());
        assert!(store.published_posts().next().is_some());
    }
}
