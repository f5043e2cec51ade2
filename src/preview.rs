//! Site preview: renders the markdown sources to HTML and serves them.
//!
//! Pages are discovered and rendered on every request, so edits show up on
//! reload without a rebuild step.

use crate::error::{Error, Result};
use crate::http::{log_responses, serve_router, socket_addr, ApiResult};
use crate::markdown::parse_markdown;
use crate::renderer::{MiniJinjaRenderer, TemplateRenderer};
use crate::slug::slugify;
use axum::{
    extract::{Path as UrlPath, State},
    response::Html,
    routing::get,
    Router,
};
use globset::{Glob, GlobSet, GlobSetBuilder};
use indexmap::IndexMap;
use log::debug;
use pulldown_cmark::{html::push_html, Event, Options, Parser, Tag, TagEnd};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Patterns that never belong in the preview.
const DEFAULT_IGNORE_PATTERNS: [&str; 2] = ["**/.git/**", "**/.DS_Store"];

const PAGE_TEMPLATE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>{{ title }}</title></head>
<body>
<nav><a href="/">Index</a></nav>
<main>
{{ content|safe }}
</main>
</body>
</html>
"#;

const INDEX_TEMPLATE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>{{ title }}</title></head>
<body>
<h1>{{ title }}</h1>
<ul>
{% for page in pages %}<li><a href="/{{ page.slug }}">{{ page.title }}</a></li>
{% endfor %}</ul>
</body>
</html>
"#;

/// One markdown file exposed by the preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// URL path below `/`
    pub slug: String,
    pub path: PathBuf,
    pub title: String,
}

/// Compiles the ignore globs, adding the defaults.
///
/// # Errors
/// * `Error::ConfigError` if a pattern is not a valid glob
pub fn build_ignore_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let all = DEFAULT_IGNORE_PATTERNS.iter().copied().chain(patterns.iter().map(String::as_str));
    for pattern in all {
        builder.add(Glob::new(pattern).map_err(|e| {
            Error::ConfigError(format!("preview ignore pattern loading failed: {e}"))
        })?);
    }
    builder
        .build()
        .map_err(|e| Error::ConfigError(format!("preview ignore pattern loading failed: {e}")))
}

fn page_slug(relative: &Path) -> String {
    let without_ext = relative.with_extension("");
    without_ext
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .map(slugify)
        .collect::<Vec<_>>()
        .join("/")
}

/// Finds every markdown page under `markdown_dir`, sorted by slug.
pub fn collect_pages<P: AsRef<Path>>(markdown_dir: P, ignore: &GlobSet) -> Result<Vec<Page>> {
    let markdown_dir = markdown_dir.as_ref();
    let mut pages = Vec::new();

    for entry in WalkDir::new(markdown_dir) {
        let entry = entry.map_err(|e| Error::IoError(e.into()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let relative = path
            .strip_prefix(markdown_dir)
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        if ignore.is_match(relative) {
            debug!("Skipping {} from preview", relative.display());
            continue;
        }

        let content = fs::read_to_string(path)?;
        let parsed = parse_markdown(&content, &IndexMap::new());
        let title = parsed
            .front_matter
            .get("title")
            .and_then(|t| t.as_str().map(str::to_string))
            .or(parsed.title)
            .unwrap_or_else(|| relative.display().to_string());

        pages.push(Page { slug: page_slug(relative), path: path.to_path_buf(), title });
    }

    pages.sort_by(|a, b| a.slug.cmp(&b.slug));
    Ok(pages)
}

/// Renders markdown to HTML. Front matter is dropped and every heading
/// gets an `id` derived from its text.
pub fn render_markdown(content: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS;
    let events = inject_heading_ids(Parser::new_ext(content, options));

    let mut html = String::with_capacity(content.len() * 2);
    push_html(&mut html, events.into_iter());
    html
}

fn inject_heading_ids<'a>(parser: Parser<'a>) -> Vec<Event<'a>> {
    let mut events = Vec::new();
    let mut heading: Option<Vec<Event<'a>>> = None;
    let mut heading_text = String::new();

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, id, classes, attrs }) => {
                heading_text.clear();
                heading = Some(vec![Event::Start(Tag::Heading { level, id, classes, attrs })]);
            }
            Event::End(TagEnd::Heading(level)) => {
                let mut buffered = heading.take().unwrap_or_default();
                let slug = slugify(&heading_text);
                if let Some(Event::Start(Tag::Heading { id, .. })) = buffered.first_mut() {
                    if id.is_none() && !slug.is_empty() {
                        *id = Some(slug.into());
                    }
                }
                events.extend(buffered);
                events.push(Event::End(TagEnd::Heading(level)));
            }
            event => match heading.as_mut() {
                Some(buffered) => {
                    if let Event::Text(text) | Event::Code(text) = &event {
                        heading_text.push_str(text);
                    }
                    buffered.push(event);
                }
                None => events.push(event),
            },
        }
    }
    events
}

#[derive(Clone)]
pub struct PreviewState {
    markdown_dir: Arc<PathBuf>,
    ignore: Arc<GlobSet>,
}

fn render_index(state: &PreviewState) -> Result<String> {
    let pages = collect_pages(state.markdown_dir.as_path(), &state.ignore)?;
    let pages: Vec<_> = pages
        .iter()
        .map(|page| json!({ "slug": page.slug, "title": page.title }))
        .collect();
    MiniJinjaRenderer::new().render(
        "index.html",
        INDEX_TEMPLATE,
        &json!({ "title": "Documentation", "pages": pages }),
    )
}

fn render_page(state: &PreviewState, slug: &str) -> Result<String> {
    let pages = collect_pages(state.markdown_dir.as_path(), &state.ignore)?;
    let page = pages
        .into_iter()
        .find(|page| page.slug == slug)
        .ok_or_else(|| Error::NotFoundError(slug.to_string()))?;
    let content = render_markdown(&fs::read_to_string(&page.path)?);
    MiniJinjaRenderer::new().render(
        "page.html",
        PAGE_TEMPLATE,
        &json!({ "title": page.title, "content": content }),
    )
}

async fn index(State(state): State<PreviewState>) -> ApiResult<Html<String>> {
    let html = tokio::task::spawn_blocking(move || render_index(&state)).await??;
    Ok(Html(html))
}

async fn page(
    State(state): State<PreviewState>,
    UrlPath(slug): UrlPath<String>,
) -> ApiResult<Html<String>> {
    let html = tokio::task::spawn_blocking(move || render_page(&state, &slug)).await??;
    Ok(Html(html))
}

pub fn build_router<P: Into<PathBuf>>(markdown_dir: P, ignore: GlobSet) -> Router {
    let state = PreviewState { markdown_dir: Arc::new(markdown_dir.into()), ignore: Arc::new(ignore) };
    Router::new()
        .route("/", get(index))
        .route("/{*page}", get(page))
        .with_state(state)
        .layer(axum::middleware::from_fn(log_responses))
}

/// Serves the rendered markdown on `host:port` until Ctrl-C.
pub async fn serve<P: Into<PathBuf>>(
    markdown_dir: P,
    ignore_patterns: &[String],
    host: &str,
    port: u16,
) -> Result<()> {
    let ignore = build_ignore_set(ignore_patterns)?;
    let addr = socket_addr(host, port)?;
    serve_router(build_router(markdown_dir, ignore), addr).await
}
