//! Template rendering for the document filler.
//! Wraps MiniJinja and turns undefined placeholders into
//! `UnresolvedPlaceholderError`s according to the configured policy.
use crate::config::UnresolvedPolicy;
use crate::constants::TEMPLATE_SUFFIX;
use crate::error::{Error, Result};
use minijinja::{escape_formatter, AutoEscape, Environment, ErrorKind, UndefinedBehavior};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Functions MiniJinja provides that templates may call without a value.
const BUILTIN_GLOBALS: [&str; 4] = ["range", "dict", "debug", "namespace"];

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z_]\w*").unwrap());

/// Trait for template rendering engines.
pub trait TemplateRenderer {
    /// Renders a template string with the given context.
    ///
    /// # Arguments
    /// * `name` - Template name used in error messages
    /// * `template` - Template source to render
    /// * `context` - Context variables for rendering
    ///
    /// # Returns
    /// * `Result<String>` - Rendered template string
    fn render(&self, name: &str, template: &str, context: &serde_json::Value) -> Result<String>;
}

/// MiniJinja-based template rendering engine.
pub struct MiniJinjaRenderer {
    /// MiniJinja environment instance
    env: Environment<'static>,
    policy: UnresolvedPolicy,
}

impl MiniJinjaRenderer {
    /// Creates a renderer that fails on unresolved placeholders.
    pub fn new() -> Self {
        Self::with_policy(UnresolvedPolicy::Error)
    }

    pub fn with_policy(policy: UnresolvedPolicy) -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(auto_escape);
        env.set_formatter(move |out, state, value| {
            if value.is_none() {
                return match policy {
                    UnresolvedPolicy::Error => Err(minijinja::Error::new(
                        ErrorKind::UndefinedError,
                        "placeholder value is null",
                    )),
                    UnresolvedPolicy::Blank => Ok(()),
                };
            }
            escape_formatter(out, state, value)
        });
        env.set_undefined_behavior(match policy {
            UnresolvedPolicy::Error => UndefinedBehavior::Strict,
            UnresolvedPolicy::Blank => UndefinedBehavior::Chainable,
        });
        Self { env, policy }
    }
}

/// HTML escaping for markup templates only. Data-shaped outputs such as
/// `.yml.j2` are filled with raw values.
fn auto_escape(name: &str) -> AutoEscape {
    let name = name.strip_suffix(TEMPLATE_SUFFIX).unwrap_or(name);
    match name.rsplit('.').next() {
        Some("html") | Some("htm") | Some("xml") => AutoEscape::Html,
        _ => AutoEscape::None,
    }
}

impl Default for MiniJinjaRenderer {
    fn default() -> Self {
        MiniJinjaRenderer::new()
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    /// Renders a template string using MiniJinja.
    ///
    /// # Errors
    /// * `Error::UnresolvedPlaceholderError` if the policy is `error` and a
    ///   placeholder has no value
    /// * `Error::TemplateError` if the template does not parse or render
    fn render(&self, name: &str, template: &str, context: &serde_json::Value) -> Result<String> {
        let mut env = self.env.clone();
        env.add_template_owned(name.to_string(), template.to_string())?;
        let tmpl = env.get_template(name)?;

        // A null value has nothing to fill, so the strict policy sees it as absent.
        let context = match (self.policy, context) {
            (UnresolvedPolicy::Error, serde_json::Value::Object(map)) => serde_json::Value::Object(
                map.iter()
                    .filter(|(_, value)| !value.is_null())
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
            _ => context.clone(),
        };

        tmpl.render(&context).map_err(|e| match e.kind() {
            ErrorKind::UndefinedError => {
                let candidates = tmpl
                    .undeclared_variables(false)
                    .into_iter()
                    .filter(|var| !BUILTIN_GLOBALS.contains(&var.as_str()))
                    .filter(|var| context.get(var).is_none())
                    .collect();
                Error::UnresolvedPlaceholderError {
                    placeholder: unresolved_name(&e, template, candidates),
                    template_path: PathBuf::from(name),
                }
            }
            _ => Error::TemplateError(e),
        })
    }
}

/// Names the placeholder behind an undefined-value error: the unresolved
/// variable inside the failing expression, else the expression itself, else
/// the first unresolved variable of the template.
fn unresolved_name(err: &minijinja::Error, template: &str, candidates: BTreeSet<String>) -> String {
    let span = err.range().and_then(|range| template.get(range)).unwrap_or_default().trim();
    IDENTIFIER
        .find_iter(span)
        .map(|m| m.as_str())
        .find(|ident| candidates.contains(*ident))
        .map(str::to_string)
        .or_else(|| (!span.is_empty()).then(|| span.to_string()))
        .or_else(|| candidates.into_iter().next())
        .unwrap_or_else(|| err.detail().unwrap_or("undefined value").to_string())
}
