//! Markdown to structured data conversion.
//! Applies each conversion rule to its markdown source and writes one
//! structured document per rule.

use crate::config::{Config, ConversionRule, FieldRule};
use crate::error::{Error, Result};
use crate::markdown::{parse_markdown, ParsedMarkdown};
use crate::store::{write_document, StructuredDocument};
use log::{debug, error, info, warn};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// The result of converting one rule.
#[derive(Debug)]
pub struct ConversionOutcome {
    pub source: PathBuf,
    pub target: PathBuf,
    /// Fields that fell back to their default
    pub missing_fields: Vec<Error>,
}

/// Summary of a conversion run.
#[derive(Debug, Default)]
pub struct ConversionReport {
    pub converted: Vec<ConversionOutcome>,
    pub failed: Vec<(PathBuf, Error)>,
}

impl ConversionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Builds the structured document for `rule` from parsed markdown.
///
/// Every configured field is present in the result. A field the markdown
/// does not provide takes its default (or `null`) and is reported as a
/// `MissingFieldError`. A rule without fields yields the whole document.
pub fn extract_fields(
    parsed: &ParsedMarkdown,
    fields: &[FieldRule],
    source_path: &Path,
) -> (StructuredDocument, Vec<Error>) {
    if fields.is_empty() {
        return (parsed.to_document(), Vec::new());
    }

    let mut document = StructuredDocument::new();
    let mut missing = Vec::new();
    for field in fields {
        let extracted = match &field.from {
            Some(extraction) => parsed.extract(extraction),
            None => parsed.extract_named(&field.name),
        };
        let value = match extracted {
            Some(value) => value,
            None => {
                missing.push(Error::MissingFieldError {
                    field: field.name.clone(),
                    source_path: source_path.to_path_buf(),
                });
                field.default.clone().unwrap_or(Value::Null)
            }
        };
        document.insert(field.name.clone(), value);
    }
    (document, missing)
}

pub struct Converter<'a> {
    config: &'a Config,
}

impl<'a> Converter<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Converts a single rule, overwriting its target.
    ///
    /// # Errors
    /// * `Error::MissingSourceError` if the markdown file does not exist
    /// * `Error::IoError` / `Error::SerializationError` if writing fails
    pub fn convert(&self, rule: &ConversionRule) -> Result<ConversionOutcome> {
        let source = self.config.source_for(rule);
        let target = self.config.target_for(rule)?;

        if !source.is_file() {
            return Err(Error::MissingSourceError { source_path: source });
        }
        debug!("Converting '{}' to '{}'", source.display(), target.display());

        let content = fs::read_to_string(&source)?;
        let parsed = parse_markdown(&content, &self.config.header_aliases);
        let (document, missing_fields) = extract_fields(&parsed, &rule.fields, &source);
        write_document(&target, &document)?;

        Ok(ConversionOutcome { source, target, missing_fields })
    }

    /// Converts every configured rule. A failing rule is logged and skipped;
    /// the remaining rules still run.
    pub fn run(&self) -> ConversionReport {
        let mut report = ConversionReport::default();
        for rule in &self.config.rules {
            match self.convert(rule) {
                Ok(outcome) => {
                    for missing in &outcome.missing_fields {
                        warn!("{missing}");
                    }
                    info!(
                        "Converted '{}' to '{}'",
                        outcome.source.display(),
                        outcome.target.display()
                    );
                    report.converted.push(outcome);
                }
                Err(e) => {
                    error!("{e}");
                    report.failed.push((rule.source.clone(), e));
                }
            }
        }
        report
    }
}

/// Runs every conversion rule in `config`.
pub fn conversion_task(config: &Config) -> ConversionReport {
    Converter::new(config).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Extraction;
    use indexmap::IndexMap;
    use serde_json::json;

    #[test]
    fn test_extract_fields_defaults_missing() {
        let parsed = parse_markdown("# Title\n\n## Purpose\n\nWhy.\n", &IndexMap::new());
        let fields = vec![
            FieldRule::named("title"),
            FieldRule {
                name: "owner".to_string(),
                from: Some(Extraction::FrontMatter("owner".to_string())),
                default: Some(json!("unassigned")),
            },
            FieldRule::named("scope"),
        ];
        let (document, missing) = extract_fields(&parsed, &fields, Path::new("a.md"));

        assert_eq!(
            document.keys().collect::<Vec<_>>(),
            vec!["title", "owner", "scope"]
        );
        assert_eq!(document["owner"], json!("unassigned"));
        assert_eq!(document["scope"], Value::Null);
        assert_eq!(missing.len(), 2);
        assert!(matches!(&missing[0], Error::MissingFieldError { field, .. } if field == "owner"));
    }

    #[test]
    fn test_extract_fields_without_rules_keeps_everything() {
        let parsed = parse_markdown("---\ndocument_no: 7\n---\n## Purpose\n\nWhy.\n", &IndexMap::new());
        let (document, missing) = extract_fields(&parsed, &[], Path::new("a.md"));
        assert!(missing.is_empty());
        assert_eq!(document["document_no"], json!("7"));
        assert_eq!(document["purpose"], json!(["Why."]));
    }
}
