//! Document filling: structured document + template → filled document.

use crate::config::{Config, FillJob};
use crate::constants::TEMPLATE_SUFFIX;
use crate::error::{Error, Result};
use crate::renderer::TemplateRenderer;
use crate::store::{write_atomic, DocumentStore, StructuredDocument};
use log::{error, info};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Turns escaped `\n` sequences into newlines and drops trailing newlines
/// from every string in `value`.
pub fn prepare_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.replace("\\n", "\n").trim_end_matches('\n').to_string()),
        Value::Array(items) => Value::Array(items.iter().map(prepare_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), prepare_value(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Where a fill job's output lands when it names none: the template file
/// name without `.j2`, prefixed by the document identifier.
pub fn default_output_name(job: &FillJob) -> PathBuf {
    let template_name = job
        .template
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document");
    let name = template_name.strip_suffix(TEMPLATE_SUFFIX).unwrap_or(template_name);
    PathBuf::from(format!("{}_{}", job.document, name))
}

#[derive(Debug)]
pub struct FillOutcome {
    pub document: String,
    pub output: PathBuf,
}

#[derive(Debug, Default)]
pub struct FillReport {
    pub filled: Vec<FillOutcome>,
    pub failed: Vec<(String, Error)>,
}

impl FillReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Filler<'a> {
    config: &'a Config,
    renderer: &'a dyn TemplateRenderer,
    store: DocumentStore,
}

impl<'a> Filler<'a> {
    pub fn new(config: &'a Config, renderer: &'a dyn TemplateRenderer) -> Self {
        Self { config, renderer, store: DocumentStore::new(&config.data_dir) }
    }

    /// Renders `template_path` with `document` and writes the result to
    /// `output_path`. Nothing is written when rendering fails.
    ///
    /// # Errors
    /// * `Error::MissingTemplateError` if the template does not exist
    /// * `Error::UnresolvedPlaceholderError` if a placeholder has no value
    pub fn fill<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        document: &StructuredDocument,
        template_path: P,
        output_path: Q,
    ) -> Result<()> {
        let template_path = template_path.as_ref();
        if !template_path.is_file() {
            return Err(Error::MissingTemplateError { template_path: template_path.to_path_buf() });
        }
        let template = fs::read_to_string(template_path)?;
        let context = prepare_value(&Value::Object(document.clone()));
        let rendered = self.renderer.render(
            &template_path.display().to_string(),
            &template,
            &context,
        )?;
        write_atomic(output_path, &rendered)
    }

    /// Runs one configured fill job.
    pub fn fill_job(&self, job: &FillJob) -> Result<FillOutcome> {
        let document = self.store.read(&job.document)?;
        let template_path = self.config.templates_dir.join(&job.template);
        let output = self
            .config
            .filled_dir
            .join(job.output.clone().unwrap_or_else(|| default_output_name(job)));

        self.fill(&document, &template_path, &output)?;
        Ok(FillOutcome { document: job.document.clone(), output })
    }

    /// Runs every configured fill job; failures are logged and skipped.
    pub fn run(&self) -> FillReport {
        let mut report = FillReport::default();
        for job in &self.config.fills {
            match self.fill_job(job) {
                Ok(outcome) => {
                    info!("Filled '{}' into '{}'", outcome.document, outcome.output.display());
                    report.filled.push(outcome);
                }
                Err(e) => {
                    error!("Failed to fill '{}': {e}", job.document);
                    report.failed.push((job.document.clone(), e));
                }
            }
        }
        report
    }
}
