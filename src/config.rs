//! Conversion configuration handling.
//! Loads the rule list, fill jobs and server settings from JSON or YAML,
//! validates them against a schema, and resolves directories relative to the
//! configuration file.

use crate::constants::{
    CONFIG_FILES, DEFAULT_DATA_EXTENSION, DEFAULT_PREVIEW_PORT, DEFAULT_SERVER_PORT,
    ENVIRONMENT_VAR,
};
use crate::error::{Error, Result};
use crate::slug::slugify;
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Where a field's value comes from in the markdown source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extraction {
    /// Text of the first level-1 heading
    Title,
    /// Paragraphs between the title and the first sub-heading
    Body,
    /// A key of the YAML front matter
    FrontMatter(String),
    /// Structured content of the section with this heading
    Section(String),
    /// Section content flattened to text
    SectionText(String),
    /// Raw content of the first fenced block with this info string
    Fenced(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFieldRule {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        from: Option<Extraction>,
        #[serde(default)]
        default: Option<Value>,
    },
}

/// A target field and the single extraction that fills it.
///
/// Written either as a bare name, which resolves implicitly, or as
/// `{name, from, default}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawFieldRule")]
pub struct FieldRule {
    pub name: String,
    pub from: Option<Extraction>,
    pub default: Option<Value>,
}

impl From<RawFieldRule> for FieldRule {
    fn from(raw: RawFieldRule) -> Self {
        match raw {
            RawFieldRule::Name(name) => FieldRule { name, from: None, default: None },
            RawFieldRule::Detailed { name, from, default } => FieldRule { name, from, default },
        }
    }
}

impl FieldRule {
    pub fn named<S: Into<String>>(name: S) -> Self {
        FieldRule { name: name.into(), from: None, default: None }
    }
}

/// Maps one markdown source to one structured data target.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversionRule {
    pub source: PathBuf,
    #[serde(default)]
    pub target: Option<PathBuf>,
    /// Empty means "emit the whole parsed document"
    #[serde(default)]
    pub fields: Vec<FieldRule>,
    #[serde(default)]
    pub staged: bool,
}

/// Serialization used for a structured data file, picked by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Yaml,
    Json,
}

impl DataFormat {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yml") | Some("yaml") => Ok(DataFormat::Yaml),
            Some("json") => Ok(DataFormat::Json),
            _ => Err(Error::ConfigError(format!(
                "unsupported data file extension for '{}' (expected .yml, .yaml or .json)",
                path.display()
            ))),
        }
    }
}

/// A template to fill from one stored document.
#[derive(Debug, Clone, Deserialize)]
pub struct FillJob {
    pub document: String,
    pub template: PathBuf,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

/// What the filler does with a placeholder that has no value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedPolicy {
    #[default]
    Error,
    Blank,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FillSettings {
    #[serde(default)]
    pub unresolved: UnresolvedPolicy,
}

/// Synthetic sections served by the API, each gathering several keys.
pub type SectionGroups = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default)]
    pub section_groups: SectionGroups,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { host: None, port: DEFAULT_SERVER_PORT, section_groups: SectionGroups::new() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewSettings {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_preview_port")]
    pub port: u16,
    /// Glob patterns, relative to the markdown directory, left out of the preview
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self { host: None, port: DEFAULT_PREVIEW_PORT, ignore: Vec::new() }
    }
}

/// The whole pipeline configuration. Loaded once per command.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_markdown_dir")]
    pub markdown_dir: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,
    #[serde(default = "default_filled_dir")]
    pub filled_dir: PathBuf,
    /// Renames applied to table header cells
    #[serde(default)]
    pub header_aliases: IndexMap<String, String>,
    #[serde(default)]
    pub rules: Vec<ConversionRule>,
    #[serde(default)]
    pub fills: Vec<FillJob>,
    #[serde(default)]
    pub fill: FillSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub preview: PreviewSettings,
}

fn default_markdown_dir() -> PathBuf {
    PathBuf::from("docs")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("yml")
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("temp_yml")
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_filled_dir() -> PathBuf {
    PathBuf::from("filled")
}

fn default_server_port() -> u16 {
    DEFAULT_SERVER_PORT
}

fn default_preview_port() -> u16 {
    DEFAULT_PREVIEW_PORT
}

fn config_schema() -> Value {
    let extraction = serde_json::json!({
        "oneOf": [
            { "enum": ["title", "body"] },
            {
                "type": "object",
                "minProperties": 1,
                "maxProperties": 1,
                "properties": {
                    "front_matter": { "type": "string" },
                    "section": { "type": "string" },
                    "section_text": { "type": "string" },
                    "fenced": { "type": "string" }
                },
                "additionalProperties": false
            }
        ]
    });
    let field = serde_json::json!({
        "oneOf": [
            { "type": "string", "minLength": 1 },
            {
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": { "type": "string", "minLength": 1 },
                    "from": extraction,
                    "default": {}
                },
                "additionalProperties": false
            }
        ]
    });
    let host_port = |extra: Value| {
        let mut properties = serde_json::json!({
            "host": { "type": "string" },
            "port": { "type": "integer", "minimum": 0, "maximum": 65535 }
        });
        if let (Some(target), Some(extra)) = (properties.as_object_mut(), extra.as_object()) {
            target.extend(extra.clone());
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "additionalProperties": false
        })
    };

    serde_json::json!({
        "type": "object",
        "properties": {
            "markdown_dir": { "type": "string" },
            "data_dir": { "type": "string" },
            "staging_dir": { "type": "string" },
            "templates_dir": { "type": "string" },
            "filled_dir": { "type": "string" },
            "header_aliases": {
                "type": "object",
                "additionalProperties": { "type": "string" }
            },
            "rules": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["source"],
                    "properties": {
                        "source": { "type": "string", "minLength": 1 },
                        "target": { "type": "string", "minLength": 1 },
                        "fields": { "type": "array", "items": field },
                        "staged": { "type": "boolean" }
                    },
                    "additionalProperties": false
                }
            },
            "fills": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["document", "template"],
                    "properties": {
                        "document": { "type": "string", "minLength": 1 },
                        "template": { "type": "string", "minLength": 1 },
                        "output": { "type": "string", "minLength": 1 }
                    },
                    "additionalProperties": false
                }
            },
            "fill": {
                "type": "object",
                "properties": { "unresolved": { "enum": ["error", "blank"] } },
                "additionalProperties": false
            },
            "server": host_port(serde_json::json!({
                "section_groups": {
                    "type": "object",
                    "additionalProperties": {
                        "type": "array",
                        "minItems": 1,
                        "items": { "type": "string", "minLength": 1 }
                    }
                }
            })),
            "preview": host_port(serde_json::json!({
                "ignore": { "type": "array", "items": { "type": "string" } }
            }))
        },
        "additionalProperties": false
    })
}

/// Finds the configuration file: the explicit path if given, otherwise the
/// first of [`CONFIG_FILES`] present in `search_dir`.
pub fn find_config<P: AsRef<Path>>(explicit: Option<&Path>, search_dir: P) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(Error::ConfigError(format!(
                "configuration file '{}' does not exist",
                path.display()
            )));
        }
        return Ok(path.to_path_buf());
    }

    for file in CONFIG_FILES {
        let candidate = search_dir.as_ref().join(file);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    Err(Error::ConfigError(format!(
        "No configuration file found (tried: {})",
        CONFIG_FILES.join(", ")
    )))
}

/// Parses raw configuration content, trying JSON first and YAML second,
/// then validates it against the configuration schema.
pub fn parse_config(content: &str) -> Result<Config> {
    let raw: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(_) => serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration format: {e}")))?,
    };
    if raw.is_null() {
        return Err(Error::ConfigError("configuration is empty".to_string()));
    }

    let validator = jsonschema::validator_for(&config_schema())
        .map_err(|e| Error::ConfigError(format!("Invalid configuration schema: {e}")))?;
    let problems: Vec<String> = validator.iter_errors(&raw).map(|e| e.to_string()).collect();
    if !problems.is_empty() {
        return Err(Error::ConfigError(format!("Invalid schema: {}", problems.join("; "))));
    }

    let config: Config = serde_json::from_value(raw)
        .map_err(|e| Error::ConfigError(format!("Invalid schema: {e}")))?;
    config.validate()?;
    Ok(config)
}

/// Loads, validates and resolves the configuration.
///
/// Relative directories are resolved against the directory holding the
/// configuration file.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let cwd = std::env::current_dir()?;
    let path = find_config(explicit, &cwd)?;
    debug!("Loading configuration from {}", path.display());

    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    let base = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => cwd,
    };
    Ok(config.resolve_paths(base))
}

impl Config {
    fn validate(&self) -> Result<()> {
        let mut targets = HashSet::new();
        for rule in &self.rules {
            let mut names = HashSet::new();
            for field in &rule.fields {
                if !names.insert(field.name.as_str()) {
                    return Err(Error::ConfigError(format!(
                        "field '{}' is mapped more than once for '{}'",
                        field.name,
                        rule.source.display()
                    )));
                }
            }

            let target = self.target_for(rule)?;
            DataFormat::from_path(&target)?;
            if !targets.insert(target.clone()) {
                return Err(Error::ConfigError(format!(
                    "more than one rule writes '{}'",
                    target.display()
                )));
            }
        }

        for pattern in &self.preview.ignore {
            globset::Glob::new(pattern)
                .map_err(|e| Error::ConfigError(format!("invalid preview ignore pattern: {e}")))?;
        }
        Ok(())
    }

    /// Joins every relative directory onto `base`.
    pub fn resolve_paths<P: AsRef<Path>>(mut self, base: P) -> Self {
        let base = base.as_ref();
        for dir in [
            &mut self.markdown_dir,
            &mut self.data_dir,
            &mut self.staging_dir,
            &mut self.templates_dir,
            &mut self.filled_dir,
        ] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        self
    }

    /// Where a rule's structured document is written.
    pub fn target_for(&self, rule: &ConversionRule) -> Result<PathBuf> {
        let dir = if rule.staged { &self.staging_dir } else { &self.data_dir };
        let file_name = match &rule.target {
            Some(target) => target.clone(),
            None => {
                let stem = rule.source.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                    Error::ConfigError(format!("invalid source path '{}'", rule.source.display()))
                })?;
                PathBuf::from(format!("{}.{}", slugify(stem), DEFAULT_DATA_EXTENSION))
            }
        };
        Ok(dir.join(file_name))
    }

    pub fn source_for(&self, rule: &ConversionRule) -> PathBuf {
        self.markdown_dir.join(&rule.source)
    }
}

/// Picks the address to bind: the configured host, else all interfaces in
/// production and loopback otherwise.
pub fn resolve_host(configured: Option<&str>) -> String {
    if let Some(host) = configured {
        return host.to_string();
    }
    match std::env::var(ENVIRONMENT_VAR) {
        Ok(env) if env.eq_ignore_ascii_case("production") => "0.0.0.0".to_string(),
        _ => "127.0.0.1".to_string(),
    }
}
