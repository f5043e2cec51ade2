//! docpipe is a documentation pipeline.
//! Markdown sources are converted into structured data files (YAML or JSON)
//! according to a rule list; the data files fill document templates and are
//! served read-only over HTTP. A preview server renders the markdown itself.

/// Command-line interface module for the docpipe binary
pub mod cli;

/// Conversion configuration: rules, fill jobs, directories, servers
/// Supports JSON and YAML formats (docpipe.json, docpipe.yml, docpipe.yaml)
pub mod config;

pub mod constants;

/// Markdown to structured data conversion
pub mod converter;

/// Error types and handling for docpipe
pub mod error;

/// Template filling from stored documents
pub mod filler;

/// Shared HTTP error responses, request logging and serve loop
pub mod http;

pub mod logger;

/// Markdown parsing into front matter, title, body and sections
pub mod markdown;

/// Rendered markdown preview server
pub mod preview;

/// MiniJinja template rendering
pub mod renderer;

/// Read-only document API
pub mod server;

pub mod slug;

/// Structured documents on disk
pub mod store;
