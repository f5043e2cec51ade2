//! Error handling for docpipe.
//! Defines the error taxonomy and result alias used by every pipeline stage.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for docpipe operations.
///
/// Configuration errors abort a whole command. The remaining variants are
/// raised per rule, per fill job or per request and are handled at that
/// boundary.
#[derive(Error, Debug)]
pub enum Error {
    /// Represents errors that occur during file system operations
    #[error("IO error: {0}.")]
    IoError(#[from] io::Error),

    /// Malformed or invalid conversion configuration
    #[error("Configuration error: {0}.")]
    ConfigError(String),

    /// The markdown file named by a conversion rule does not exist
    #[error("Markdown source '{}' does not exist.", source_path.display())]
    MissingSourceError { source_path: PathBuf },

    /// A configured field could not be extracted from its markdown source
    #[error("Field '{field}' not found in '{}'.", source_path.display())]
    MissingFieldError { field: String, source_path: PathBuf },

    /// The template named by a fill job does not exist
    #[error("Template '{}' does not exist.", template_path.display())]
    MissingTemplateError { template_path: PathBuf },

    /// A template placeholder has no matching key in the structured document
    #[error("Placeholder '{placeholder}' in '{}' has no matching value.", template_path.display())]
    UnresolvedPlaceholderError {
        placeholder: String,
        template_path: PathBuf,
    },

    /// No structured document (or section) exists for the requested identifier
    #[error("Document '{0}' not found.")]
    NotFoundError(String),

    /// Represents errors raised by the template engine
    #[error("Template error: {0}")]
    TemplateError(#[from] minijinja::Error),

    /// Reading or writing YAML/JSON structured data failed
    #[error("Serialization error: {0}.")]
    SerializationError(String),

    /// The HTTP server could not be started
    #[error("Server error: {0}.")]
    ServerError(String),
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

/// Convenience type alias for Results with docpipe's Error as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// # Arguments
/// * `err` - The error to handle
///
/// # Behavior
/// Prints the error message to stderr and exits with status code 1
pub fn default_error_handler(err: anyhow::Error) -> ! {
    eprintln!("{err:#}");
    std::process::exit(1);
}
