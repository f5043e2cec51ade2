use std::io;
use std::path::PathBuf;

use docpipe::error::Error;

#[test]
fn test_error_conversion() {
    let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let err: Error = io_err.into();

    match err {
        Error::IoError(_) => (),
        _ => panic!("Expected IoError variant"),
    }
}

#[test]
fn test_yaml_error_conversion() {
    let yaml_err = serde_yaml::from_str::<serde_json::Value>("a: [").unwrap_err();
    let err: Error = yaml_err.into();
    assert!(matches!(err, Error::SerializationError(_)));
}

#[test]
fn test_error_display() {
    let err = Error::ConfigError("invalid config".to_string());
    assert_eq!(err.to_string(), "Configuration error: invalid config.");

    let err = Error::MissingSourceError { source_path: PathBuf::from("docs/a.md") };
    assert_eq!(err.to_string(), "Markdown source 'docs/a.md' does not exist.");

    let err = Error::MissingFieldError {
        field: "scope".to_string(),
        source_path: PathBuf::from("docs/a.md"),
    };
    assert_eq!(err.to_string(), "Field 'scope' not found in 'docs/a.md'.");

    let err = Error::UnresolvedPlaceholderError {
        placeholder: "owner".to_string(),
        template_path: PathBuf::from("templates/t.md.j2"),
    };
    assert_eq!(
        err.to_string(),
        "Placeholder 'owner' in 'templates/t.md.j2' has no matching value."
    );

    let err = Error::NotFoundError("example".to_string());
    assert_eq!(err.to_string(), "Document 'example' not found.");
}
