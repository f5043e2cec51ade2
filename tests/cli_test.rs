use clap::Parser;
use docpipe::cli::{Args, Command};
use std::ffi::OsString;
use std::path::PathBuf;

fn make_args(args: &[&str]) -> Vec<OsString> {
    let mut res = vec![OsString::from("docpipe")];
    res.extend(args.iter().map(OsString::from));
    res
}

#[test]
fn test_basic_args() {
    let parsed = Args::try_parse_from(make_args(&["convert"])).unwrap();

    assert_eq!(parsed.command, Command::Convert);
    assert!(parsed.config.is_none());
    assert!(!parsed.verbose);
}

#[test]
fn test_global_flags_after_subcommand() {
    let parsed =
        Args::try_parse_from(make_args(&["fill", "--config", "pipe.yml", "--verbose"])).unwrap();

    assert_eq!(parsed.command, Command::Fill);
    assert_eq!(parsed.config, Some(PathBuf::from("pipe.yml")));
    assert!(parsed.verbose);
}

#[test]
fn test_short_flags() {
    let parsed = Args::try_parse_from(make_args(&["-v", "-c", "pipe.json", "run"])).unwrap();

    assert_eq!(parsed.command, Command::Run);
    assert!(parsed.verbose);
    assert_eq!(parsed.config, Some(PathBuf::from("pipe.json")));
}

#[test]
fn test_serve_overrides() {
    let parsed =
        Args::try_parse_from(make_args(&["serve", "--host", "0.0.0.0", "-p", "9090"])).unwrap();

    assert_eq!(
        parsed.command,
        Command::Serve { host: Some("0.0.0.0".to_string()), port: Some(9090) }
    );
}

#[test]
fn test_preview_defaults() {
    let parsed = Args::try_parse_from(make_args(&["preview"])).unwrap();
    assert_eq!(parsed.command, Command::Preview { host: None, port: None });
}

#[test]
fn test_missing_subcommand() {
    assert!(Args::try_parse_from(make_args(&[])).is_err());
}

#[test]
fn test_unknown_subcommand() {
    assert!(Args::try_parse_from(make_args(&["deploy"])).is_err());
}
