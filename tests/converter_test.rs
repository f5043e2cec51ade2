use docpipe::config::{load_config, Config};
use docpipe::converter::{conversion_task, Converter};
use docpipe::error::Error;
use docpipe::store::{read_document, DocumentStore};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const POLICY: &str = r#"---
document_type: Policy
document_no: POL-001
---

# Access Control Policy

Defines who may access what.

## Revision History

| Revision No | Description of Changes |
| --- | --- |
| 1 | Initial release |

## Purpose

Protect [company assets](https://example.com).

## Scope

- Employees
- Contractors
    - On site
"#;

fn workspace(config: &str, files: &[(&str, &str)]) -> (TempDir, Config) {
    let temp = TempDir::new().unwrap();
    for (name, content) in files {
        let path = temp.path().join("docs").join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    let config_path = temp.path().join("docpipe.yml");
    fs::write(&config_path, config).unwrap();
    let config = load_config(Some(&config_path)).unwrap();
    (temp, config)
}

#[test_log::test]
fn test_title_and_body_scenario() {
    let (temp, config) = workspace(
        r#"
rules:
  - source: example.md
    target: example.yaml
    fields: [title, body]
"#,
        &[("example.md", "# Title\nHello")],
    );

    let report = conversion_task(&config);
    assert!(report.is_success());

    let document = read_document(temp.path().join("yml/example.yaml")).unwrap();
    assert_eq!(serde_json::Value::Object(document), json!({"title": "Title", "body": "Hello"}));
}

#[test_log::test]
fn test_keys_equal_configured_fields() {
    let (temp, config) = workspace(
        r#"
header_aliases:
  Revision No: rev_no
  Description of Changes: description_of_changes
rules:
  - source: policy.md
    fields:
      - document_no
      - title
      - name: revisions
        from: { section: Revision History }
      - scope
      - name: owner
        from: { front_matter: owner }
"#,
        &[("policy.md", POLICY)],
    );

    let report = conversion_task(&config);
    assert!(report.is_success());
    assert_eq!(report.converted[0].missing_fields.len(), 1);

    let document = read_document(temp.path().join("yml/policy.yml")).unwrap();
    assert_eq!(
        document.keys().collect::<Vec<_>>(),
        vec!["document_no", "title", "revisions", "scope", "owner"]
    );
    assert_eq!(document["title"], json!("Access Control Policy"));
    assert_eq!(
        document["revisions"],
        json!([{"rev_no": "1", "description_of_changes": "Initial release"}])
    );
    assert_eq!(document["scope"], json!(["Employees", {"Contractors": ["On site"]}]));
    assert_eq!(document["owner"], serde_json::Value::Null);
}

#[test]
fn test_rule_without_fields_emits_whole_document() {
    let (temp, config) = workspace("rules:\n  - source: Access Policy.md\n", &[("Access Policy.md", POLICY)]);

    assert!(conversion_task(&config).is_success());

    let document = read_document(temp.path().join("yml/access_policy.yml")).unwrap();
    assert_eq!(
        document.keys().collect::<Vec<_>>(),
        vec!["document_type", "document_no", "title", "revision_history", "purpose", "scope"]
    );
    assert_eq!(document["purpose"], json!(["Protect company assets."]));
}

#[test]
fn test_rerun_is_byte_identical() {
    let (temp, config) = workspace(
        "rules:\n  - source: policy.md\n  - source: policy.md\n    target: policy.json\n",
        &[("policy.md", POLICY)],
    );

    assert!(conversion_task(&config).is_success());
    let snapshot = temp.path().join("snapshot");
    fs::create_dir_all(&snapshot).unwrap();
    for name in ["policy.yml", "policy.json"] {
        fs::copy(temp.path().join("yml").join(name), snapshot.join(name)).unwrap();
    }

    assert!(conversion_task(&config).is_success());
    assert!(!dir_diff::is_different(temp.path().join("yml"), &snapshot).unwrap());
}

#[test_log::test]
fn test_missing_source_does_not_block_other_rules() {
    let (temp, config) = workspace(
        "rules:\n  - source: missing.md\n  - source: example.md\n    fields: [title]\n",
        &[("example.md", "# Present\n")],
    );

    let report = conversion_task(&config);
    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(report.failed[0].1, Error::MissingSourceError { .. }));
    assert_eq!(report.converted.len(), 1);

    let document = read_document(temp.path().join("yml/example.yml")).unwrap();
    assert_eq!(document["title"], json!("Present"));
}

#[test]
fn test_existing_target_is_overwritten() {
    let (temp, config) = workspace(
        "rules:\n  - source: example.md\n    fields: [title]\n",
        &[("example.md", "# New\n")],
    );
    let target = temp.path().join("yml/example.yml");
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(&target, "title: Old\nstale: true\n").unwrap();

    let outcome = Converter::new(&config).convert(&config.rules[0]).unwrap();
    assert_eq!(outcome.target, target);

    let document = read_document(&target).unwrap();
    assert_eq!(serde_json::Value::Object(document), json!({"title": "New"}));
}

#[test]
fn test_staged_rule_writes_to_staging_dir() {
    let (temp, config) = workspace(
        "rules:\n  - source: example.md\n    staged: true\n",
        &[("example.md", "# Draft\n")],
    );

    assert!(conversion_task(&config).is_success());
    assert!(temp.path().join("temp_yml/example.yml").is_file());
    assert!(!Path::new(&temp.path().join("yml/example.yml")).exists());
}

#[test]
fn test_no_temporary_files_left_behind() {
    let (temp, config) = workspace(
        "rules:\n  - source: policy.md\n  - source: policy.md\n    target: policy.json\n",
        &[("policy.md", POLICY)],
    );
    let data_dir = temp.path().join("yml");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(data_dir.join(".tmpAb12Cd"), "partial").unwrap();
    fs::write(data_dir.join(".tmpEf34.yml"), "title: partial\n").unwrap();

    assert!(conversion_task(&config).is_success());

    let mut names: Vec<String> = fs::read_dir(&data_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with(".tmpAb12") && !name.starts_with(".tmpEf34"))
        .collect();
    names.sort();
    assert_eq!(names, vec!["policy.json", "policy.yml"]);

    let store = DocumentStore::new(&data_dir);
    assert_eq!(store.list().unwrap(), vec!["policy"]);
}
