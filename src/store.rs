//! The data store: structured documents on disk, keyed by identifier.
//!
//! Readers always go to the file system, so every read observes the last
//! completed conversion. Writers replace files by renaming a fully written
//! temporary file into place.

use crate::config::DataFormat;
use crate::constants::DATA_EXTENSIONS;
use crate::error::{Error, Result};
use crate::slug::is_valid_identifier;
use log::debug;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Key-value data extracted from one markdown file.
pub type StructuredDocument = Map<String, Value>;

/// Serializes a document in the given format.
pub fn serialize_document(document: &StructuredDocument, format: DataFormat) -> Result<String> {
    match format {
        DataFormat::Yaml => Ok(serde_yaml::to_string(document)?),
        DataFormat::Json => {
            let mut out = serde_json::to_string_pretty(document)?;
            out.push('\n');
            Ok(out)
        }
    }
}

/// Replaces `path` with `content` without exposing a partially written file.
pub fn write_atomic<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut temp = NamedTempFile::new_in(&parent)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::IoError(e.error))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Writes a document, choosing the format from the file extension.
pub fn write_document<P: AsRef<Path>>(path: P, document: &StructuredDocument) -> Result<()> {
    let path = path.as_ref();
    let content = serialize_document(document, DataFormat::from_path(path)?)?;
    write_atomic(path, &content)
}

/// Reads a document, choosing the format from the file extension.
pub fn read_document<P: AsRef<Path>>(path: P) -> Result<StructuredDocument> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let value: Value = match DataFormat::from_path(path)? {
        DataFormat::Yaml => serde_yaml::from_str(&content)?,
        DataFormat::Json => serde_json::from_str(&content)?,
    };
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(Error::SerializationError(format!(
            "'{}' does not contain a mapping",
            path.display()
        ))),
    }
}

/// Read access to the structured documents in one directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Identifiers of every stored document, sorted. A missing directory
    /// holds no documents.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let known = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| DATA_EXTENSIONS.contains(&ext));
            let id = path.file_stem().and_then(|stem| stem.to_str());
            if let (true, Some(id)) = (known, id) {
                if is_valid_identifier(id) {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// Finds the file holding document `id`.
    pub fn locate(&self, id: &str) -> Result<PathBuf> {
        if !is_valid_identifier(id) {
            return Err(Error::NotFoundError(id.to_string()));
        }
        DATA_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{id}.{ext}")))
            .find(|path| path.is_file())
            .ok_or_else(|| Error::NotFoundError(id.to_string()))
    }

    /// Reads document `id` fresh from disk.
    pub fn read(&self, id: &str) -> Result<StructuredDocument> {
        let path = self.locate(id)?;
        read_document(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> StructuredDocument {
        let mut doc = Map::new();
        doc.insert("title".to_string(), json!("Policy A"));
        doc.insert("scope".to_string(), json!(["Staff", {"Contractors": ["Long term"]}]));
        doc
    }

    #[test]
    fn test_write_then_read_yaml_and_json() {
        let temp = TempDir::new().unwrap();
        for name in ["doc.yml", "doc.json"] {
            let path = temp.path().join("nested").join(name);
            write_document(&path, &sample()).unwrap();
            assert_eq!(read_document(&path).unwrap(), sample());
        }
    }

    #[test]
    fn test_yaml_keeps_key_order() {
        let yaml = serialize_document(&sample(), DataFormat::Yaml).unwrap();
        assert!(yaml.find("title").unwrap() < yaml.find("scope").unwrap());
    }

    #[test]
    fn test_list_and_locate() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.yml"), "title: B\n").unwrap();
        fs::write(temp.path().join("a.json"), "{}").unwrap();
        fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

        let store = DocumentStore::new(temp.path());
        assert_eq!(store.list().unwrap(), vec!["a", "b"]);
        assert_eq!(store.locate("b").unwrap(), temp.path().join("b.yml"));
        assert_eq!(store.read("b").unwrap().get("title"), Some(&json!("B")));
    }

    #[test]
    fn test_missing_document_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path());
        assert!(matches!(store.read("nope"), Err(Error::NotFoundError(_))));
        assert!(matches!(store.read("../etc"), Err(Error::NotFoundError(_))));
        assert!(DocumentStore::new(temp.path().join("absent")).list().unwrap().is_empty());
    }

    #[test]
    fn test_non_mapping_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("list.yml");
        fs::write(&path, "- a\n- b\n").unwrap();
        assert!(matches!(read_document(&path), Err(Error::SerializationError(_))));
    }
}
