//! Durable key -> document storage holding the cursor filter.
//!
//! Writes replace the whole document. Writers take `&mut self`, so the owner of a store is
//! the only party able to run a read-modify-write cycle on it.

use crate::errors::StoreError;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Key of the filter template shipped with the device.
pub const TEMPLATE_KEY: &str = "req-template.json";
/// Key of the live filter document, i.e. the persisted cursor.
pub const CURSOR_KEY: &str = "req-data.json";

pub trait CursorStore {
    fn read_document(&self, key: &str) -> Result<String, StoreError>;

    fn write_document(&mut self, key: &str, document: &str) -> Result<(), StoreError>;
}

/// Documents stored as files under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl CursorStore for FileStore {
    fn read_document(&self, key: &str) -> Result<String, StoreError> {
        let content = match std::fs::read_to_string(self.path(key)) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.to_string()))
            }
            Err(source) => {
                return Err(StoreError::Unreadable {
                    key: key.to_string(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Err(StoreError::Empty(key.to_string()));
        }
        Ok(content)
    }

    fn write_document(&mut self, key: &str, document: &str) -> Result<(), StoreError> {
        let write_failure = |source: std::io::Error| StoreError::WriteFailure {
            key: key.to_string(),
            source,
        };

        let path = self.path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_failure)?;
        }

        // Write aside and rename so a crash never leaves a half-written cursor
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, document).map_err(write_failure)?;
        std::fs::rename(&tmp, &path).map_err(write_failure)?;
        Ok(())
    }
}

/// In-memory store, with switchable write failures.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    documents: HashMap<String, String>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, key: &str, document: &str) -> Self {
        self.documents.insert(key.to_string(), document.to_string());
        self
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.documents.remove(key)
    }
}

impl CursorStore for MemoryStore {
    fn read_document(&self, key: &str) -> Result<String, StoreError> {
        match self.documents.get(key) {
            None => Err(StoreError::NotFound(key.to_string())),
            Some(doc) if doc.trim().is_empty() => Err(StoreError::Empty(key.to_string())),
            Some(doc) => Ok(doc.clone()),
        }
    }

    fn write_document(&mut self, key: &str, document: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::WriteFailure {
                key: key.to_string(),
                source: std::io::Error::new(ErrorKind::Other, "writes disabled"),
            });
        }
        self.documents.insert(key.to_string(), document.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::new(dir.path());
        store.write_document(CURSOR_KEY, r#"{"since":1}"#).unwrap();
        assert_eq!(store.read_document(CURSOR_KEY).unwrap(), r#"{"since":1}"#);

        store.write_document(CURSOR_KEY, r#"{"since":2}"#).unwrap();
        assert_eq!(store.read_document(CURSOR_KEY).unwrap(), r#"{"since":2}"#);
        assert!(!store.path(CURSOR_KEY).with_extension("tmp").exists());
    }

    #[test]
    fn test_file_store_missing_and_empty() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::new(dir.path());
        assert!(matches!(
            store.read_document(TEMPLATE_KEY),
            Err(StoreError::NotFound(_))
        ));

        std::fs::write(store.path(TEMPLATE_KEY), "").unwrap();
        assert!(matches!(
            store.read_document(TEMPLATE_KEY),
            Err(StoreError::Empty(_))
        ));

        store.write_document(TEMPLATE_KEY, "  \n").unwrap();
        assert!(matches!(
            store.read_document(TEMPLATE_KEY),
            Err(StoreError::Empty(_))
        ));
    }

    #[test]
    fn test_file_store_creates_root() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::new(dir.path().join("nested/data"));
        store.write_document(CURSOR_KEY, "{}").unwrap();
        assert_eq!(store.read_document(CURSOR_KEY).unwrap(), "{}");
    }

    #[test]
    fn test_memory_store_write_failure() {
        let mut store = MemoryStore::new().with_document(CURSOR_KEY, "{}");
        store.set_fail_writes(true);
        assert!(matches!(
            store.write_document(CURSOR_KEY, r#"{"since":5}"#),
            Err(StoreError::WriteFailure { .. })
        ));
        assert_eq!(store.read_document(CURSOR_KEY).unwrap(), "{}");
    }
}
