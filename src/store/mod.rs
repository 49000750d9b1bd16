//! Flat-file persistence: each collection is one JSON array rewritten whole
//! on every change.

pub mod documents;
pub mod mindmaps;
pub mod texts;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;

pub use documents::DocumentStore;
pub use mindmaps::MindMapStore;
pub use texts::TextStore;

/// A JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read all records. A missing file is empty; a corrupt file is logged
    /// and treated as empty.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&data) {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable store {}: {e}",
                    self.path.display()
                );
                Ok(Vec::new())
            }
        }
    }

    /// Atomic write via temp file + rename.
    pub fn save<T: Serialize>(&self, records: &[T]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(records)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    /// Persist `next`, then install it as `current`. A failed save leaves
    /// `current` untouched.
    pub fn replace<T: Serialize>(&self, current: &mut Vec<T>, next: Vec<T>) -> Result<()> {
        self.save(&next)?;
        *current = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("none.json"));
        let records: Vec<u32> = file.load().unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let records: Vec<u32> = JsonFile::new(&path).load().unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("nested/data.json"));
        file.save(&[1u32, 2, 3]).unwrap();
        let records: Vec<u32> = file.load().unwrap();
        assert_eq!(records, vec![1, 2, 3]);
        assert!(!dir.path().join("nested/data.json.tmp").exists());
    }
}
