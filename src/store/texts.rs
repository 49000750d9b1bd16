use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Extracted plain text, one `<id>.txt` file per document.
pub struct TextStore {
    dir: PathBuf,
}

impl TextStore {
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.txt"))
    }

    pub fn save(&self, id: Uuid, text: &str) -> Result<()> {
        let path = self.path_for(id);
        std::fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn load(&self, id: Uuid) -> Result<String> {
        let path = self.path_for(id);
        std::fs::read_to_string(&path)
            .with_context(|| format!("No extracted text for document {id}"))
    }

    /// Remove the text file; missing files are not an error.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        match std::fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
