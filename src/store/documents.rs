use anyhow::Result;
use parking_lot::RwLock;
use std::path::Path;
use uuid::Uuid;

use super::JsonFile;
use crate::models::{Document, DocumentStatus};

/// Document records held in memory and mirrored to `documents.json`.
pub struct DocumentStore {
    file: JsonFile,
    docs: RwLock<Vec<Document>>,
}

impl DocumentStore {
    pub fn open(path: &Path) -> Result<Self> {
        let file = JsonFile::new(path);
        let docs: Vec<Document> = file.load()?;
        tracing::info!("Loaded {} documents from {}", docs.len(), path.display());
        Ok(Self {
            file,
            docs: RwLock::new(docs),
        })
    }

    /// All documents, newest first.
    pub fn list(&self) -> Vec<Document> {
        let mut docs = self.docs.read().clone();
        docs.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        docs
    }

    pub fn get(&self, id: Uuid) -> Option<Document> {
        self.docs.read().iter().find(|d| d.id == id).cloned()
    }

    pub fn exists(&self, id: Uuid) -> bool {
        self.docs.read().iter().any(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&self, doc: Document) -> Result<()> {
        let mut docs = self.docs.write();
        let mut next = docs.clone();
        next.push(doc);
        self.file.replace(&mut docs, next)
    }

    /// Mutate a document in place and persist. `None` if it does not exist.
    pub fn update<F>(&self, id: Uuid, f: F) -> Result<Option<Document>>
    where
        F: FnOnce(&mut Document),
    {
        let mut docs = self.docs.write();
        let mut next = docs.clone();
        let Some(doc) = next.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        f(doc);
        let updated = doc.clone();
        self.file.replace(&mut docs, next)?;
        Ok(Some(updated))
    }

    pub fn set_status(&self, id: Uuid, status: DocumentStatus) -> Result<Option<Document>> {
        self.update(id, |d| d.status = status)
    }

    /// Remove a document. Returns whether it existed.
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let mut docs = self.docs.write();
        let next: Vec<Document> = docs.iter().filter(|d| d.id != id).cloned().collect();
        if next.len() == docs.len() {
            return Ok(false);
        }
        self.file.replace(&mut docs, next)?;
        Ok(true)
    }
}
