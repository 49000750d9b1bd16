use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::DocumentChunk;

/// A stored vector entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    document_id: Uuid,
    filename: String,
    chunk_index: usize,
    content: String,
    start_line: usize,
    end_line: usize,
    embedding: Vec<f32>,
}

/// In-memory vector store with disk persistence and cosine similarity search.
pub struct VectorStore {
    entries: RwLock<Vec<VectorEntry>>,
    persist_path: PathBuf,
    /// 0 means unbounded
    max_entries: usize,
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub document_id: Uuid,
    pub filename: String,
    pub chunk_index: usize,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub score: f32,
}

impl VectorStore {
    pub fn open_or_create(vector_dir: &Path) -> Result<Self> {
        Self::open_or_create_with_limit(vector_dir, 0)
    }

    pub fn open_or_create_with_limit(vector_dir: &Path, max_entries: usize) -> Result<Self> {
        std::fs::create_dir_all(vector_dir)?;
        let persist_path = vector_dir.join("vectors.json");

        let entries = if persist_path.exists() {
            let data = std::fs::read_to_string(&persist_path)
                .context("Failed to read vector store")?;
            serde_json::from_str(&data).unwrap_or_else(|e| {
                tracing::warn!(
                    "Vector store at {} is unreadable, starting empty: {e}",
                    persist_path.display()
                );
                Vec::new()
            })
        } else {
            Vec::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            persist_path,
            max_entries,
        })
    }

    /// Replace the vectors of every document in `chunks`. `embeddings` must be
    /// parallel with `chunks`.
    pub fn add_chunks(&self, chunks: &[DocumentChunk], embeddings: Vec<Vec<f32>>) -> Result<()> {
        if chunks.len() != embeddings.len() {
            anyhow::bail!(
                "Got {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            );
        }

        let mut entries = self.entries.write();
        let replaced = |e: &VectorEntry| chunks.iter().any(|c| c.document_id == e.document_id);

        let kept = entries.iter().filter(|e| !replaced(e)).count();
        if self.max_entries > 0 && kept + chunks.len() > self.max_entries {
            anyhow::bail!(
                "Vector store limit reached ({} entries, max {})",
                kept + chunks.len(),
                self.max_entries
            );
        }
        entries.retain(|e| !replaced(e));

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            entries.push(VectorEntry {
                document_id: chunk.document_id,
                filename: chunk.filename.clone(),
                chunk_index: chunk.chunk_index,
                content: chunk.content.clone(),
                start_line: chunk.start_line,
                end_line: chunk.end_line,
                embedding,
            });
        }

        self.persist(&entries)
    }

    /// Delete all vectors for a document.
    pub fn delete_document(&self, document_id: &Uuid) -> Result<()> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| &e.document_id != document_id);
        if entries.len() == before {
            return Ok(());
        }
        self.persist(&entries)
    }

    fn persist(&self, entries: &[VectorEntry]) -> Result<()> {
        let data = serde_json::to_string(entries)?;
        let tmp = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp, data).context("Failed to write vector store")?;
        std::fs::rename(&tmp, &self.persist_path).context("Failed to replace vector store")?;
        Ok(())
    }

    /// Search by cosine similarity against a query embedding.
    pub fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        document_ids: Option<&[Uuid]>,
    ) -> Vec<VectorHit> {
        let entries = self.entries.read();

        let mut scored: Vec<(f32, &VectorEntry)> = entries
            .iter()
            .filter(|e| document_ids.map_or(true, |ids| ids.contains(&e.document_id)))
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, e)| VectorHit {
                document_id: e.document_id,
                filename: e.filename.clone(),
                chunk_index: e.chunk_index,
                content: e.content.clone(),
                start_line: e.start_line,
                end_line: e.end_line,
                score,
            })
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Vector counts grouped by document.
    pub fn document_counts(&self) -> HashMap<Uuid, usize> {
        let entries = self.entries.read();
        let mut counts = HashMap::new();
        for e in entries.iter() {
            *counts.entry(e.document_id).or_insert(0) += 1;
        }
        counts
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
