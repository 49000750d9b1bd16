//! Keyword and semantic retrieval over document chunks.

pub mod bm25;
pub mod hybrid;
pub mod pinecone;
pub mod vector;

use anyhow::Result;
use uuid::Uuid;

use crate::config::Config;
use crate::models::DocumentChunk;
use pinecone::PineconeIndex;
use vector::{VectorHit, VectorStore};

/// Where chunk embeddings live: the local JSON-backed store or a Pinecone index.
pub enum VectorIndex {
    Local(VectorStore),
    Pinecone(PineconeIndex),
}

impl VectorIndex {
    /// Pinecone when configured, otherwise the local store under `vector_dir`.
    pub fn open(config: &Config, client: reqwest::Client) -> Result<Self> {
        match &config.pinecone {
            Some(pc) => {
                tracing::info!("Using Pinecone index at {}", pc.index_host);
                Ok(Self::Pinecone(PineconeIndex::new(pc.clone(), client)))
            }
            None => {
                let store = VectorStore::open_or_create_with_limit(
                    &config.vector_dir(),
                    config.max_vector_entries,
                )?;
                tracing::info!("Using local vector store ({} entries)", store.entry_count());
                Ok(Self::Local(store))
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Pinecone(_) => "pinecone",
        }
    }

    pub async fn upsert_chunks(
        &self,
        chunks: &[DocumentChunk],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<()> {
        match self {
            Self::Local(store) => store.add_chunks(chunks, embeddings),
            Self::Pinecone(index) => index.upsert(chunks, embeddings).await,
        }
    }

    pub async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
        document_ids: Option<&[Uuid]>,
    ) -> Result<Vec<VectorHit>> {
        match self {
            Self::Local(store) => Ok(store.search(embedding, limit, document_ids)),
            Self::Pinecone(index) => index.query(embedding, limit, document_ids).await,
        }
    }

    /// Remove a document's vectors. `chunk_count` bounds the ids a remote
    /// index is asked to delete; the local store drops every entry.
    pub async fn delete_document(&self, document_id: &Uuid, chunk_count: usize) -> Result<()> {
        match self {
            Self::Local(store) => store.delete_document(document_id),
            Self::Pinecone(index) => index.delete_document(document_id, chunk_count).await,
        }
    }
}
