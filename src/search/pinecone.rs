//! Pinecone data-plane client.
//!
//! Talks to a single index host over REST: upsert, query with a metadata
//! filter, and delete by vector id. Chunk text and line ranges ride along as
//! vector metadata so query results can be turned back into hits.
//!
//! Vector ids are `<document_id>#<chunk_index>`. Serverless indexes reject
//! delete-by-metadata-filter, so a document's vectors are deleted by listing
//! those ids from its chunk count.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::PineconeConfig;
use crate::models::DocumentChunk;
use crate::search::vector::VectorHit;

const UPSERT_BATCH: usize = 100;

/// Pinecone accepts at most 1000 ids per delete call.
const DELETE_BATCH: usize = 1000;

/// Pinecone rejects metadata over 40 KB per vector.
const MAX_METADATA_CONTENT_BYTES: usize = 30_000;

pub struct PineconeIndex {
    config: PineconeConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<PineconeVector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
struct PineconeVector {
    id: String,
    values: Vec<f32>,
    metadata: ChunkMetadata,
}

/// Numbers come back from Pinecone as floats, so they are stored as f64.
#[derive(Debug, Serialize, Deserialize)]
struct ChunkMetadata {
    document_id: String,
    filename: String,
    chunk_index: f64,
    content: String,
    start_line: f64,
    end_line: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    #[serde(default)]
    score: f32,
    metadata: Option<ChunkMetadata>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

impl PineconeIndex {
    pub fn new(config: PineconeConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn url(&self, path: &str) -> String {
        let host = self.config.index_host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}{path}")
        } else {
            format!("https://{host}{path}")
        }
    }

    fn namespace(&self) -> Option<&str> {
        self.config.namespace.as_deref().filter(|n| !n.is_empty())
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<reqwest::Response> {
        let resp = self
            .client
            .post(self.url(path))
            .header("Api-Key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach Pinecone at {path}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Pinecone {path} returned {status}: {body}");
        }
        Ok(resp)
    }

    /// Upsert chunk vectors. `embeddings` must be parallel with `chunks`.
    pub async fn upsert(&self, chunks: &[DocumentChunk], embeddings: Vec<Vec<f32>>) -> Result<()> {
        if chunks.len() != embeddings.len() {
            anyhow::bail!(
                "Got {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            );
        }

        let vectors: Vec<PineconeVector> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, values)| PineconeVector {
                id: vector_id(&chunk.document_id, chunk.chunk_index),
                values,
                metadata: ChunkMetadata::from(chunk),
            })
            .collect();

        let mut vectors = vectors.into_iter().peekable();
        while vectors.peek().is_some() {
            let batch: Vec<PineconeVector> = vectors.by_ref().take(UPSERT_BATCH).collect();
            let count = batch.len();
            self.post(
                "/vectors/upsert",
                &UpsertRequest {
                    vectors: batch,
                    namespace: self.namespace(),
                },
            )
            .await?;
            tracing::debug!("Upserted {count} vectors to Pinecone");
        }
        Ok(())
    }

    pub async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        document_ids: Option<&[Uuid]>,
    ) -> Result<Vec<VectorHit>> {
        let resp = self
            .post(
                "/query",
                &QueryRequest {
                    vector: embedding,
                    top_k,
                    include_metadata: true,
                    filter: document_filter(document_ids),
                    namespace: self.namespace(),
                },
            )
            .await?;

        let body: QueryResponse = resp
            .json()
            .await
            .context("Failed to parse Pinecone query response")?;
        Ok(hits_from_matches(body.matches))
    }

    /// Delete the vectors of chunks `0..chunk_count` of a document.
    pub async fn delete_document(&self, document_id: &Uuid, chunk_count: usize) -> Result<()> {
        let ids = chunk_vector_ids(document_id, chunk_count);
        for batch in ids.chunks(DELETE_BATCH) {
            self.post(
                "/vectors/delete",
                &DeleteRequest {
                    ids: batch,
                    namespace: self.namespace(),
                },
            )
            .await?;
        }
        Ok(())
    }
}

pub fn vector_id(document_id: &Uuid, chunk_index: usize) -> String {
    format!("{document_id}#{chunk_index}")
}

fn chunk_vector_ids(document_id: &Uuid, chunk_count: usize) -> Vec<String> {
    (0..chunk_count).map(|i| vector_id(document_id, i)).collect()
}

fn document_filter(document_ids: Option<&[Uuid]>) -> Option<Value> {
    let ids = document_ids?;
    let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
    Some(json!({ "document_id": { "$in": ids } }))
}

fn hits_from_matches(matches: Vec<QueryMatch>) -> Vec<VectorHit> {
    matches
        .into_iter()
        .filter_map(|m| {
            let meta = m.metadata?;
            let document_id = Uuid::parse_str(&meta.document_id).ok()?;
            Some(VectorHit {
                document_id,
                filename: meta.filename,
                chunk_index: meta.chunk_index as usize,
                content: meta.content,
                start_line: meta.start_line as usize,
                end_line: meta.end_line as usize,
                score: m.score,
            })
        })
        .collect()
}

impl From<&DocumentChunk> for ChunkMetadata {
    fn from(chunk: &DocumentChunk) -> Self {
        Self {
            document_id: chunk.document_id.to_string(),
            filename: chunk.filename.clone(),
            chunk_index: chunk.chunk_index as f64,
            content: crate::llm::truncate_to_char_boundary(
                &chunk.content,
                MAX_METADATA_CONTENT_BYTES,
            )
            .to_string(),
            start_line: chunk.start_line as f64,
            end_line: chunk.end_line as f64,
        }
    }
}
