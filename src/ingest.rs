//! Document ingestion: extraction, background analysis and indexing, and
//! removal of everything derived from a document.

use anyhow::{Context, Result};
use chrono::Utc;
use futures_util::StreamExt;
use uuid::Uuid;

use crate::chunking::chunk_document;
use crate::content::{extract_from_bytes, ContentType, ExtractedDocument};
use crate::graph::ConceptGraph;
use crate::llm::{analysis, concepts, embeddings};
use crate::models::{Document, DocumentAnalysis, DocumentSource, DocumentStatus, MindMap};
use crate::state::AppState;

/// A document body fetched from a URL.
pub struct FetchedDocument {
    pub bytes: bytes::Bytes,
    pub mime: Option<String>,
    pub filename: String,
}

/// Only plain web URLs may be fetched.
pub fn validate_url(url: &str) -> Result<reqwest::Url> {
    let parsed = reqwest::Url::parse(url.trim()).context("Invalid URL")?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => anyhow::bail!("Only http:// and https:// URLs are allowed (got {other}://)"),
    }
    if parsed.host_str().is_none() {
        anyhow::bail!("URL has no host");
    }
    Ok(parsed)
}

/// Name for a fetched document: the last path segment, else the host.
pub fn filename_from_url(url: &reqwest::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| url.host_str().map(str::to_string))
        .unwrap_or_else(|| "document".to_string())
}

/// Download `url`, refusing bodies larger than `max_bytes`.
pub async fn fetch_url(
    client: &reqwest::Client,
    url: &reqwest::Url,
    max_bytes: usize,
) -> Result<FetchedDocument> {
    let resp = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("Failed to fetch {url}"))?;

    if !resp.status().is_success() {
        anyhow::bail!("Fetching {url} returned {}", resp.status());
    }
    if resp.content_length().is_some_and(|len| len as usize > max_bytes) {
        anyhow::bail!("Document exceeds the {max_bytes} byte limit");
    }

    let mime = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut body = bytes::BytesMut::new();
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Failed to read response body")?;
        if body.len() + chunk.len() > max_bytes {
            anyhow::bail!("Document exceeds the {max_bytes} byte limit");
        }
        body.extend_from_slice(&chunk);
    }

    Ok(FetchedDocument {
        bytes: body.freeze(),
        mime,
        filename: filename_from_url(url),
    })
}

/// Extract text, persist the record and its text, and queue background
/// processing. Returns the document in `processing` state.
pub async fn ingest_bytes(
    state: &AppState,
    bytes: bytes::Bytes,
    filename: String,
    mime: Option<String>,
    source: DocumentSource,
) -> Result<Document> {
    let content_type = ContentType::detect(mime.as_deref(), &filename);
    let size = bytes.len() as u64;

    let extracted: ExtractedDocument =
        tokio::task::spawn_blocking(move || extract_from_bytes(&bytes, content_type))
            .await
            .context("Extraction task failed")??;

    let doc = Document::new_processing(filename, size, source, extracted.title);
    state.texts.save(doc.id, &extracted.content)?;
    state.documents.insert(doc.clone())?;
    tracing::info!(
        "Stored {} ({:?}, {} bytes), queued for analysis",
        doc.filename,
        content_type,
        size
    );

    spawn_processing(state.clone(), doc.id);
    Ok(doc)
}

/// Run [`process_document`] in the background, bounded by the ingest
/// semaphore. Failures are recorded on the document.
pub fn spawn_processing(state: AppState, id: Uuid) {
    tokio::spawn(async move {
        let _permit = match state.ingest_semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::error!("Ingest semaphore closed, dropping {id}");
                return;
            }
        };
        if let Err(e) = process_document(&state, id).await {
            tracing::error!("Processing {id} failed: {e:#}");
            if let Err(e) = state
                .documents
                .set_status(id, DocumentStatus::Error(format!("{e:#}")))
            {
                tracing::error!("Failed to record error status for {id}: {e:#}");
            }
        }
    });
}

/// Analyze, index and map one document from its stored text.
///
/// LLM failures degrade to placeholders and missing vectors; only storage and
/// keyword-index failures abort. A document deleted mid-run is left deleted:
/// nothing is indexed after the LLM calls, and anything indexed before the
/// final status update is removed again.
pub async fn process_document(state: &AppState, id: Uuid) -> Result<()> {
    let doc = state.documents.get(id).context("Document not found")?;
    let text = state.texts.load(id)?;
    let llm = state.llm();
    let client = &state.http_client;

    let (analysis, questions, graph) = tokio::join!(
        analysis::analyze_document(client, &llm, &text),
        analysis::generate_questions(client, &llm, &text),
        concepts::extract_concept_graph(client, &llm, &text),
    );

    let analysis = analysis.unwrap_or_else(|e| {
        tracing::warn!("Analysis of {} failed, using placeholder: {e:#}", doc.filename);
        DocumentAnalysis::fallback()
    });
    let questions = questions.unwrap_or_else(|e| {
        tracing::warn!("Question generation for {} failed: {e:#}", doc.filename);
        Vec::new()
    });
    let graph = graph.unwrap_or_else(|e| {
        tracing::warn!("Concept extraction for {} failed: {e:#}", doc.filename);
        ConceptGraph::default()
    });

    if !state.documents.exists(id) {
        tracing::info!(
            "{} was deleted during analysis, skipping indexing",
            doc.filename
        );
        return Ok(());
    }

    let chunks = chunk_document(id, &doc.filename, &text);
    let chunk_count = chunks.len();

    let bm25 = state.bm25.clone();
    let bm25_chunks = chunks.clone();
    tokio::task::spawn_blocking(move || {
        if bm25_chunks.is_empty() {
            bm25.delete_document(&id)
        } else {
            bm25.index_chunks(&bm25_chunks)
        }
    })
    .await
    .context("BM25 task failed")??;

    if let Err(e) = index_vectors(state, &llm, id, doc.chunk_count, &chunks).await {
        tracing::warn!("{} is keyword-searchable only: {e:#}", doc.filename);
    }

    if !graph.is_empty() {
        let mut graph = graph;
        graph.tag_document(id);
        state.mindmaps.replace_document_map(MindMap {
            id: Uuid::new_v4(),
            document_ids: vec![id],
            title: doc.display_name().to_string(),
            graph,
            created_at: Utc::now(),
        })?;
    }

    let updated = state.documents.update(id, |d| {
        d.analysis = analysis;
        d.questions = questions;
        d.chunk_count = chunk_count;
        d.human_reviewed = false;
        d.reviewed_at = None;
        d.status = DocumentStatus::Ready;
    })?;
    if updated.is_none() {
        tracing::info!(
            "{} was deleted during indexing, removing its index data",
            doc.filename
        );
        purge_derived(state, id, chunk_count).await?;
        return Ok(());
    }

    tracing::info!("{} ready ({chunk_count} chunks)", doc.filename);
    Ok(())
}

async fn index_vectors(
    state: &AppState,
    llm: &crate::config::LlmConfig,
    id: Uuid,
    previous_chunk_count: usize,
    chunks: &[crate::models::DocumentChunk],
) -> Result<()> {
    state.vectors.delete_document(&id, previous_chunk_count).await?;
    if chunks.is_empty() {
        return Ok(());
    }

    let texts: Vec<String> = chunks
        .iter()
        .map(|c| format!("Document: {}\n{}", c.filename, c.content))
        .collect();
    let vectors = embeddings::embed_batch(&state.http_client, llm, &texts).await?;
    state.vectors.upsert_chunks(chunks, vectors).await?;
    tracing::debug!(
        "Indexed {} vectors for {id} in {} store",
        chunks.len(),
        state.vectors.backend_name()
    );
    Ok(())
}

/// Delete a document and everything derived from it. Returns whether the
/// document existed.
pub async fn remove_document(state: &AppState, id: Uuid) -> Result<bool> {
    let Some(doc) = state.documents.get(id) else {
        return Ok(false);
    };

    purge_derived(state, id, doc.chunk_count).await?;
    if let Err(e) = state.texts.delete(id) {
        tracing::warn!("Failed to delete text for {id}: {e:#}");
    }

    state.documents.delete(id)
}

/// Drop the BM25 chunks, vectors and mind maps built from a document.
async fn purge_derived(state: &AppState, id: Uuid, chunk_count: usize) -> Result<()> {
    let bm25 = state.bm25.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || bm25.delete_document(&id))
        .await
        .context("BM25 task failed")
        .and_then(|r| r)
    {
        tracing::warn!("Failed to delete BM25 data for {id}: {e:#}");
    }
    if let Err(e) = state.vectors.delete_document(&id, chunk_count).await {
        tracing::warn!("Failed to delete vectors for {id}: {e:#}");
    }
    let maps = state.mindmaps.delete_for_document(id)?;
    if maps > 0 {
        tracing::info!("Removed {maps} mind maps built from {id}");
    }
    Ok(())
}
