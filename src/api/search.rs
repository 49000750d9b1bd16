use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::models::{SearchRequest, SearchResponse};
use crate::search::hybrid::rrf_fusion;
use crate::state::AppState;

/// Upper bound on `limit` accepted from clients.
const MAX_LIMIT: usize = 50;

/// POST /api/ai/search - BM25 + vector retrieval fused with RRF
pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Query is required".to_string()));
    }

    let response = run_search(
        &state,
        query,
        req.document_ids.as_deref(),
        req.use_bm25,
        req.use_vector,
        req.limit.clamp(1, MAX_LIMIT),
    )
    .await?;
    Ok(Json(response))
}

/// Shared retrieval used by search, ask and chat.
///
/// Each ranking fetches three times `limit` before fusion. A failed query
/// embedding only disables the vector half.
pub async fn run_search(
    state: &AppState,
    query: &str,
    document_ids: Option<&[Uuid]>,
    use_bm25: bool,
    use_vector: bool,
    limit: usize,
) -> Result<SearchResponse, (StatusCode, String)> {
    let fetch_limit = limit * 3;

    let bm25_hits = if use_bm25 {
        let bm25 = state.bm25.clone();
        let q = query.to_string();
        let ids = document_ids.map(<[Uuid]>::to_vec);
        tokio::task::spawn_blocking(move || bm25.search(&q, fetch_limit, ids.as_deref()))
            .await
            .map_err(|e| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("BM25 search error: {e}"),
                )
            })?
            .map_err(|e| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("BM25 search error: {e:#}"),
                )
            })?
    } else {
        Vec::new()
    };

    let vector_hits = if use_vector {
        let llm = state.llm();
        match crate::llm::embeddings::embed_single(&state.http_client, &llm, query).await {
            Ok(embedding) => state
                .vectors
                .search(&embedding, fetch_limit, document_ids)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!("Vector search failed: {e:#}");
                    Vec::new()
                }),
            Err(e) => {
                tracing::warn!("Vector search skipped, query embedding failed: {e:#}");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let results = rrf_fusion(&bm25_hits, &vector_hits, limit);
    tracing::debug!(
        "Search {query:?}: {} bm25, {} vector, {} fused",
        bm25_hits.len(),
        vector_hits.len(),
        results.len()
    );

    Ok(SearchResponse {
        query: query.to_string(),
        results,
        total_bm25_hits: bm25_hits.len(),
        total_vector_hits: vector_hits.len(),
    })
}
