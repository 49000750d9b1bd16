use std::collections::HashSet;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use crate::graph::render::{to_cytoscape, to_mermaid};
use crate::graph::{find_reasoning_chain, merge_graphs, ConceptGraph, ReasoningChain};
use crate::llm::concepts::extract_concept_graph;
use crate::models::{CreateMindMapRequest, GraphPathRequest, MindMap, PathRequest};
use crate::state::AppState;

/// GET /api/mindmaps - newest first
pub async fn list_mindmaps(State(state): State<AppState>) -> Json<Vec<MindMap>> {
    Json(state.mindmaps.list())
}

/// GET /api/mindmaps/{id}
pub async fn get_mindmap(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MindMap>, (StatusCode, String)> {
    state.mindmaps.get(id).map(Json).ok_or_else(not_found)
}

/// DELETE /api/mindmaps/{id}
pub async fn delete_mindmap(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.mindmaps.delete(id) {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(not_found()),
        Err(e) => {
            tracing::error!("Failed to delete mind map {id}: {e:#}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")))
        }
    }
}

/// GET /api/mindmaps/{id}/mermaid - `flowchart LR` source as text
pub async fn mindmap_mermaid(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let map = state.mindmaps.get(id).ok_or_else(not_found)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        to_mermaid(&map.graph),
    ))
}

/// GET /api/mindmaps/{id}/cytoscape
pub async fn mindmap_cytoscape(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let map = state.mindmaps.get(id).ok_or_else(not_found)?;
    Ok(Json(to_cytoscape(&map.graph)))
}

/// POST /api/mindmaps - merge the concept graphs of one or more documents.
///
/// A document's stored map is reused when present; otherwise its concepts
/// are extracted from the saved text.
pub async fn create_mindmap(
    State(state): State<AppState>,
    Json(req): Json<CreateMindMapRequest>,
) -> Result<(StatusCode, Json<MindMap>), (StatusCode, String)> {
    let mut seen = HashSet::new();
    let document_ids: Vec<Uuid> = req
        .document_ids
        .into_iter()
        .filter(|id| seen.insert(*id))
        .collect();
    if document_ids.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "At least one document id is required".to_string(),
        ));
    }

    let mut names = Vec::with_capacity(document_ids.len());
    let mut graphs = Vec::with_capacity(document_ids.len());
    for &id in &document_ids {
        let doc = state.documents.get(id).ok_or_else(|| {
            (StatusCode::NOT_FOUND, format!("Document {id} not found"))
        })?;
        names.push(doc.display_name().to_string());
        graphs.push(document_graph(&state, id).await?);
    }

    let graph = merge_graphs(&graphs);
    let title = req
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| names.join(" + "));

    let map = MindMap {
        id: Uuid::new_v4(),
        document_ids,
        title,
        graph,
        created_at: Utc::now(),
    };
    state.mindmaps.insert(map.clone()).map_err(|e| {
        tracing::error!("Failed to save mind map: {e:#}");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
    })?;

    tracing::info!(
        "Mind map {} built: {} concepts, {} relationships",
        map.id,
        map.graph.nodes.len(),
        map.graph.edges.len()
    );
    Ok((StatusCode::CREATED, Json(map)))
}

async fn document_graph(state: &AppState, id: Uuid) -> Result<ConceptGraph, (StatusCode, String)> {
    if let Some(existing) = state.mindmaps.latest_for_document(id) {
        return Ok(existing.graph);
    }

    let text = state.texts.load(id).map_err(|e| {
        tracing::warn!("{e:#}");
        (
            StatusCode::CONFLICT,
            format!("Document {id} has no extracted text yet"),
        )
    })?;
    let llm = state.llm();
    let mut graph = extract_concept_graph(&state.http_client, &llm, &text)
        .await
        .map_err(|e| {
            tracing::error!("Concept extraction for {id} failed: {e:#}");
            (StatusCode::BAD_GATEWAY, format!("LLM error: {e}"))
        })?;
    graph.tag_document(id);
    Ok(graph)
}

/// POST /api/mindmaps/{id}/path - reasoning chain between two concepts
pub async fn mindmap_path(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PathRequest>,
) -> Result<Json<ReasoningChain>, (StatusCode, String)> {
    let map = state.mindmaps.get(id).ok_or_else(not_found)?;
    Ok(Json(find_reasoning_chain(&map.graph, &req.source, &req.target)))
}

/// POST /api/graph/path - reasoning chain over a caller-supplied graph
pub async fn graph_path(Json(req): Json<GraphPathRequest>) -> Json<ReasoningChain> {
    Json(find_reasoning_chain(&req.graph, &req.source, &req.target))
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Mind map not found".to_string())
}
