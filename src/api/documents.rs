use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::ingest;
use crate::models::{Document, DocumentStatus};
use crate::state::AppState;

/// GET /api/documents - all documents, newest first
pub async fn list_documents(State(state): State<AppState>) -> Json<Vec<Document>> {
    Json(state.documents.list())
}

/// GET /api/documents/{id}
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, (StatusCode, String)> {
    state
        .documents
        .get(id)
        .map(Json)
        .ok_or_else(not_found)
}

/// DELETE /api/documents/{id} - remove the record, its text, index data
/// and any mind maps built from it
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    match ingest::remove_document(&state, id).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(not_found()),
        Err(e) => {
            tracing::error!("Failed to delete document {id}: {e:#}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")))
        }
    }
}

/// GET /api/documents/{id}/text - extracted plain text
pub async fn get_document_text(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<String, (StatusCode, String)> {
    if !state.documents.exists(id) {
        return Err(not_found());
    }
    state.texts.load(id).map_err(|e| {
        tracing::warn!("{e:#}");
        (StatusCode::NOT_FOUND, "Extracted text not found".to_string())
    })
}

/// POST /api/documents/{id}/reanalyze - re-run analysis and indexing in the
/// background
pub async fn reanalyze_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Document>), (StatusCode, String)> {
    let doc = state.documents.get(id).ok_or_else(not_found)?;
    if doc.status == DocumentStatus::Processing {
        return Err((
            StatusCode::CONFLICT,
            "Document is already being processed".to_string(),
        ));
    }

    let doc = state
        .documents
        .set_status(id, DocumentStatus::Processing)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")))?
        .ok_or_else(not_found)?;

    ingest::spawn_processing(state.clone(), id);
    Ok((StatusCode::ACCEPTED, Json(doc)))
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Document not found".to_string())
}
