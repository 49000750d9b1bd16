//! Human review of low-confidence analysis.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    AnalysisUpdate, Document, DocumentStatus, ReviewQueueItem, ReviewStats,
};
use crate::state::AppState;

/// GET /api/validation/queue - documents needing review, least confident first
pub async fn review_queue(State(state): State<AppState>) -> Json<Vec<ReviewQueueItem>> {
    Json(build_queue(&state.documents.list(), state.config.review_threshold))
}

/// GET /api/validation/stats
pub async fn review_stats(State(state): State<AppState>) -> Json<ReviewStats> {
    Json(build_stats(&state.documents.list(), state.config.review_threshold))
}

/// PUT /api/validation/{id} - apply edits; edited fields become fully
/// confident and the document is marked reviewed
pub async fn update_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<AnalysisUpdate>,
) -> Result<Json<Document>, (StatusCode, String)> {
    ensure_ready(&state, id)?;
    state
        .documents
        .update(id, |doc| update.apply(doc))
        .map_err(storage_error)?
        .map(Json)
        .ok_or_else(not_found)
}

/// POST /api/validation/{id}/approve - mark reviewed without edits
pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, (StatusCode, String)> {
    ensure_ready(&state, id)?;
    state
        .documents
        .update(id, |doc| {
            doc.human_reviewed = true;
            doc.reviewed_at = Some(Utc::now());
        })
        .map_err(storage_error)?
        .map(Json)
        .ok_or_else(not_found)
}

fn ensure_ready(state: &AppState, id: Uuid) -> Result<(), (StatusCode, String)> {
    let doc = state.documents.get(id).ok_or_else(not_found)?;
    if doc.status != DocumentStatus::Ready {
        return Err((
            StatusCode::CONFLICT,
            "Document analysis is not ready for review".to_string(),
        ));
    }
    Ok(())
}

pub fn build_queue(docs: &[Document], threshold: f32) -> Vec<ReviewQueueItem> {
    let mut queue: Vec<ReviewQueueItem> = docs
        .iter()
        .filter(|d| d.needs_review(threshold))
        .map(|d| ReviewQueueItem {
            document_id: d.id,
            filename: d.display_name().to_string(),
            upload_date: d.upload_date,
            min_confidence: d.analysis.min_confidence(),
            low_confidence_fields: d.analysis.low_confidence_fields(threshold),
        })
        .collect();
    queue.sort_by(|a, b| {
        a.min_confidence
            .partial_cmp(&b.min_confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.upload_date.cmp(&b.upload_date))
    });
    queue
}

pub fn build_stats(docs: &[Document], threshold: f32) -> ReviewStats {
    ReviewStats {
        total: docs.len(),
        reviewed: docs.iter().filter(|d| d.human_reviewed).count(),
        pending_review: docs.iter().filter(|d| d.needs_review(threshold)).count(),
        processing: docs
            .iter()
            .filter(|d| d.status == DocumentStatus::Processing)
            .count(),
        failed: docs
            .iter()
            .filter(|d| matches!(d.status, DocumentStatus::Error(_)))
            .count(),
        threshold,
    }
}

fn storage_error(e: anyhow::Error) -> (StatusCode, String) {
    tracing::error!("Failed to save review: {e:#}");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Document not found".to_string())
}
