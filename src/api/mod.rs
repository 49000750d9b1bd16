//! HTTP surface. Handlers return `(StatusCode, String)` errors.

pub mod chat;
pub mod documents;
pub mod mindmaps;
pub mod search;
pub mod system;
pub mod upload;
pub mod validation;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

/// Headroom above the upload cap for multipart framing.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes() + MULTIPART_OVERHEAD;

    Router::new()
        .route("/api/health", get(system::health))
        .route("/api/config", get(system::get_config).put(system::update_config))
        // Ingestion
        .route("/api/upload", post(upload::upload_file))
        .route("/api/upload/url", post(upload::upload_url))
        // Documents
        .route("/api/documents", get(documents::list_documents))
        .route(
            "/api/documents/{id}",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/api/documents/{id}/text", get(documents::get_document_text))
        .route(
            "/api/documents/{id}/reanalyze",
            post(documents::reanalyze_document),
        )
        // Retrieval
        .route("/api/ai/ask", post(chat::ask))
        .route("/api/ai/chat", post(chat::chat))
        .route("/api/ai/search", post(search::search))
        // Review
        .route("/api/validation/queue", get(validation::review_queue))
        .route("/api/validation/stats", get(validation::review_stats))
        .route("/api/validation/{id}", put(validation::update_analysis))
        .route("/api/validation/{id}/approve", post(validation::approve))
        // Mind maps
        .route(
            "/api/mindmaps",
            get(mindmaps::list_mindmaps).post(mindmaps::create_mindmap),
        )
        .route(
            "/api/mindmaps/{id}",
            get(mindmaps::get_mindmap).delete(mindmaps::delete_mindmap),
        )
        .route("/api/mindmaps/{id}/mermaid", get(mindmaps::mindmap_mermaid))
        .route("/api/mindmaps/{id}/cytoscape", get(mindmaps::mindmap_cytoscape))
        .route("/api/mindmaps/{id}/path", post(mindmaps::mindmap_path))
        .route("/api/graph/path", post(mindmaps::graph_path))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
