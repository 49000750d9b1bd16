use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::config::LlmConfig;
use crate::models::LlmConfigUpdate;
use crate::state::AppState;

const PROVIDERS: [&str; 2] = ["ollama", "openai"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub documents: usize,
    pub vector_backend: &'static str,
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        documents: state.documents.len(),
        vector_backend: state.vectors.backend_name(),
    })
}

/// LLM settings as returned to clients. The key itself never leaves the server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfigResponse {
    pub provider: String,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub has_api_key: bool,
}

impl From<&LlmConfig> for LlmConfigResponse {
    fn from(config: &LlmConfig) -> Self {
        Self {
            provider: config.provider.clone(),
            base_url: config.base_url.clone(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            embedding_dim: config.embedding_dim,
            has_api_key: config.api_key.as_deref().is_some_and(|k| !k.is_empty()),
        }
    }
}

/// GET /api/config
pub async fn get_config(State(state): State<AppState>) -> Json<LlmConfigResponse> {
    Json(LlmConfigResponse::from(&*state.llm_config.read()))
}

/// PUT /api/config - partial update. An empty `apiKey` clears the key.
pub async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<LlmConfigUpdate>,
) -> Result<Json<LlmConfigResponse>, (StatusCode, String)> {
    if let Some(provider) = &update.provider {
        if !PROVIDERS.contains(&provider.as_str()) {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unknown provider '{provider}', expected one of: ollama, openai"),
            ));
        }
    }
    if update.embedding_dim == Some(0) {
        return Err((
            StatusCode::BAD_REQUEST,
            "embeddingDim must be positive".to_string(),
        ));
    }

    let mut config = state.llm_config.write();
    // base_url stays as configured at startup so the API key cannot be
    // redirected to another host
    if let Some(provider) = update.provider {
        config.provider = provider;
    }
    if let Some(chat_model) = update.chat_model.filter(|m| !m.trim().is_empty()) {
        config.chat_model = chat_model;
    }
    if let Some(embedding_model) = update.embedding_model.filter(|m| !m.trim().is_empty()) {
        config.embedding_model = embedding_model;
    }
    if let Some(api_key) = update.api_key {
        config.api_key = Some(api_key).filter(|k| !k.is_empty());
    }
    if let Some(embedding_dim) = update.embedding_dim {
        config.embedding_dim = embedding_dim;
    }

    tracing::info!(
        "LLM config updated: {} / chat {} / embed {}",
        config.provider,
        config.chat_model,
        config.embedding_model
    );
    Ok(Json(LlmConfigResponse::from(&*config)))
}
