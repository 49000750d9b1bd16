use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::llm::client::post;
use crate::llm::truncate_to_char_boundary;

/// Per-input cap. Chunks are at most 1500 non-whitespace characters, so this
/// only bites on unusually dense text.
const MAX_EMBED_CHARS: usize = 6_000;

const OLLAMA_BATCH: usize = 32;
const OPENAI_BATCH: usize = 64;

fn embed_url(config: &LlmConfig) -> Result<String> {
    let base = config.base_url.trim_end_matches('/');
    match config.provider.as_str() {
        "ollama" => Ok(format!("{base}/api/embed")),
        "openai" => Ok(format!("{base}/v1/embeddings")),
        other => anyhow::bail!("Unknown LLM provider: {other}"),
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    /// Ollama only: truncate over-long inputs instead of failing
    #[serde(skip_serializing_if = "Option::is_none")]
    truncate: Option<bool>,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Embed texts in provider-sized batches. The output is parallel with `texts`.
pub async fn embed_batch(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let url = embed_url(config)?;
    let ollama = config.provider == "ollama";
    let batch_size = if ollama { OLLAMA_BATCH } else { OPENAI_BATCH };

    let mut all = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size) {
        let req = EmbedRequest {
            model: &config.embedding_model,
            input: batch
                .iter()
                .map(|t| truncate_to_char_boundary(t, MAX_EMBED_CHARS))
                .collect(),
            truncate: ollama.then_some(true),
        };

        let resp = post(client, config, &url)
            .json(&req)
            .send()
            .await
            .with_context(|| format!("Failed to call {} embed API", config.provider))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{} embed API returned {status}: {body}", config.provider);
        }

        let embeddings = if ollama {
            let body: OllamaEmbedResponse = resp
                .json()
                .await
                .context("Failed to parse Ollama embed response")?;
            body.embeddings
        } else {
            let mut body: OpenAiEmbedResponse = resp
                .json()
                .await
                .context("Failed to parse OpenAI embed response")?;
            body.data.sort_by_key(|d| d.index);
            body.data.into_iter().map(|d| d.embedding).collect()
        };

        if embeddings.len() != batch.len() {
            anyhow::bail!(
                "Embed API returned {} vectors for {} inputs",
                embeddings.len(),
                batch.len()
            );
        }
        all.extend(embeddings);
    }

    tracing::debug!("Embedded {} texts with {}", all.len(), config.embedding_model);
    Ok(all)
}

/// Embed a single text, e.g. a search query.
pub async fn embed_single(
    client: &reqwest::Client,
    config: &LlmConfig,
    text: &str,
) -> Result<Vec<f32>> {
    embed_batch(client, config, &[text.to_string()])
        .await?
        .into_iter()
        .next()
        .context("No embedding returned")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_url() {
        let mut config = LlmConfig::default();
        config.base_url = "https://api.openai.com/".into();
        assert_eq!(embed_url(&config).unwrap(), "https://api.openai.com/v1/embeddings");

        config.provider = "ollama".into();
        config.base_url = "http://localhost:11434".into();
        assert_eq!(embed_url(&config).unwrap(), "http://localhost:11434/api/embed");
    }

    #[test]
    fn test_openai_request_omits_truncate() {
        let req = EmbedRequest {
            model: "text-embedding-3-small",
            input: vec!["a", "b"],
            truncate: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("truncate").is_none());
        assert_eq!(v["input"][1], "b");
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let config = LlmConfig {
            provider: "unknown".into(),
            ..LlmConfig::default()
        };
        let out = embed_batch(&reqwest::Client::new(), &config, &[]).await.unwrap();
        assert!(out.is_empty());
    }
}
