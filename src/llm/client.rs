//! Non-streaming chat completions shared by analysis, concept extraction and
//! question answering.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::models::ChatMessage;

/// Chat endpoint for the configured provider.
pub(crate) fn chat_url(config: &LlmConfig) -> Result<String> {
    let base = config.base_url.trim_end_matches('/');
    match config.provider.as_str() {
        "ollama" => Ok(format!("{base}/api/chat")),
        "openai" => Ok(format!("{base}/v1/chat/completions")),
        other => anyhow::bail!("Unknown LLM provider: {other}"),
    }
}

/// Request body accepted by both providers. Ollama reads sampling settings
/// from `options`, OpenAI from top-level fields.
#[derive(Serialize)]
pub(crate) struct ChatBody<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
}

#[derive(Serialize)]
pub(crate) struct OllamaOptions {
    pub temperature: f32,
}

impl<'a> ChatBody<'a> {
    pub fn new(
        config: &'a LlmConfig,
        messages: &'a [ChatMessage],
        stream: bool,
        temperature: f32,
    ) -> Self {
        let ollama = config.provider == "ollama";
        Self {
            model: &config.chat_model,
            messages,
            stream,
            temperature: (!ollama).then_some(temperature),
            options: ollama.then_some(OllamaOptions { temperature }),
        }
    }
}

/// POST builder with the bearer header attached when an API key is set.
pub(crate) fn post(
    client: &reqwest::Client,
    config: &LlmConfig,
    url: &str,
) -> reqwest::RequestBuilder {
    let req = client.post(url);
    match config.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => req.header("Authorization", format!("Bearer {key}")),
        None => req,
    }
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Run a chat completion and return the assistant text.
pub async fn complete(
    client: &reqwest::Client,
    config: &LlmConfig,
    messages: &[ChatMessage],
    temperature: f32,
) -> Result<String> {
    let url = chat_url(config)?;
    let body = ChatBody::new(config, messages, false, temperature);

    let resp = post(client, config, &url)
        .json(&body)
        .send()
        .await
        .with_context(|| format!("Failed to call {} chat API", config.provider))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("{} chat API returned {status}: {body}", config.provider);
    }

    if config.provider == "ollama" {
        let body: OllamaChatResponse = resp
            .json()
            .await
            .context("Failed to parse Ollama chat response")?;
        Ok(body.message.content)
    } else {
        let body: OpenAiChatResponse = resp
            .json()
            .await
            .context("Failed to parse OpenAI chat response")?;
        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

/// Single-turn helper: a system instruction plus one user message.
pub async fn complete_prompt(
    client: &reqwest::Client,
    config: &LlmConfig,
    system: &str,
    user: &str,
    temperature: f32,
) -> Result<String> {
    let messages = [
        ChatMessage::new("system", system),
        ChatMessage::new("user", user),
    ];
    complete(client, config, &messages, temperature).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            base_url: "http://localhost:11434/".to_string(),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_chat_url_per_provider() {
        assert_eq!(
            chat_url(&config("ollama")).unwrap(),
            "http://localhost:11434/api/chat"
        );
        assert_eq!(
            chat_url(&config("openai")).unwrap(),
            "http://localhost:11434/v1/chat/completions"
        );
        assert!(chat_url(&config("anthropic-ish")).is_err());
    }

    #[test]
    fn test_body_places_temperature_per_provider() {
        let msgs = [ChatMessage::new("user", "hi")];

        let ollama = config("ollama");
        let v = serde_json::to_value(ChatBody::new(&ollama, &msgs, false, 0.2)).unwrap();
        assert!(v.get("temperature").is_none());
        assert!((v["options"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);

        let openai = config("openai");
        let v = serde_json::to_value(ChatBody::new(&openai, &msgs, true, 0.2)).unwrap();
        assert!(v.get("options").is_none());
        assert_eq!(v["stream"], true);
        assert_eq!(v["messages"][0]["content"], "hi");
    }
}
