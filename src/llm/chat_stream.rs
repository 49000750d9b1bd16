use anyhow::{Context, Result};
use futures_util::stream::{Stream, StreamExt};
use serde::Deserialize;
use std::pin::Pin;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::llm::client::{chat_url, post, ChatBody};
use crate::models::ChatMessage;

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

const STREAM_TIMEOUT: Duration = Duration::from_secs(300);
const CHAT_TEMPERATURE: f32 = 0.3;

/// Stream a chat completion as content deltas.
///
/// Ollama answers with newline-delimited JSON objects, OpenAI with SSE
/// `data:` lines; both are reduced to the text of each delta.
pub async fn stream_chat(
    client: &reqwest::Client,
    config: &LlmConfig,
    messages: Vec<ChatMessage>,
) -> Result<ChatStream> {
    let url = chat_url(config)?;
    let body = ChatBody::new(config, &messages, true, CHAT_TEMPERATURE);

    let resp = post(client, config, &url)
        .timeout(STREAM_TIMEOUT)
        .json(&body)
        .send()
        .await
        .with_context(|| format!("Failed to connect to {} for chat streaming", config.provider))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("{} chat API returned {status}: {body}", config.provider);
    }

    let parse: fn(&str) -> Option<Result<String>> = if config.provider == "ollama" {
        parse_ndjson_delta
    } else {
        parse_sse_delta
    };

    let stream = stream_lines(resp.bytes_stream()).filter_map(move |line| async move {
        match line {
            Ok(line) => parse(&line),
            Err(e) => Some(Err(e)),
        }
    });

    Ok(Box::pin(stream))
}

#[derive(Deserialize)]
struct NdjsonChunk {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
}

/// One Ollama stream line. `None` means nothing to emit.
fn parse_ndjson_delta(line: &str) -> Option<Result<String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<NdjsonChunk>(line) {
        Ok(chunk) if chunk.done => None,
        Ok(chunk) => chunk
            .message
            .map(|m| m.content)
            .filter(|c| !c.is_empty())
            .map(Ok),
        Err(e) => Some(Err(anyhow::anyhow!("Failed to parse Ollama chunk: {e}"))),
    }
}

#[derive(Deserialize)]
struct SseChunk {
    #[serde(default)]
    choices: Vec<SseChoice>,
}

#[derive(Deserialize)]
struct SseChoice {
    delta: SseDelta,
}

#[derive(Deserialize)]
struct SseDelta {
    content: Option<String>,
}

/// One OpenAI SSE line. Non-data lines, `[DONE]` and role-only deltas yield `None`.
fn parse_sse_delta(line: &str) -> Option<Result<String>> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<SseChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|c| !c.is_empty())
            .map(Ok),
        Err(e) => Some(Err(anyhow::anyhow!("Failed to parse OpenAI chunk: {e}"))),
    }
}

/// Re-split a byte stream on newlines, carrying partial lines between reads.
fn stream_lines(
    byte_stream: impl Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
) -> impl Stream<Item = Result<String>> + Send {
    futures_util::stream::unfold(
        (Box::pin(byte_stream), String::new()),
        |(mut stream, mut buffer)| async move {
            loop {
                if let Some(pos) = buffer.find('\n') {
                    let line: String = buffer.drain(..=pos).collect();
                    if !line.trim().is_empty() {
                        return Some((Ok(line), (stream, buffer)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(bytes)) => buffer.push_str(&String::from_utf8_lossy(&bytes)),
                    Some(Err(e)) => {
                        return Some((
                            Err(anyhow::anyhow!("Stream read error: {e}")),
                            (stream, buffer),
                        ));
                    }
                    None if !buffer.trim().is_empty() => {
                        let rest = std::mem::take(&mut buffer);
                        return Some((Ok(rest), (stream, buffer)));
                    }
                    None => return None,
                }
            }
        },
    )
}
