use std::convert::Infallible;
use std::fmt::Write;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::{self, Stream, StreamExt};
use serde_json::json;

use crate::api::search::run_search;
use crate::llm::chat_stream::{stream_chat, ChatStream};
use crate::llm::client::complete;
use crate::llm::{sanitize_for_prompt, truncate_to_char_boundary};
use crate::models::{AskRequest, AskResponse, ChatMessage, ChatRequest, SearchHit, SourceRef};
use crate::state::AppState;

const MAX_CHAT_MESSAGE_LEN: usize = 2000;
const MAX_HISTORY_TURNS: usize = 10;
const CONTEXT_CHUNKS: usize = 8;
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const ANSWER_TEMPERATURE: f32 = 0.2;

const SYSTEM_PROMPT: &str = "You answer questions about the user's uploaded documents.\n\
Each user message includes excerpts retrieved from those documents.\n\
Answer ONLY from the excerpts. If they do not contain the answer, say so and \
describe what they do cover.\n\
Cite the document name for each claim, e.g. (report.pdf, lines 10-24).";

/// POST /api/ai/ask - grounded single-shot answer with its sources
pub async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, (StatusCode, String)> {
    let question = clean_message(&req.question)
        .ok_or((StatusCode::BAD_REQUEST, "Question is required".to_string()))?;

    let context = run_search(
        &state,
        &question,
        req.document_ids.as_deref(),
        true,
        true,
        CONTEXT_CHUNKS,
    )
    .await?;

    let messages = build_messages(&[], &build_context_block(&context.results), &question);
    let llm = state.llm();
    let answer = complete(&state.http_client, &llm, &messages, ANSWER_TEMPERATURE)
        .await
        .map_err(|e| {
            tracing::error!("Ask failed: {e:#}");
            (StatusCode::BAD_GATEWAY, format!("LLM error: {e}"))
        })?;

    Ok(Json(AskResponse {
        answer: answer.trim().to_string(),
        sources: context.results.iter().map(SourceRef::from).collect(),
    }))
}

/// POST /api/ai/chat - streaming chat over the documents (SSE).
///
/// Events: `context` with the source chunks, `delta` per content fragment,
/// `error` if the model fails or goes idle, and a closing `done`.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let message = clean_message(&req.message)
        .ok_or((StatusCode::BAD_REQUEST, "Message is required".to_string()))?;
    let history = sanitize_history(req.history);

    let permit = state
        .chat_semaphore
        .clone()
        .try_acquire_owned()
        .map_err(|_| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Chat service at capacity".to_string(),
            )
        })?;

    let context = run_search(
        &state,
        &message,
        req.document_ids.as_deref(),
        true,
        true,
        CONTEXT_CHUNKS,
    )
    .await?;

    let messages = build_messages(&history, &build_context_block(&context.results), &message);
    let sources: Vec<SourceRef> = context.results.iter().map(SourceRef::from).collect();
    let context_event = sse_event("context", json!({ "sources": sources }));

    let llm = state.llm();
    let llm_stream = stream_chat(&state.http_client, &llm, messages)
        .await
        .map_err(|e| {
            tracing::error!("Chat stream failed to start: {e:#}");
            (StatusCode::BAD_GATEWAY, format!("LLM error: {e}"))
        })?;

    let events = stream::once(async move { context_event })
        .chain(delta_events(llm_stream))
        .chain(stream::once(async { sse_event("done", json!({})) }))
        .map(move |event| {
            // the permit lives as long as the stream
            let _permit = &permit;
            Ok::<_, Infallible>(event)
        });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Model deltas as `delta` events. The first error or idle timeout becomes
/// an `error` event and ends the stream.
fn delta_events(llm_stream: ChatStream) -> impl Stream<Item = Event> + Send {
    stream::unfold(Some(llm_stream), |llm_stream| async move {
        let mut llm_stream = llm_stream?;
        match tokio::time::timeout(IDLE_TIMEOUT, llm_stream.next()).await {
            Ok(Some(Ok(content))) => Some((
                sse_event("delta", json!({ "content": content })),
                Some(llm_stream),
            )),
            Ok(Some(Err(e))) => {
                tracing::warn!("Chat stream error: {e:#}");
                Some((sse_event("error", json!({ "message": e.to_string() })), None))
            }
            Ok(None) => None,
            Err(_) => Some((
                sse_event("error", json!({ "message": "LLM response timed out (idle)" })),
                None,
            )),
        }
    })
}

fn sse_event(name: &'static str, data: serde_json::Value) -> Event {
    Event::default()
        .event(name)
        .json_data(&data)
        .unwrap_or_else(|_| Event::default().event(name).data("{}"))
}

/// Trimmed, capped and sanitized user text; `None` when blank.
fn clean_message(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(sanitize_for_prompt(truncate_to_char_boundary(
        text,
        MAX_CHAT_MESSAGE_LEN,
    )))
}

/// Keep user/assistant turns only, sanitized, most recent `MAX_HISTORY_TURNS`.
fn sanitize_history(history: Option<Vec<ChatMessage>>) -> Vec<ChatMessage> {
    let turns: Vec<ChatMessage> = history
        .unwrap_or_default()
        .into_iter()
        .filter(|m| m.role == "user" || m.role == "assistant")
        .map(|m| {
            let content =
                sanitize_for_prompt(truncate_to_char_boundary(&m.content, MAX_CHAT_MESSAGE_LEN));
            ChatMessage::new(&m.role, content)
        })
        .collect();
    let skip = turns.len().saturating_sub(MAX_HISTORY_TURNS);
    turns.into_iter().skip(skip).collect()
}

fn build_context_block(hits: &[SearchHit]) -> String {
    let mut ctx = String::from("Excerpts from the user's documents:\n\n");

    if hits.is_empty() {
        ctx.push_str("(No relevant excerpts were found for this question.)\n");
        return ctx;
    }

    for hit in hits {
        let _ = write!(
            ctx,
            "--- {} (lines {}-{}) ---\n{}\n\n",
            hit.filename,
            hit.start_line,
            hit.end_line,
            sanitize_for_prompt(&hit.content)
        );
    }
    ctx
}

fn build_messages(history: &[ChatMessage], context_block: &str, message: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::new("system", SYSTEM_PROMPT));
    messages.extend(history.iter().cloned());
    // context rides in the final user turn
    messages.push(ChatMessage::new(
        "user",
        format!("{context_block}---\nQuestion: {message}"),
    ));
    messages
}
