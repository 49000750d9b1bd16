//! Document analysis: summary, topics, entities and sentiment with a
//! confidence per field, plus suggested reader questions.

use anyhow::Result;
use serde_json::Value;

use crate::config::LlmConfig;
use crate::llm::client::complete_prompt;
use crate::llm::{
    extract_json_array, extract_json_object, sanitize_for_prompt, truncate_to_char_boundary,
};
use crate::models::{
    clean_list, DocumentAnalysis, Entity, Scored, Sentiment, SentimentLabel, FALLBACK_CONFIDENCE,
    FALLBACK_SUMMARY,
};

/// Text beyond this many bytes is not sent for analysis.
const MAX_ANALYSIS_INPUT: usize = 12_000;
const MAX_TOPICS: usize = 10;
const MAX_ENTITIES: usize = 25;
const MAX_QUESTIONS: usize = 5;
/// Confidence assumed when the model omits one.
const DEFAULT_CONFIDENCE: f32 = 0.5;

const ANALYSIS_SYSTEM: &str = "You analyze documents. Reply with ONLY a JSON object of the form \
{\"summary\": {\"value\": string, \"confidence\": number}, \
\"topics\": {\"value\": [string], \"confidence\": number}, \
\"entities\": {\"value\": [{\"name\": string, \"type\": string}], \"confidence\": number}, \
\"sentiment\": {\"value\": {\"label\": \"positive\"|\"neutral\"|\"negative\"|\"mixed\", \"score\": number}, \"confidence\": number}}. \
Confidence is between 0 and 1 and reflects how certain you are of each field. \
Sentiment score is between -1 and 1. Use at most 10 topics.";

const QUESTIONS_SYSTEM: &str = "You help readers explore documents. Reply with ONLY a JSON array \
of up to 5 short questions a reader could ask about the document.";

/// Ask the model for an analysis. Unparsable replies become the fallback
/// placeholder; transport errors are returned.
pub async fn analyze_document(
    client: &reqwest::Client,
    config: &LlmConfig,
    text: &str,
) -> Result<DocumentAnalysis> {
    let excerpt = sanitize_for_prompt(truncate_to_char_boundary(text, MAX_ANALYSIS_INPUT));
    let reply = complete_prompt(
        client,
        config,
        ANALYSIS_SYSTEM,
        &format!("Document:\n\"\"\"\n{excerpt}\n\"\"\""),
        0.2,
    )
    .await?;
    Ok(parse_analysis(&reply))
}

pub async fn generate_questions(
    client: &reqwest::Client,
    config: &LlmConfig,
    text: &str,
) -> Result<Vec<String>> {
    let excerpt = sanitize_for_prompt(truncate_to_char_boundary(text, MAX_ANALYSIS_INPUT));
    let reply = complete_prompt(
        client,
        config,
        QUESTIONS_SYSTEM,
        &format!("Document:\n\"\"\"\n{excerpt}\n\"\"\""),
        0.4,
    )
    .await?;
    Ok(parse_questions(&reply))
}

pub fn parse_analysis(reply: &str) -> DocumentAnalysis {
    let Some(root) = extract_json_object(reply)
        .and_then(|s| serde_json::from_str::<Value>(s).ok())
        .filter(Value::is_object)
    else {
        tracing::warn!("Analysis reply was not a JSON object, using fallback");
        return DocumentAnalysis::fallback();
    };

    let summary = match field(&root, "summary") {
        (Some(Value::String(s)), c) if !s.trim().is_empty() => Scored::new(s.trim().to_string(), c),
        _ => Scored::new(FALLBACK_SUMMARY.to_string(), FALLBACK_CONFIDENCE),
    };

    let topics = match field(&root, "topics") {
        (Some(Value::Array(items)), c) => {
            let mut topics = clean_list(items.iter().filter_map(as_string).collect());
            topics.truncate(MAX_TOPICS);
            Scored::new(topics, c)
        }
        _ => Scored::new(Vec::new(), FALLBACK_CONFIDENCE),
    };

    let entities = match field(&root, "entities") {
        (Some(Value::Array(items)), c) => Scored::new(parse_entities(items), c),
        _ => Scored::new(Vec::new(), FALLBACK_CONFIDENCE),
    };

    let sentiment = match field(&root, "sentiment") {
        (Some(v), c) => match parse_sentiment(v) {
            Some(s) => Scored::new(s, c),
            None => Scored::new(Sentiment::neutral(), FALLBACK_CONFIDENCE),
        },
        _ => Scored::new(Sentiment::neutral(), FALLBACK_CONFIDENCE),
    };

    DocumentAnalysis {
        summary,
        topics,
        entities,
        sentiment,
    }
}

pub fn parse_questions(reply: &str) -> Vec<String> {
    let Some(json) = extract_json_array(reply) else {
        tracing::warn!("Questions reply had no JSON array");
        return Vec::new();
    };
    match serde_json::from_str::<Vec<Value>>(json) {
        Ok(items) => {
            let mut questions = clean_list(items.iter().filter_map(as_string).collect());
            questions.truncate(MAX_QUESTIONS);
            questions
        }
        Err(e) => {
            tracing::warn!("Failed to parse questions: {e}");
            Vec::new()
        }
    }
}

/// A field is either `{"value": .., "confidence": ..}` or a bare value.
fn field<'a>(root: &'a Value, key: &str) -> (Option<&'a Value>, f32) {
    match root.get(key) {
        Some(Value::Object(obj)) if obj.contains_key("value") => {
            let confidence = obj
                .get("confidence")
                .and_then(Value::as_f64)
                .map(|c| c as f32)
                .unwrap_or(DEFAULT_CONFIDENCE);
            (obj.get("value"), confidence)
        }
        Some(v) => (Some(v), DEFAULT_CONFIDENCE),
        None => (None, DEFAULT_CONFIDENCE),
    }
}

fn as_string(v: &Value) -> Option<String> {
    v.as_str().map(str::to_string)
}

fn parse_entities(items: &[Value]) -> Vec<Entity> {
    let mut seen = std::collections::HashSet::new();
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(Entity {
                name: name.trim().to_string(),
                kind: "other".to_string(),
            }),
            Value::Object(obj) => {
                let name = obj.get("name").and_then(Value::as_str)?.trim().to_string();
                let kind = obj
                    .get("type")
                    .or_else(|| obj.get("kind"))
                    .and_then(Value::as_str)
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .unwrap_or_else(|| "other".to_string());
                Some(Entity { name, kind })
            }
            _ => None,
        })
        .filter(|e| !e.name.is_empty() && seen.insert(e.name.to_lowercase()))
        .take(MAX_ENTITIES)
        .collect()
}

fn parse_sentiment(v: &Value) -> Option<Sentiment> {
    let (label, score) = match v {
        Value::String(label) => (SentimentLabel::parse(label), None),
        Value::Object(obj) => (
            SentimentLabel::parse(obj.get("label").and_then(Value::as_str)?),
            obj.get("score").and_then(Value::as_f64).map(|s| s as f32),
        ),
        _ => return None,
    };
    let score = score.unwrap_or(match label {
        SentimentLabel::Positive => 0.5,
        SentimentLabel::Negative => -0.5,
        SentimentLabel::Neutral | SentimentLabel::Mixed => 0.0,
    });
    let score = if score.is_nan() { 0.0 } else { score.clamp(-1.0, 1.0) };
    Some(Sentiment { label, score })
}
