use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::graph::ConceptGraph;

/// Confidence assigned to every field of the placeholder analysis used when
/// the LLM reply cannot be parsed.
pub const FALLBACK_CONFIDENCE: f32 = 0.1;

/// Summary used by the placeholder analysis.
pub const FALLBACK_SUMMARY: &str = "Automatic analysis unavailable.";

/// A stored document and its (LLM-produced, possibly human-corrected) analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub filename: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Size of the original upload in bytes
    pub size: u64,
    pub upload_date: DateTime<Utc>,
    pub source: DocumentSource,
    pub status: DocumentStatus,
    pub analysis: DocumentAnalysis,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub human_reviewed: bool,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub chunk_count: usize,
}

impl Document {
    /// A freshly uploaded document awaiting analysis.
    pub fn new_processing(
        filename: impl Into<String>,
        size: u64,
        source: DocumentSource,
        title: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            title,
            size,
            upload_date: Utc::now(),
            source,
            status: DocumentStatus::Processing,
            analysis: DocumentAnalysis::pending(),
            questions: Vec::new(),
            human_reviewed: false,
            reviewed_at: None,
            chunk_count: 0,
        }
    }

    /// Ready, not yet reviewed, and at least one field below `threshold`.
    pub fn needs_review(&self, threshold: f32) -> bool {
        self.status == DocumentStatus::Ready
            && !self.human_reviewed
            && !self.analysis.low_confidence_fields(threshold).is_empty()
    }

    /// Display name: detected title if any, else the filename.
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.filename)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentSource {
    Upload {
        #[serde(rename = "contentType")]
        content_type: String,
    },
    Url {
        url: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Processing,
    Ready,
    Error(String),
}

/// An LLM-produced value with its confidence in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scored<T> {
    pub value: T,
    pub confidence: f32,
}

impl<T> Scored<T> {
    pub fn new(value: T, confidence: f32) -> Self {
        Self {
            value,
            confidence: clamp_confidence(confidence),
        }
    }

    /// A value entered or confirmed by a person.
    pub fn verified(value: T) -> Self {
        Self {
            value,
            confidence: 1.0,
        }
    }
}

/// Clamp to [0, 1]; NaN becomes 0.
pub fn clamp_confidence(c: f32) -> f32 {
    if c.is_nan() {
        0.0
    } else {
        c.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub summary: Scored<String>,
    pub topics: Scored<Vec<String>>,
    pub entities: Scored<Vec<Entity>>,
    pub sentiment: Scored<Sentiment>,
}

impl DocumentAnalysis {
    /// Empty analysis for documents still being processed.
    pub fn pending() -> Self {
        Self {
            summary: Scored::new(String::new(), 0.0),
            topics: Scored::new(Vec::new(), 0.0),
            entities: Scored::new(Vec::new(), 0.0),
            sentiment: Scored::new(Sentiment::neutral(), 0.0),
        }
    }

    /// Fixed low-confidence placeholder for unparsable LLM output.
    pub fn fallback() -> Self {
        Self {
            summary: Scored::new(FALLBACK_SUMMARY.to_string(), FALLBACK_CONFIDENCE),
            topics: Scored::new(Vec::new(), FALLBACK_CONFIDENCE),
            entities: Scored::new(Vec::new(), FALLBACK_CONFIDENCE),
            sentiment: Scored::new(Sentiment::neutral(), FALLBACK_CONFIDENCE),
        }
    }

    pub fn low_confidence_fields(&self, threshold: f32) -> Vec<AnalysisField> {
        let mut fields = Vec::new();
        if self.summary.confidence < threshold {
            fields.push(AnalysisField::Summary);
        }
        if self.topics.confidence < threshold {
            fields.push(AnalysisField::Topics);
        }
        if self.entities.confidence < threshold {
            fields.push(AnalysisField::Entities);
        }
        if self.sentiment.confidence < threshold {
            fields.push(AnalysisField::Sentiment);
        }
        fields
    }

    pub fn min_confidence(&self) -> f32 {
        self.summary
            .confidence
            .min(self.topics.confidence)
            .min(self.entities.confidence)
            .min(self.sentiment.confidence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisField {
    Summary,
    Topics,
    Entities,
    Sentiment,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default = "default_entity_kind")]
    pub kind: String,
}

fn default_entity_kind() -> String {
    "other".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    /// -1.0 (negative) to 1.0 (positive)
    pub score: f32,
}

impl Sentiment {
    pub fn neutral() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
    Mixed,
}

impl SentimentLabel {
    /// Lenient parse of free-form model output; unknown labels are neutral.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "positive" | "pos" => SentimentLabel::Positive,
            "negative" | "neg" => SentimentLabel::Negative,
            "mixed" => SentimentLabel::Mixed,
            _ => SentimentLabel::Neutral,
        }
    }
}

/// A persisted concept graph for one document or a set of documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindMap {
    pub id: Uuid,
    pub document_ids: Vec<Uuid>,
    pub title: String,
    pub graph: ConceptGraph,
    pub created_at: DateTime<Utc>,
}

/// A single indexed text chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub document_id: Uuid,
    pub filename: String,
    pub chunk_index: usize,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// A fused search result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub document_id: Uuid,
    pub filename: String,
    pub chunk_index: usize,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub bm25_score: f32,
    pub vector_score: f32,
    pub combined_score: f32,
}

/// Search request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_true")]
    pub use_bm25: bool,
    #[serde(default = "default_true")]
    pub use_vector: bool,
    /// Restrict to these documents
    pub document_ids: Option<Vec<Uuid>>,
}

fn default_limit() -> usize {
    10
}

fn default_true() -> bool {
    true
}

/// Search response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub total_bm25_hits: usize,
    pub total_vector_hits: usize,
}

/// Ingest-by-URL request
#[derive(Debug, Clone, Deserialize)]
pub struct UploadUrlRequest {
    pub url: String,
}

/// Question-answering request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub question: String,
    pub document_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Chunk reference returned alongside answers and in the SSE `context` event
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub document_id: Uuid,
    pub filename: String,
    pub chunk_index: usize,
    pub start_line: usize,
    pub end_line: usize,
}

impl From<&SearchHit> for SourceRef {
    fn from(hit: &SearchHit) -> Self {
        Self {
            document_id: hit.document_id,
            filename: hit.filename.clone(),
            chunk_index: hit.chunk_index,
            start_line: hit.start_line,
            end_line: hit.end_line,
        }
    }
}

/// Chat request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub history: Option<Vec<ChatMessage>>,
    pub document_ids: Option<Vec<Uuid>>,
}

/// A single chat turn (system, user or assistant)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Human correction of an analysis. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisUpdate {
    pub summary: Option<String>,
    pub topics: Option<Vec<String>>,
    pub entities: Option<Vec<Entity>>,
    pub sentiment: Option<Sentiment>,
    pub questions: Option<Vec<String>>,
}

impl AnalysisUpdate {
    /// Apply the edits; edited fields become fully confident and the
    /// document is marked reviewed.
    pub fn apply(self, doc: &mut Document) {
        if let Some(summary) = self.summary {
            doc.analysis.summary = Scored::verified(summary.trim().to_string());
        }
        if let Some(topics) = self.topics {
            doc.analysis.topics = Scored::verified(clean_list(topics));
        }
        if let Some(entities) = self.entities {
            doc.analysis.entities = Scored::verified(entities);
        }
        if let Some(mut sentiment) = self.sentiment {
            sentiment.score = sentiment.score.clamp(-1.0, 1.0);
            doc.analysis.sentiment = Scored::verified(sentiment);
        }
        if let Some(questions) = self.questions {
            doc.questions = clean_list(questions);
        }
        doc.human_reviewed = true;
        doc.reviewed_at = Some(Utc::now());
    }
}

/// Trim, drop empties, drop case-insensitive duplicates (first wins).
pub fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .collect()
}

/// A document awaiting review and the fields that triggered it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQueueItem {
    pub document_id: Uuid,
    pub filename: String,
    pub upload_date: DateTime<Utc>,
    pub min_confidence: f32,
    pub low_confidence_fields: Vec<AnalysisField>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total: usize,
    pub reviewed: usize,
    pub pending_review: usize,
    pub processing: usize,
    pub failed: usize,
    pub threshold: f32,
}

/// Build a mind map for one or more documents
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMindMapRequest {
    pub document_ids: Vec<Uuid>,
    pub title: Option<String>,
}

/// Reasoning-chain query against a stored mind map
#[derive(Debug, Clone, Deserialize)]
pub struct PathRequest {
    pub source: String,
    pub target: String,
}

/// Reasoning-chain query against a graph supplied by the caller
#[derive(Debug, Clone, Deserialize)]
pub struct GraphPathRequest {
    pub graph: ConceptGraph,
    pub source: String,
    pub target: String,
}

/// LLM config update request. `base_url` is fixed at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfigUpdate {
    pub provider: Option<String>,
    pub chat_model: Option<String>,
    pub embedding_model: Option<String>,
    pub api_key: Option<String>,
    pub embedding_dim: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_doc(confidence: f32) -> Document {
        let mut doc = Document::new_processing(
            "report.txt",
            42,
            DocumentSource::Upload {
                content_type: "text/plain".into(),
            },
            None,
        );
        doc.status = DocumentStatus::Ready;
        doc.analysis = DocumentAnalysis {
            summary: Scored::new("A report".into(), confidence),
            topics: Scored::new(vec!["finance".into()], 0.9),
            entities: Scored::new(vec![], 0.9),
            sentiment: Scored::new(Sentiment::neutral(), 0.9),
        };
        doc
    }

    #[test]
    fn test_document_serializes_camel_case() {
        let doc = ready_doc(0.9);
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("uploadDate").is_some());
        assert!(json.get("humanReviewed").is_some());
        assert_eq!(json["status"], "ready");
        assert_eq!(json["source"]["kind"], "upload");
        assert_eq!(json["source"]["contentType"], "text/plain");
        assert_eq!(json["analysis"]["summary"]["value"], "A report");
    }

    #[test]
    fn test_error_status_serializes_as_object() {
        let json = serde_json::to_value(DocumentStatus::Error("boom".into())).unwrap();
        assert_eq!(json["error"], "boom");
    }

    #[test]
    fn test_scored_clamps_confidence() {
        assert_eq!(Scored::new((), 1.7).confidence, 1.0);
        assert_eq!(Scored::new((), -0.2).confidence, 0.0);
        assert_eq!(Scored::new((), f32::NAN).confidence, 0.0);
    }

    #[test]
    fn test_needs_review_low_confidence() {
        assert!(ready_doc(0.3).needs_review(0.7));
        assert!(!ready_doc(0.95).needs_review(0.7));
    }

    #[test]
    fn test_needs_review_skips_reviewed_and_processing() {
        let mut reviewed = ready_doc(0.3);
        reviewed.human_reviewed = true;
        assert!(!reviewed.needs_review(0.7));

        let mut processing = ready_doc(0.3);
        processing.status = DocumentStatus::Processing;
        assert!(!processing.needs_review(0.7));
    }

    #[test]
    fn test_fallback_flags_every_field() {
        let fields = DocumentAnalysis::fallback().low_confidence_fields(0.7);
        assert_eq!(
            fields,
            vec![
                AnalysisField::Summary,
                AnalysisField::Topics,
                AnalysisField::Entities,
                AnalysisField::Sentiment
            ]
        );
    }

    #[test]
    fn test_analysis_update_marks_reviewed_and_verifies_fields() {
        let mut doc = ready_doc(0.3);
        AnalysisUpdate {
            summary: Some("  Corrected summary ".into()),
            topics: Some(vec!["Tax".into(), "tax".into(), " ".into(), "Audit".into()]),
            ..Default::default()
        }
        .apply(&mut doc);

        assert!(doc.human_reviewed);
        assert!(doc.reviewed_at.is_some());
        assert_eq!(doc.analysis.summary.value, "Corrected summary");
        assert_eq!(doc.analysis.summary.confidence, 1.0);
        assert_eq!(doc.analysis.topics.value, vec!["Tax", "Audit"]);
        // Untouched field keeps its model confidence
        assert!((doc.analysis.entities.confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_sentiment_label_parse() {
        assert_eq!(SentimentLabel::parse("Positive"), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::parse(" NEG "), SentimentLabel::Negative);
        assert_eq!(SentimentLabel::parse("mixed"), SentimentLabel::Mixed);
        assert_eq!(SentimentLabel::parse("ambivalent"), SentimentLabel::Neutral);
    }
}
