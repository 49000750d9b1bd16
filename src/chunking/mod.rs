//! Splits extracted document text into indexable chunks.

pub mod paragraph;

use uuid::Uuid;

use crate::models::DocumentChunk;

/// Output of the chunking process.
#[derive(Debug, Clone)]
pub struct ChunkOutput {
    pub content: String,
    /// 1-based start line in the original text.
    pub start_line: usize,
    /// 1-based end line in the original text.
    pub end_line: usize,
}

/// Chunk a document's text and attach document identity to each chunk.
pub fn chunk_document(document_id: Uuid, filename: &str, text: &str) -> Vec<DocumentChunk> {
    paragraph::chunk_paragraphs(text)
        .into_iter()
        .enumerate()
        .map(|(i, c)| DocumentChunk {
            document_id,
            filename: filename.to_string(),
            chunk_index: i,
            content: c.content,
            start_line: c.start_line,
            end_line: c.end_line,
        })
        .collect()
}
