use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::*;
use tantivy::{doc, Index, IndexWriter, ReloadPolicy};
use uuid::Uuid;

use crate::models::DocumentChunk;

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// BM25 keyword index over document chunks, built on tantivy.
pub struct Bm25Index {
    index: Index,
    /// tantivy allows one writer per index at a time
    write_lock: Mutex<()>,
    f_document_id: Field,
    f_filename: Field,
    f_chunk_index: Field,
    f_content: Field,
    f_start_line: Field,
    f_end_line: Field,
}

#[derive(Debug, Clone)]
pub struct Bm25Hit {
    pub document_id: Uuid,
    pub filename: String,
    pub chunk_index: usize,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub score: f32,
}

impl Bm25Index {
    /// Create or open a BM25 index at the given directory.
    pub fn open_or_create(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;

        let mut schema_builder = Schema::builder();
        let f_document_id = schema_builder.add_text_field("document_id", STRING | STORED);
        let f_filename = schema_builder.add_text_field("filename", TEXT | STORED);
        let f_chunk_index =
            schema_builder.add_u64_field("chunk_index", NumericOptions::default() | STORED);
        let f_content = schema_builder.add_text_field("content", TEXT | STORED);
        let f_start_line =
            schema_builder.add_u64_field("start_line", NumericOptions::default() | STORED);
        let f_end_line =
            schema_builder.add_u64_field("end_line", NumericOptions::default() | STORED);
        let schema = schema_builder.build();

        let index = if index_dir.join("meta.json").exists() {
            Index::open_in_dir(index_dir).context("Failed to open existing tantivy index")?
        } else {
            Index::create_in_dir(index_dir, schema).context("Failed to create tantivy index")?
        };

        Ok(Self {
            index,
            write_lock: Mutex::new(()),
            f_document_id,
            f_filename,
            f_chunk_index,
            f_content,
            f_start_line,
            f_end_line,
        })
    }

    fn writer(&self) -> Result<IndexWriter> {
        self.index
            .writer(WRITER_HEAP_BYTES)
            .context("Failed to create index writer")
    }

    /// Replace all chunks of the documents present in `chunks`.
    pub fn index_chunks(&self, chunks: &[DocumentChunk]) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut writer = self.writer()?;

        let mut cleared: Vec<Uuid> = Vec::new();
        for chunk in chunks {
            if !cleared.contains(&chunk.document_id) {
                writer.delete_term(Term::from_field_text(
                    self.f_document_id,
                    &chunk.document_id.to_string(),
                ));
                cleared.push(chunk.document_id);
            }
            writer.add_document(doc!(
                self.f_document_id => chunk.document_id.to_string(),
                self.f_filename => chunk.filename.clone(),
                self.f_chunk_index => chunk.chunk_index as u64,
                self.f_content => chunk.content.clone(),
                self.f_start_line => chunk.start_line as u64,
                self.f_end_line => chunk.end_line as u64,
            ))?;
        }

        writer.commit().context("Failed to commit index")?;
        Ok(())
    }

    /// Delete all chunks of a document.
    pub fn delete_document(&self, document_id: &Uuid) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut writer = self.writer()?;
        writer.delete_term(Term::from_field_text(
            self.f_document_id,
            &document_id.to_string(),
        ));
        writer.commit().context("Failed to commit delete")?;
        Ok(())
    }

    /// Search the index and return scored hits. Syntax errors in the query
    /// are tolerated (best-effort parse).
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        document_ids: Option<&[Uuid]>,
    ) -> Result<Vec<Bm25Hit>> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("Failed to create reader")?;
        let searcher = reader.searcher();

        let query_parser =
            QueryParser::for_index(&self.index, vec![self.f_content, self.f_filename]);
        let (query, errors) = query_parser.parse_query_lenient(query_str);
        if !errors.is_empty() {
            tracing::debug!("Lenient parse of {query_str:?} ignored {} errors", errors.len());
        }

        let query: Box<dyn Query> = match document_ids {
            Some(ids) => {
                let allowed: Vec<(Occur, Box<dyn Query>)> = ids
                    .iter()
                    .map(|id| {
                        let term = Term::from_field_text(self.f_document_id, &id.to_string());
                        let q: Box<dyn Query> =
                            Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                        (Occur::Should, q)
                    })
                    .collect();
                Box::new(BooleanQuery::new(vec![
                    (Occur::Must, query),
                    (Occur::Must, Box::new(BooleanQuery::new(allowed))),
                ]))
            }
            None => query,
        };

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit.max(1)))
            .context("Search failed")?;

        let mut hits = Vec::new();
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .context("Failed to retrieve document")?;

            let Ok(document_id) = Uuid::parse_str(self.text(&doc, self.f_document_id)) else {
                continue;
            };

            hits.push(Bm25Hit {
                document_id,
                filename: self.text(&doc, self.f_filename).to_string(),
                chunk_index: self.number(&doc, self.f_chunk_index),
                content: self.text(&doc, self.f_content).to_string(),
                start_line: self.number(&doc, self.f_start_line),
                end_line: self.number(&doc, self.f_end_line),
                score,
            });
        }

        Ok(hits)
    }

    fn text<'a>(&self, doc: &'a TantivyDocument, field: Field) -> &'a str {
        doc.get_first(field)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }

    fn number(&self, doc: &TantivyDocument, field: Field) -> usize {
        doc.get_first(field).and_then(|v| v.as_u64()).unwrap_or(0) as usize
    }
}
