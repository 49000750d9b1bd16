//! # docsight
//!
//! A document intelligence service: upload files or URLs, have an LLM
//! summarize and classify them, review low-confidence results, search and
//! chat over the contents, and explore the concepts as a graph.
//!
//! ## Architecture
//!
//! ```text
//!   upload / url ──► content ──► texts store
//!                       │
//!                       ▼
//!        ┌──────── ingest (background) ────────┐
//!        ▼              ▼                      ▼
//!   llm::analysis   llm::concepts          chunking
//!   (+ questions)       │                  ┌───┴────┐
//!        │              ▼                  ▼        ▼
//!        │       mind map store      search::bm25  llm::embeddings
//!        ▼                                          │
//!   document store ◄── validation (human review)    ▼
//!                                          search::VectorIndex
//!                                          (local | pinecone)
//!
//!   query ──► BM25 + vector ──► RRF fusion ──► ask / chat (SSE)
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, storage, LLM and Pinecone
//! - [`models`] - Documents, scored analysis fields, mind maps, request/response types
//! - [`store`] - JSON-file backed document and mind map stores, extracted text files
//! - [`content`] - Text extraction from plain text, HTML and PDF
//! - [`chunking`] - Paragraph chunking with line ranges
//! - [`llm`] - Chat completion, embeddings, streaming, analysis and concept extraction
//! - [`graph`] - Concept graphs: normalization, merging, BFS reasoning chains, rendering
//! - [`search`] - tantivy BM25, local or Pinecone vectors, reciprocal rank fusion
//! - [`ingest`] - Upload/URL ingestion and the background processing pipeline
//! - [`api`] - Axum handlers and the router
//! - [`state`] - Shared application state

pub mod api;
pub mod chunking;
pub mod config;
pub mod content;
pub mod graph;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod search;
pub mod state;
pub mod store;
