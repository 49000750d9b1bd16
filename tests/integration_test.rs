//! Integration tests for storage, graph reasoning, retrieval, the ingestion
//! pipeline and the HTTP routes. LLM calls go to a local stand-in server;
//! nothing here talks to Pinecone.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use docsight::api;
use docsight::config::Config;
use docsight::graph::{find_reasoning_chain, merge_graphs, ConceptEdge, ConceptGraph, ConceptNode};
use docsight::ingest;
use docsight::models::{
    Document, DocumentAnalysis, DocumentChunk, DocumentSource, DocumentStatus, MindMap, Scored,
    Sentiment,
};
use docsight::search::bm25::Bm25Index;
use docsight::search::hybrid::rrf_fusion;
use docsight::search::vector::VectorStore;
use docsight::state::AppState;
use docsight::store::DocumentStore;

fn text_document(name: &str) -> Document {
    Document::new_processing(
        name,
        128,
        DocumentSource::Upload {
            content_type: "text/plain".into(),
        },
        None,
    )
}

fn ready_document(name: &str, summary_confidence: f32) -> Document {
    let mut doc = text_document(name);
    doc.status = DocumentStatus::Ready;
    doc.analysis = DocumentAnalysis {
        summary: Scored::new("Quarterly results".to_string(), summary_confidence),
        topics: Scored::new(vec!["finance".to_string()], 0.9),
        entities: Scored::new(vec![], 0.9),
        sentiment: Scored::new(Sentiment::neutral(), 0.9),
    };
    doc
}

/// A - B - C where the B/C edge is stored pointing C -> B.
fn abc_graph() -> ConceptGraph {
    ConceptGraph {
        nodes: vec![
            ConceptNode::new("a", "Interest rates"),
            ConceptNode::new("b", "Borrowing costs"),
            ConceptNode::new("c", "Housing demand"),
            ConceptNode::new("d", "Weather"),
        ],
        edges: vec![
            ConceptEdge::new("a", "b", "raise"),
            ConceptEdge::new("c", "b", "depends on"),
        ],
    }
}

fn chunk(document_id: Uuid, filename: &str, index: usize, content: &str) -> DocumentChunk {
    DocumentChunk {
        document_id,
        filename: filename.to_string(),
        chunk_index: index,
        content: content.to_string(),
        start_line: index * 10 + 1,
        end_line: index * 10 + 9,
    }
}

#[test]
fn test_document_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("documents.json");
    let doc = ready_document("report.txt", 0.8);

    {
        let store = DocumentStore::open(&path).unwrap();
        store.insert(doc.clone()).unwrap();
    }

    let reopened = DocumentStore::open(&path).unwrap();
    assert_eq!(reopened.get(doc.id), Some(doc));
}

#[test]
fn test_deleted_document_leaves_listing() {
    let dir = tempfile::tempdir().unwrap();
    let store = DocumentStore::open(&dir.path().join("documents.json")).unwrap();
    let keep = text_document("keep.txt");
    let gone = text_document("gone.txt");
    store.insert(keep.clone()).unwrap();
    store.insert(gone.clone()).unwrap();

    assert!(store.delete(gone.id).unwrap());
    assert!(!store.delete(gone.id).unwrap());

    let ids: Vec<Uuid> = store.list().iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![keep.id]);
}

#[test]
fn test_reasoning_chain_over_abc() {
    let graph = abc_graph();

    let chain = find_reasoning_chain(&graph, "a", "c");
    assert!(chain.found);
    assert_eq!(chain.path, vec!["a", "b", "c"]);
    assert_eq!(chain.steps[0].relationship, "raise");
    assert!(!chain.steps[0].reversed);
    assert_eq!(chain.steps[1].relationship, "depends on");
    assert!(chain.steps[1].reversed);

    let same = find_reasoning_chain(&graph, "b", "b");
    assert!(same.found);
    assert_eq!(same.path, vec!["b"]);

    let disconnected = find_reasoning_chain(&graph, "a", "d");
    assert!(!disconnected.found);
    assert!(disconnected.path.is_empty());

    let missing = find_reasoning_chain(&graph, "a", "zzz");
    assert!(!missing.found);
}

#[test]
fn test_merge_unions_shared_concepts() {
    let doc_a = Uuid::new_v4();
    let doc_b = Uuid::new_v4();

    let mut first = ConceptGraph {
        nodes: vec![
            ConceptNode::new("n1", "Machine Learning"),
            ConceptNode::new("n2", "Neural Networks"),
        ],
        edges: vec![ConceptEdge::new("n1", "n2", "includes")],
    };
    first.tag_document(doc_a);

    let mut second = ConceptGraph {
        nodes: vec![
            ConceptNode::new("n1", "machine  learning"),
            ConceptNode::new("n2", "Data Quality"),
        ],
        edges: vec![ConceptEdge::new("n2", "n1", "limits")],
    };
    second.tag_document(doc_b);

    let merged = merge_graphs(&[first, second]);
    assert_eq!(merged.nodes.len(), 3);
    assert_eq!(merged.edges.len(), 2);

    let ml = merged
        .nodes
        .iter()
        .find(|n| n.label == "Machine Learning")
        .unwrap();
    assert!(ml.documents.contains(&doc_a));
    assert!(ml.documents.contains(&doc_b));

    // Node ids are unique and every edge resolves
    for edge in &merged.edges {
        assert!(merged.contains_node(&edge.source));
        assert!(merged.contains_node(&edge.target));
    }
}

#[test]
fn test_bm25_and_vector_fusion() {
    let dir = tempfile::tempdir().unwrap();
    let bm25 = Bm25Index::open_or_create(&dir.path().join("index")).unwrap();
    let vectors = VectorStore::open_or_create(&dir.path().join("vectors")).unwrap();

    let biology = Uuid::new_v4();
    let finance = Uuid::new_v4();
    let chunks = vec![
        chunk(biology, "plants.md", 0, "Photosynthesis converts light into chemical energy."),
        chunk(biology, "plants.md", 1, "Roots absorb water and minerals from soil."),
        chunk(finance, "q3.txt", 0, "Revenue grew while operating costs fell."),
    ];
    bm25.index_chunks(&chunks).unwrap();
    vectors
        .add_chunks(
            &chunks,
            vec![vec![0.9, 0.1, 0.0], vec![0.6, 0.4, 0.0], vec![0.0, 0.1, 0.9]],
        )
        .unwrap();

    let bm25_hits = bm25.search("photosynthesis light", 10, None).unwrap();
    let vector_hits = vectors.search(&[1.0, 0.0, 0.0], 10, None);
    let fused = rrf_fusion(&bm25_hits, &vector_hits, 5);

    assert!(!fused.is_empty());
    assert_eq!(fused[0].document_id, biology);
    assert_eq!(fused[0].chunk_index, 0);
    assert!(fused[0].bm25_score > 0.0);
    assert!(fused[0].vector_score > 0.0);

    // Restricting to one document never leaks the other
    let only_finance = bm25.search("revenue photosynthesis", 10, Some(&[finance][..])).unwrap();
    assert!(only_finance.iter().all(|h| h.document_id == finance));
}

// ---------------------------------------------------------------------------
// HTTP routes
// ---------------------------------------------------------------------------

fn test_app() -> (tempfile::TempDir, AppState, Router) {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(Config::for_data_dir(dir.path())).unwrap();
    let app = api::router(state.clone());
    (dir, state, app)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

fn as_json(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

#[tokio::test]
async fn test_health_reports_local_backend() {
    let (_dir, _state, app) = test_app();
    let (status, body) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let body = as_json(&body);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["documents"], 0);
    assert_eq!(body["vectorBackend"], "local");
}

#[tokio::test]
async fn test_documents_list_get_text_and_delete() {
    let (_dir, state, app) = test_app();
    let (status, body) = send(&app, Method::GET, "/api/documents", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body), json!([]));

    let doc = ready_document("notes.txt", 0.9);
    state.documents.insert(doc.clone()).unwrap();
    state.texts.save(doc.id, "Line one\nLine two").unwrap();

    let (status, body) = send(&app, Method::GET, &format!("/api/documents/{}", doc.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body)["filename"], "notes.txt");

    let (status, body) =
        send(&app, Method::GET, &format!("/api/documents/{}/text", doc.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"Line one\nLine two");

    let (status, _) = send(&app, Method::DELETE, &format!("/api/documents/{}", doc.id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &format!("/api/documents/{}", doc.id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, &format!("/api/documents/{}", doc.id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_graph_path_route() {
    let (_dir, _state, app) = test_app();
    let body = json!({ "graph": abc_graph(), "source": "a", "target": "c" });
    let (status, body) = send(&app, Method::POST, "/api/graph/path", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    let body = as_json(&body);
    assert_eq!(body["found"], true);
    assert_eq!(body["path"], json!(["a", "b", "c"]));

    let body = json!({ "graph": abc_graph(), "source": "a", "target": "d" });
    let (_, body) = send(&app, Method::POST, "/api/graph/path", Some(body)).await;
    assert_eq!(as_json(&body)["found"], false);
}

#[tokio::test]
async fn test_validation_flow() {
    let (_dir, state, app) = test_app();

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/validation/{}", Uuid::new_v4()),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let processing = text_document("pending.txt");
    let uncertain = ready_document("uncertain.txt", 0.2);
    state.documents.insert(processing.clone()).unwrap();
    state.documents.insert(uncertain.clone()).unwrap();

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/validation/{}/approve", processing.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, Method::GET, "/api/validation/queue", None).await;
    assert_eq!(status, StatusCode::OK);
    let queue = as_json(&body);
    assert_eq!(queue.as_array().unwrap().len(), 1);
    assert_eq!(queue[0]["documentId"], uncertain.id.to_string());
    assert_eq!(queue[0]["lowConfidenceFields"], json!(["summary"]));

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/validation/{}", uncertain.id),
        Some(json!({ "summary": "Q3 revenue up 12%" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let updated = as_json(&body);
    assert_eq!(updated["humanReviewed"], true);
    assert_eq!(updated["analysis"]["summary"]["value"], "Q3 revenue up 12%");
    assert_eq!(updated["analysis"]["summary"]["confidence"], 1.0);

    let (_, body) = send(&app, Method::GET, "/api/validation/stats", None).await;
    let stats = as_json(&body);
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["reviewed"], 1);
    assert_eq!(stats["pendingReview"], 0);
    assert_eq!(stats["processing"], 1);
}

#[tokio::test]
async fn test_mindmap_routes() {
    let (_dir, state, app) = test_app();

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/mindmaps/{}/mermaid", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let doc = ready_document("rates.txt", 0.9);
    state.documents.insert(doc.clone()).unwrap();
    let mut graph = abc_graph();
    graph.tag_document(doc.id);
    let stored = MindMap {
        id: Uuid::new_v4(),
        document_ids: vec![doc.id],
        title: "rates.txt".into(),
        graph,
        created_at: Utc::now(),
    };
    state.mindmaps.insert(stored.clone()).unwrap();

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/mindmaps/{}/mermaid", stored.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let mermaid = String::from_utf8(body).unwrap();
    assert!(mermaid.starts_with("flowchart LR"));
    assert!(mermaid.contains("Interest rates"));

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/mindmaps/{}/cytoscape", stored.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let elements = as_json(&body);
    assert_eq!(elements["elements"]["nodes"].as_array().unwrap().len(), 4);
    assert_eq!(elements["elements"]["edges"].as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/mindmaps/{}/path", stored.id),
        Some(json!({ "source": "c", "target": "a" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body)["path"], json!(["c", "b", "a"]));

    // Building from a document with a stored map reuses it
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/mindmaps",
        Some(json!({ "documentIds": [doc.id], "title": "Rates overview" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let created = as_json(&body);
    assert_eq!(created["title"], "Rates overview");
    assert_eq!(created["graph"]["nodes"].as_array().unwrap().len(), 4);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/mindmaps",
        Some(json!({ "documentIds": [Uuid::new_v4()] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/mindmaps",
        Some(json!({ "documentIds": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/mindmaps/{}", stored.id);
    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&app, Method::GET, "/api/mindmaps", None).await;
    assert_eq!(as_json(&body).as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_request_validation() {
    let (_dir, _state, app) = test_app();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/upload/url",
        Some(json!({ "url": "ftp://example.com/report.pdf" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/ai/search",
        Some(json!({ "query": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/ai/ask",
        Some(json!({ "question": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_config_redacts_api_key() {
    let (_dir, _state, app) = test_app();

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/config",
        Some(json!({ "apiKey": "sk-secret", "chatModel": "gpt-4o" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let raw = String::from_utf8(body).unwrap();
    assert!(!raw.contains("sk-secret"));

    let (_, body) = send(&app, Method::GET, "/api/config", None).await;
    let config = as_json(&body);
    assert_eq!(config["hasApiKey"], true);
    assert_eq!(config["chatModel"], "gpt-4o");
    assert!(config.get("apiKey").is_none());

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/config",
        Some(json!({ "provider": "mystery" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// Ingestion pipeline against a stand-in LLM server

const GLACIER_TEXT: &str = "Glacier retreat in the Alps.\n\n\
The glacier lost a third of its mass since 1990, and meltwater now feeds \
the valley reservoirs earlier in the year.";

const GLACIER_GRAPH: &str = r#"{"nodes": [{"id": "glacier", "label": "Glacier"},
    {"id": "meltwater", "label": "Meltwater"}],
    "edges": [{"source": "glacier", "target": "meltwater", "relationship": "releases"}]}"#;

/// Serve OpenAI-style chat and embedding endpoints on a random local port.
/// Chat answers with `chat_reply` (or HTTP 500 when `None`) after
/// `chat_delay`; embeddings always fail after `embed_delay`.
async fn stand_in_llm(
    chat_delay: Duration,
    chat_reply: Option<&'static str>,
    embed_delay: Duration,
) -> String {
    let chat = move || async move {
        tokio::time::sleep(chat_delay).await;
        match chat_reply {
            Some(content) => Json(json!({
                "choices": [{"message": {"role": "assistant", "content": content}}]
            }))
            .into_response(),
            None => llm_unavailable(),
        }
    };
    let embed = move || async move {
        tokio::time::sleep(embed_delay).await;
        llm_unavailable()
    };
    let app = Router::new()
        .route("/v1/chat/completions", post(chat))
        .route("/v1/embeddings", post(embed));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn llm_unavailable() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "model unavailable").into_response()
}

fn state_with_llm(dir: &tempfile::TempDir, base_url: String) -> AppState {
    let mut config = Config::for_data_dir(dir.path());
    config.llm.provider = "openai".into();
    config.llm.base_url = base_url;
    AppState::new(config).unwrap()
}

fn stored_processing_document(state: &AppState) -> Uuid {
    let doc = Document::new_processing(
        "glacier.txt",
        GLACIER_TEXT.len() as u64,
        DocumentSource::Upload {
            content_type: "text/plain".into(),
        },
        None,
    );
    let id = doc.id;
    state.texts.save(id, GLACIER_TEXT).unwrap();
    state.documents.insert(doc).unwrap();
    id
}

#[tokio::test]
async fn test_llm_outage_leaves_document_ready_for_review() {
    let dir = tempfile::tempdir().unwrap();
    let base_url = stand_in_llm(Duration::ZERO, None, Duration::ZERO).await;
    let state = state_with_llm(&dir, base_url);
    let id = stored_processing_document(&state);

    ingest::process_document(&state, id).await.unwrap();

    let doc = state.documents.get(id).unwrap();
    assert_eq!(doc.status, DocumentStatus::Ready);
    assert!(doc.chunk_count > 0);
    assert_eq!(doc.analysis, DocumentAnalysis::fallback());
    assert!(doc.questions.is_empty());
    assert!(state.mindmaps.list().is_empty());

    let hits = state.bm25.search("glacier", 10, Some(&[id][..])).unwrap();
    assert!(!hits.is_empty());

    let app = api::router(state.clone());
    let (status, body) = send(&app, Method::GET, "/api/validation/queue", None).await;
    assert_eq!(status, StatusCode::OK);
    let queue = as_json(&body);
    assert_eq!(queue.as_array().unwrap().len(), 1);
    assert_eq!(queue[0]["documentId"], json!(id.to_string()));

    let (_, body) = send(&app, Method::GET, &format!("/api/documents/{id}"), None).await;
    assert_eq!(as_json(&body)["chunkCount"], json!(doc.chunk_count));
}

#[tokio::test]
async fn test_delete_during_analysis_indexes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let base_url = stand_in_llm(Duration::from_millis(800), None, Duration::ZERO).await;
    let state = state_with_llm(&dir, base_url);
    let id = stored_processing_document(&state);

    let processing = {
        let state = state.clone();
        tokio::spawn(async move { ingest::process_document(&state, id).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(ingest::remove_document(&state, id).await.unwrap());

    processing.await.unwrap().unwrap();
    assert!(!state.documents.exists(id));
    assert!(state.bm25.search("glacier", 10, None).unwrap().is_empty());
    assert!(state.mindmaps.list().is_empty());
}

#[tokio::test]
async fn test_delete_during_embedding_removes_fresh_index_data() {
    let dir = tempfile::tempdir().unwrap();
    let base_url =
        stand_in_llm(Duration::ZERO, Some(GLACIER_GRAPH), Duration::from_millis(800)).await;
    let state = state_with_llm(&dir, base_url);
    let id = stored_processing_document(&state);

    let processing = {
        let state = state.clone();
        tokio::spawn(async move { ingest::process_document(&state, id).await })
    };
    // Chat replies at once, so BM25 chunks exist while embeddings are pending.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(ingest::remove_document(&state, id).await.unwrap());

    processing.await.unwrap().unwrap();
    assert!(!state.documents.exists(id));
    assert!(state.bm25.search("glacier", 10, None).unwrap().is_empty());
    assert!(state.mindmaps.list().is_empty());
}
