use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, LlmConfig};
use crate::search::bm25::Bm25Index;
use crate::search::VectorIndex;
use crate::store::{DocumentStore, MindMapStore, TextStore};

/// Concurrent SSE chat streams.
const MAX_CONCURRENT_CHATS: usize = 3;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub documents: Arc<DocumentStore>,
    pub mindmaps: Arc<MindMapStore>,
    pub texts: Arc<TextStore>,
    pub bm25: Arc<Bm25Index>,
    pub vectors: Arc<VectorIndex>,
    pub http_client: reqwest::Client,
    /// Runtime-editable copy of `config.llm`
    pub llm_config: Arc<RwLock<LlmConfig>>,
    pub ingest_semaphore: Arc<tokio::sync::Semaphore>,
    pub chat_semaphore: Arc<tokio::sync::Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;

        let documents = DocumentStore::open(&config.documents_path())?;
        let mindmaps = MindMapStore::open(&config.mindmaps_path())?;
        let texts = TextStore::open(&config.texts_dir())?;
        let bm25 = Bm25Index::open_or_create(&config.index_dir())?;
        let vectors = VectorIndex::open(&config, http_client.clone())?;

        let llm_config = config.llm.clone();
        let max_ingests = config.max_concurrent_ingests.max(1);

        Ok(Self {
            config,
            documents: Arc::new(documents),
            mindmaps: Arc::new(mindmaps),
            texts: Arc::new(texts),
            bm25: Arc::new(bm25),
            vectors: Arc::new(vectors),
            http_client,
            llm_config: Arc::new(RwLock::new(llm_config)),
            ingest_semaphore: Arc::new(tokio::sync::Semaphore::new(max_ingests)),
            chat_semaphore: Arc::new(tokio::sync::Semaphore::new(MAX_CONCURRENT_CHATS)),
        })
    }

    /// Snapshot of the current LLM settings for one request.
    pub fn llm(&self) -> LlmConfig {
        self.llm_config.read().clone()
    }
}
