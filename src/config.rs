use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where documents.json, mind maps, extracted texts and indexes live
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Pinecone configuration; local vector store is used when unset
    pub pinecone: Option<PineconeConfig>,
    /// Maximum upload / fetched document size in MB
    pub max_upload_mb: u64,
    /// Fields with a confidence below this are flagged for human review
    pub review_threshold: f32,
    /// Maximum concurrent background ingestions
    pub max_concurrent_ingests: usize,
    /// Maximum total local vector entries in memory (0 = unlimited)
    pub max_vector_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for analysis, concept extraction and chat
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub embedding_dim: usize,
}

/// Pinecone data-plane settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PineconeConfig {
    pub api_key: String,
    /// Index host, e.g. "https://docs-abc123.svc.us-east-1.pinecone.io"
    pub index_host: String,
    pub namespace: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:5000".to_string(),
            llm: LlmConfig::default(),
            pinecone: None,
            max_upload_mb: 20,
            review_threshold: 0.7,
            max_concurrent_ingests: 2,
            max_vector_entries: 200_000,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key: None,
            embedding_dim: 1536,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("DOCSIGHT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("DOCSIGHT_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(val) = std::env::var("DOCSIGHT_MAX_UPLOAD_MB") {
            if let Ok(v) = val.parse() {
                config.max_upload_mb = v;
            }
        }
        if let Ok(val) = std::env::var("DOCSIGHT_REVIEW_THRESHOLD") {
            if let Ok(v) = val.parse::<f32>() {
                config.review_threshold = v.clamp(0.0, 1.0);
            }
        }
        if let Ok(val) = std::env::var("DOCSIGHT_MAX_CONCURRENT_INGESTS") {
            if let Ok(v) = val.parse::<usize>() {
                config.max_concurrent_ingests = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("DOCSIGHT_MAX_VECTOR_ENTRIES") {
            if let Ok(v) = val.parse() {
                config.max_vector_entries = v;
            }
        }

        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY")) {
            config.llm.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("LLM_EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }

        // Pinecone is enabled only when both key and host are present
        if let (Ok(api_key), Ok(index_host)) = (
            std::env::var("PINECONE_API_KEY"),
            std::env::var("PINECONE_INDEX_HOST"),
        ) {
            config.pinecone = Some(PineconeConfig {
                api_key,
                index_host: index_host.trim_end_matches('/').to_string(),
                namespace: std::env::var("PINECONE_NAMESPACE").ok(),
            });
        }

        config
    }

    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb as usize) * 1024 * 1024
    }

    pub fn documents_path(&self) -> PathBuf {
        self.data_dir.join("documents.json")
    }

    pub fn mindmaps_path(&self) -> PathBuf {
        self.data_dir.join("mindmaps.json")
    }

    pub fn texts_dir(&self) -> PathBuf {
        self.data_dir.join("texts")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }

    /// Config rooted at `data_dir` with everything else at defaults.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_rooted_in_data_dir() {
        let config = Config::for_data_dir("/tmp/ds");
        assert_eq!(config.documents_path(), PathBuf::from("/tmp/ds/documents.json"));
        assert_eq!(config.mindmaps_path(), PathBuf::from("/tmp/ds/mindmaps.json"));
        assert_eq!(config.texts_dir(), PathBuf::from("/tmp/ds/texts"));
        assert_eq!(config.index_dir(), PathBuf::from("/tmp/ds/index"));
        assert_eq!(config.vector_dir(), PathBuf::from("/tmp/ds/vectors"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.pinecone.is_none());
        assert_eq!(config.max_upload_bytes(), 20 * 1024 * 1024);
        assert!((config.review_threshold - 0.7).abs() < f32::EPSILON);
    }
}
