//! Configuration for the RAG service.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;

/// Configuration parameters for the RAG service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of passages handed to the synthesizer per query.
    pub retrieval_top_k: usize,
    /// Minimum similarity a passage needs to count as context.
    pub retrieval_threshold: f32,
    /// Name of the embedding model, passed to the embedding provider.
    pub embedding_model_name: String,
    /// Passages per embedding request.
    pub embedding_batch_size: usize,
    pub document_collection_name: String,
    pub web_crawl_collection_name: String,
    /// Directory scanned for documents.
    pub documents_path: PathBuf,
    /// JSON page records written by the crawler.
    pub web_snapshot_path: PathBuf,
    /// Deadline for one embedding or generation request.
    pub request_timeout_secs: u64,
    /// Retries after the first failed embedding or generation request.
    pub max_retries: u32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            retrieval_top_k: 5,
            retrieval_threshold: 0.6,
            embedding_model_name: "BAAI/bge-small-en-v1.5".to_string(),
            embedding_batch_size: 32,
            document_collection_name: "documents".to_string(),
            web_crawl_collection_name: "web_documents".to_string(),
            documents_path: PathBuf::from("../documents"),
            web_snapshot_path: PathBuf::from("./data/processed/web_content/support_pages.json"),
            request_timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, falling back to defaults for
    /// unset keys.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a value does not parse or the result
    /// fails validation.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, default: String| {
            lookup(key).filter(|value| !value.trim().is_empty()).unwrap_or(default)
        };

        Self::builder()
            .chunk_size(parse(&lookup, "CHUNK_SIZE", defaults.chunk_size)?)
            .chunk_overlap(parse(&lookup, "CHUNK_OVERLAP", defaults.chunk_overlap)?)
            .retrieval_top_k(parse(&lookup, "RETRIEVAL_TOP_K", defaults.retrieval_top_k)?)
            .retrieval_threshold(parse(
                &lookup,
                "RETRIEVAL_THRESHOLD",
                defaults.retrieval_threshold,
            )?)
            .embedding_model_name(text("EMBEDDING_MODEL", defaults.embedding_model_name))
            .embedding_batch_size(parse(
                &lookup,
                "EMBEDDING_BATCH_SIZE",
                defaults.embedding_batch_size,
            )?)
            .document_collection_name(text("DOCUMENT_COLLECTION", defaults.document_collection_name))
            .web_crawl_collection_name(text(
                "WEB_CRAWL_COLLECTION",
                defaults.web_crawl_collection_name,
            ))
            .documents_path(parse(&lookup, "DOCUMENTS_PATH", defaults.documents_path)?)
            .web_snapshot_path(parse(&lookup, "WEB_SNAPSHOT_PATH", defaults.web_snapshot_path)?)
            .request_timeout_secs(parse(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?)
            .max_retries(parse(&lookup, "MAX_RETRIES", defaults.max_retries)?)
            .build()
    }

    /// Retry policy for embedding and generation requests.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.max_retries.saturating_add(1))
            .with_timeout(Duration::from_secs(self.request_timeout_secs))
    }
}

fn parse<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|e| RagError::Config(format!("invalid value for {key} ({value:?}): {e}"))),
        _ => Ok(default),
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of passages retrieved per query.
    pub fn retrieval_top_k(mut self, k: usize) -> Self {
        self.config.retrieval_top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn retrieval_threshold(mut self, threshold: f32) -> Self {
        self.config.retrieval_threshold = threshold;
        self
    }

    pub fn embedding_model_name(mut self, name: impl Into<String>) -> Self {
        self.config.embedding_model_name = name.into();
        self
    }

    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    pub fn document_collection_name(mut self, name: impl Into<String>) -> Self {
        self.config.document_collection_name = name.into();
        self
    }

    pub fn web_crawl_collection_name(mut self, name: impl Into<String>) -> Self {
        self.config.web_crawl_collection_name = name.into();
        self
    }

    pub fn documents_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.documents_path = path.into();
        self
    }

    pub fn web_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.web_snapshot_path = path.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `retrieval_top_k == 0` or `embedding_batch_size == 0`
    /// - `retrieval_threshold` is outside `[0, 1]`
    /// - a name is empty or both collections share a name
    /// - `request_timeout_secs == 0`
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        if config.retrieval_top_k == 0 {
            return Err(RagError::Config("retrieval_top_k must be greater than zero".to_string()));
        }
        if !(0.0..=1.0).contains(&config.retrieval_threshold) {
            return Err(RagError::Config(format!(
                "retrieval_threshold ({}) must be within [0, 1]",
                config.retrieval_threshold
            )));
        }
        if config.embedding_batch_size == 0 {
            return Err(RagError::Config(
                "embedding_batch_size must be greater than zero".to_string(),
            ));
        }
        for (field, value) in [
            ("embedding_model_name", &config.embedding_model_name),
            ("document_collection_name", &config.document_collection_name),
            ("web_crawl_collection_name", &config.web_crawl_collection_name),
        ] {
            if value.trim().is_empty() {
                return Err(RagError::Config(format!("{field} must not be empty")));
            }
        }
        if config.document_collection_name == config.web_crawl_collection_name {
            return Err(RagError::Config(format!(
                "document and web collections must differ (both are '{}')",
                config.document_collection_name
            )));
        }
        if config.request_timeout_secs == 0 {
            return Err(RagError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }
}
