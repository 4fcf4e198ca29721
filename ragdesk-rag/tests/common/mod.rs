//! Deterministic fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ragdesk_rag::document::{ChunkMetadata, DocumentMetadata, IndexEntry, SourceType};
use ragdesk_rag::error::{RagError, Result};
use ragdesk_rag::model::{GenerationConfig, LanguageModel};
use ragdesk_rag::{EmbeddingProvider, RetryPolicy};

pub const DIM: usize = 2;

/// The query direction used by [`TableEmbedder`] for unknown text.
pub const QUERY: [f32; DIM] = [1.0, 0.0];

/// A unit vector whose cosine similarity with [`QUERY`] is `similarity`.
pub fn at_similarity(similarity: f32) -> Vec<f32> {
    vec![similarity, (1.0 - similarity * similarity).max(0.0).sqrt()]
}

/// Maps known texts to fixed vectors and everything else to [`QUERY`].
#[derive(Default)]
pub struct TableEmbedder {
    table: HashMap<String, Vec<f32>>,
    pub calls: AtomicUsize,
    pub batch_sizes: Mutex<Vec<usize>>,
}

impl TableEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for TableEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.table.get(text).cloned().unwrap_or_else(|| QUERY.to_vec()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(texts.len());
        Ok(texts.iter().map(|t| self.table.get(*t).cloned().unwrap_or_else(|| QUERY.to_vec())).collect())
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "table"
    }
}

/// An embedder whose every call fails.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::Embedding { provider: "failing".into(), message: "unreachable".into() })
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Returns a fixed answer and records every prompt it receives.
pub struct ScriptedModel {
    answer: String,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(answer: &str) -> Self {
        Self { answer: answer.to_string(), prompts: Mutex::new(Vec::new()) }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str, _config: &GenerationConfig) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.answer.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A model that is always unreachable.
#[derive(Default)]
pub struct FailingModel {
    pub calls: AtomicUsize,
}

#[async_trait]
impl LanguageModel for FailingModel {
    async fn generate(&self, _prompt: &str, _config: &GenerationConfig) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RagError::Synthesis {
            model: "failing".into(),
            message: "connection refused".into(),
        })
    }
}

/// Retries disabled so failure tests never sleep.
pub fn no_retry() -> RetryPolicy {
    RetryPolicy::none(std::time::Duration::from_secs(5))
}

pub fn metadata(source: &str, page: Option<u32>, source_type: SourceType) -> ChunkMetadata {
    let mut document = DocumentMetadata::file(source, "text", "text");
    document.page = page;
    document.source_type = source_type;
    ChunkMetadata { document, chunk_index: 0, total_chunks: 1, collection: None }
}

/// A ready-to-store entry with an explicit id and vector.
pub fn entry(id: &str, text: &str, embedding: Vec<f32>) -> IndexEntry {
    IndexEntry {
        id: id.to_string(),
        text: text.to_string(),
        metadata: metadata("notes.txt", None, SourceType::Document),
        embedding,
    }
}
