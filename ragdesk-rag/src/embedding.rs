//! Embedding provider trait for generating vector embeddings from text.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// Vectors must have [`dimensions`](EmbeddingProvider::dimensions) entries and
/// be deterministic for a fixed model.
///
/// # Example
///
/// ```rust,ignore
/// use ragdesk_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A short name used in logs and errors.
    fn name(&self) -> &str {
        "embedding"
    }
}

/// Wraps an [`EmbeddingProvider`] with the guarantees the index relies on.
///
/// - empty (or blank) input maps to a zero vector without calling the backend
/// - batches are sent in slices of at most `batch_size` texts
/// - every backend call goes through a [`RetryPolicy`]
/// - the backend must return one vector per input, each of the advertised
///   dimension
pub struct ResilientEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
    batch_size: usize,
}

impl ResilientEmbedder {
    /// Default number of texts sent to the backend per request.
    pub const DEFAULT_BATCH_SIZE: usize = 32;

    pub fn new(inner: Arc<dyn EmbeddingProvider>) -> Self {
        Self { inner, retry: RetryPolicy::default(), batch_size: Self::DEFAULT_BATCH_SIZE }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn zero_vector(&self) -> Vec<f32> {
        vec![0.0; self.inner.dimensions()]
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        let expected = self.inner.dimensions();
        if vector.len() != expected {
            return Err(RagError::Embedding {
                provider: self.inner.name().to_string(),
                message: format!("expected {expected} dimensions, got {}", vector.len()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for ResilientEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(self.zero_vector());
        }

        let inner = &self.inner;
        let vector = self.retry.run("embed", move || inner.embed(text)).await?;
        self.check_dimensions(&vector)?;
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        let pending: Vec<(usize, &str)> = texts
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| (i, *text))
            .collect();

        vectors.resize_with(texts.len(), || self.zero_vector());

        let batch_count = pending.len().div_ceil(self.batch_size);
        for (batch_number, batch) in pending.chunks(self.batch_size).enumerate() {
            debug!(
                provider = self.inner.name(),
                batch = batch_number + 1,
                batch_count,
                batch_size = batch.len(),
                "embedding batch"
            );

            let inputs: Vec<&str> = batch.iter().map(|(_, text)| *text).collect();
            let (inner, request) = (&self.inner, inputs.as_slice());
            let embedded =
                self.retry.run("embed_batch", move || inner.embed_batch(request)).await?;
            if embedded.len() != inputs.len() {
                return Err(RagError::Embedding {
                    provider: self.inner.name().to_string(),
                    message: format!(
                        "requested {} embeddings, received {}",
                        inputs.len(),
                        embedded.len()
                    ),
                });
            }

            for ((index, _), vector) in batch.iter().zip(embedded) {
                self.check_dimensions(&vector)?;
                vectors[*index] = vector;
            }
        }

        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
