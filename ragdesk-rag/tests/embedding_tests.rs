//! Tests for the batching, zero-vector and validation layer over embedding providers.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use ragdesk_rag::embedding::{EmbeddingProvider, ResilientEmbedder};
use ragdesk_rag::error::{RagError, Result};

use common::{DIM, TableEmbedder, no_retry};

/// Drops the last vector of every batch.
struct ShortBatchEmbedder;

#[async_trait]
impl EmbeddingProvider for ShortBatchEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0; DIM])
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(vec![vec![1.0; DIM]; texts.len().saturating_sub(1)])
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

#[tokio::test]
async fn blank_inputs_keep_their_position_as_zero_vectors() {
    let backend = Arc::new(TableEmbedder::new().with("a", vec![0.5, 0.5]));
    let embedder = ResilientEmbedder::new(backend.clone()).with_retry(no_retry());

    let vectors = embedder.embed_batch(&["", "a", "  "]).await.unwrap();

    assert_eq!(vectors, vec![vec![0.0, 0.0], vec![0.5, 0.5], vec![0.0, 0.0]]);
    assert_eq!(*backend.batch_sizes.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn empty_text_never_reaches_the_backend() {
    let backend = Arc::new(TableEmbedder::new());
    let embedder = ResilientEmbedder::new(backend.clone()).with_retry(no_retry());

    assert_eq!(embedder.embed("").await.unwrap(), vec![0.0; DIM]);
    assert_eq!(embedder.embed(" \n ").await.unwrap(), vec![0.0; DIM]);
    assert_eq!(embedder.embed_batch(&["", "\t"]).await.unwrap(), vec![vec![0.0; DIM]; 2]);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn short_batch_is_an_embedding_error() {
    let embedder = ResilientEmbedder::new(Arc::new(ShortBatchEmbedder)).with_retry(no_retry());

    let err = embedder.embed_batch(&["a", "b"]).await.unwrap_err();

    assert!(matches!(err, RagError::Embedding { .. }), "{err}");
}

#[tokio::test]
async fn wrong_dimension_is_an_embedding_error() {
    let backend = TableEmbedder::new().with("wide", vec![1.0, 0.0, 0.0]);
    let embedder = ResilientEmbedder::new(Arc::new(backend)).with_retry(no_retry());

    let single = embedder.embed("wide").await.unwrap_err();
    let batch = embedder.embed_batch(&["ok", "wide"]).await.unwrap_err();

    assert!(matches!(single, RagError::Embedding { .. }), "{single}");
    assert!(matches!(batch, RagError::Embedding { .. }), "{batch}");
}
