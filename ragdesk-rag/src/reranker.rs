//! Reranker trait for re-scoring retrieval results.

use async_trait::async_trait;

use crate::document::RetrievalResult;
use crate::error::Result;

/// A reranker that re-scores and reorders retrieval results.
///
/// Implementations can use cross-encoder models, LLM-based scoring, or
/// other strategies to improve precision beyond initial vector similarity.
/// The calling contract stays the same whatever the strategy: at most
/// `top_n` results come back, best first.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank results given the original query, keeping at most `top_n`.
    async fn rerank(
        &self,
        query: &str,
        results: Vec<RetrievalResult>,
        top_n: usize,
    ) -> Result<Vec<RetrievalResult>>;
}

/// Orders results by similarity and keeps the first `top_n`.
///
/// # Example
///
/// ```rust,ignore
/// use ragdesk_rag::SimilarityReranker;
///
/// let reranked = SimilarityReranker.rerank("query", results, 3).await?;
/// assert!(reranked.len() <= 3);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityReranker;

/// Stable descending sort by similarity followed by truncation.
pub fn truncate_by_similarity(
    mut results: Vec<RetrievalResult>,
    top_n: usize,
) -> Vec<RetrievalResult> {
    results.sort_by(|a, b| {
        b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(top_n);
    results
}

#[async_trait]
impl Reranker for SimilarityReranker {
    async fn rerank(
        &self,
        _query: &str,
        results: Vec<RetrievalResult>,
        top_n: usize,
    ) -> Result<Vec<RetrievalResult>> {
        Ok(truncate_by_similarity(results, top_n))
    }
}
