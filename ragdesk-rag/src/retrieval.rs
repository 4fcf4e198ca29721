//! Retrieval fusion across collections.
//!
//! Every method here degrades instead of failing: a sub-query that errors is
//! logged and contributes nothing, so a flaky collection or embedding call
//! never takes the whole query down.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::document::RetrievalResult;
use crate::index::VectorIndex;
use crate::reranker::{Reranker, SimilarityReranker, truncate_by_similarity};

/// Queries one or more collections of a [`VectorIndex`] and fuses the results.
pub struct Retriever {
    index: Arc<VectorIndex>,
    reranker: Arc<dyn Reranker>,
}

impl Retriever {
    /// A retriever that reranks by plain similarity.
    pub fn new(index: Arc<VectorIndex>) -> Self {
        Self { index, reranker: Arc::new(SimilarityReranker) }
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Query a single collection. Errors are logged and yield no results.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        threshold: f32,
        collection: &str,
    ) -> Vec<RetrievalResult> {
        match self.index.query(collection, query, top_k, threshold).await {
            Ok(results) => results,
            Err(e) => {
                warn!(collection, error = %e, "retrieval failed, continuing without results");
                Vec::new()
            }
        }
    }

    /// Query every collection in `collections` and fuse the results.
    ///
    /// Each collection is queried with the same `top_k` and `threshold`.
    /// Results are stamped with their collection name, merged, sorted by
    /// similarity and cut to `top_k` overall.
    pub async fn retrieve_multi(
        &self,
        query: &str,
        collections: &[&str],
        top_k: usize,
        threshold: f32,
    ) -> Vec<RetrievalResult> {
        if collections.is_empty() {
            return Vec::new();
        }

        let per_collection = join_all(collections.iter().map(|&collection| async move {
            self.retrieve(query, top_k, threshold, collection)
                .await
                .into_iter()
                .map(|mut result| {
                    result.metadata.collection = Some(collection.to_string());
                    result
                })
                .collect::<Vec<_>>()
        }))
        .await;

        let merged: Vec<RetrievalResult> = per_collection.into_iter().flatten().collect();
        let candidate_count = merged.len();
        let fused = truncate_by_similarity(merged, top_k);
        debug!(
            collection_count = collections.len(),
            candidate_count,
            result_count = fused.len(),
            "fused retrieval results"
        );
        fused
    }

    /// Fuse results from every collection the index currently holds.
    pub async fn retrieve_from_all(
        &self,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> Vec<RetrievalResult> {
        let names = match self.index.list_collections().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "failed to list collections");
                return Vec::new();
            }
        };
        let collections: Vec<&str> = names.iter().map(String::as_str).collect();
        self.retrieve_multi(query, &collections, top_k, threshold).await
    }

    /// Rerank `results` and keep at most `top_n`.
    ///
    /// Falls back to similarity order if the configured reranker fails.
    pub async fn rerank(
        &self,
        query: &str,
        results: Vec<RetrievalResult>,
        top_n: usize,
    ) -> Vec<RetrievalResult> {
        match self.reranker.rerank(query, results.clone(), top_n).await {
            Ok(mut reranked) => {
                reranked.truncate(top_n);
                reranked
            }
            Err(e) => {
                warn!(error = %e, "reranker failed, keeping similarity order");
                truncate_by_similarity(results, top_n)
            }
        }
    }
}
