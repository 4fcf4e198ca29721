//! Vector store trait for storing and searching vector embeddings.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::document::IndexEntry;
use crate::error::Result;

/// A stored entry paired with its cosine distance to a query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub entry: IndexEntry,
    /// Cosine distance in `[0, 2]`; `0` means same direction.
    pub distance: f32,
}

/// A storage backend for vector embeddings with cosine nearest-neighbor search.
///
/// Implementations manage named collections of [`IndexEntry`]s. Writes are
/// all-or-nothing per call: a query running concurrently with
/// [`insert`](VectorStore::insert) or
/// [`reset_collection`](VectorStore::reset_collection) sees the collection
/// either before or after the write, never in between.
///
/// # Example
///
/// ```rust,ignore
/// use ragdesk_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("documents", 384).await?;
/// store.insert("documents", &entries).await?;
/// let neighbors = store.search("documents", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a named collection and all its data. No-op if it does not exist.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Replace a collection with an empty one of the same name.
    ///
    /// The default implementation deletes then creates; backends that can
    /// swap atomically should override it.
    async fn reset_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        self.delete_collection(name).await?;
        self.create_collection(name, dimensions).await
    }

    /// Whether the named collection exists.
    async fn has_collection(&self, name: &str) -> Result<bool>;

    /// Names of all collections, sorted.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Number of entries stored in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// The subset of `ids` already present in a collection.
    async fn existing_ids(&self, collection: &str, ids: &[&str]) -> Result<HashSet<String>>;

    /// Insert entries into a collection. Entries must have embeddings set and
    /// ids not yet present in the collection.
    async fn insert(&self, collection: &str, entries: &[IndexEntry]) -> Result<()>;

    /// Delete entries by their IDs from a collection.
    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()>;

    /// Search for the `top_k` entries nearest to the given embedding.
    ///
    /// Returns neighbors ordered by ascending cosine distance.
    async fn search(&self, collection: &str, embedding: &[f32], top_k: usize)
    -> Result<Vec<Neighbor>>;
}
