//! Per-collection vector index.
//!
//! [`VectorIndex`] sits between the chunker and a [`VectorStore`]: it assigns
//! entry ids, embeds passage text through the [`EmbeddingProvider`] seam, and
//! turns raw nearest-neighbor distances into threshold-filtered
//! [`RetrievalResult`]s.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::document::{Chunk, ChunkMetadata, IndexEntry, RetrievalResult};
use crate::embedding::{EmbeddingProvider, ResilientEmbedder};
use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::vectorstore::VectorStore;

/// A cached reference to a collection known to exist in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHandle {
    pub name: String,
    pub dimensions: usize,
}

/// Summary of a collection returned by [`VectorIndex::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub count: usize,
}

/// Named collections of embedded passages with cosine similarity search.
///
/// # Example
///
/// ```rust,ignore
/// use ragdesk_rag::{InMemoryVectorStore, VectorIndex};
///
/// let index = VectorIndex::new(Arc::new(InMemoryVectorStore::new()), Arc::new(embedder));
/// index.add("documents", &chunks).await?;
/// let results = index.query("documents", "what is my deductible?", 5, 0.6).await?;
/// ```
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: ResilientEmbedder,
    handles: RwLock<HashMap<String, CollectionHandle>>,
    /// Held from id resolution through insert.
    writes: Mutex<()>,
}

impl VectorIndex {
    /// Create an index over `store` that embeds text with `provider`.
    pub fn new(store: Arc<dyn VectorStore>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder: ResilientEmbedder::new(provider),
            handles: RwLock::default(),
            writes: Mutex::default(),
        }
    }

    /// Retry policy applied to every embedding call.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.embedder = self.embedder.with_retry(retry);
        self
    }

    /// Maximum number of passages embedded per provider request.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.embedder = self.embedder.with_batch_size(batch_size);
        self
    }

    /// Dimensionality of every vector stored by this index.
    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    /// Return the handle for `name`, creating the collection on first use.
    pub async fn create_or_get(&self, name: &str) -> Result<CollectionHandle> {
        if let Some(handle) = self.handles.read().await.get(name) {
            return Ok(handle.clone());
        }

        let mut handles = self.handles.write().await;
        if let Some(handle) = handles.get(name) {
            return Ok(handle.clone());
        }

        let dimensions = self.dimensions();
        self.store.create_collection(name, dimensions).await.inspect_err(|e| {
            error!(collection = name, error = %e, "failed to create collection");
        })?;
        let handle = CollectionHandle { name: name.to_string(), dimensions };
        handles.insert(name.to_string(), handle.clone());
        debug!(collection = name, dimensions, "collection ready");
        Ok(handle)
    }

    /// Embed and store chunks, returning the number of entries written.
    ///
    /// Chunks with blank text are dropped. Every entry gets an id derived
    /// from its source, page and chunk index plus a random disambiguator.
    pub async fn add(&self, collection: &str, chunks: &[Chunk]) -> Result<usize> {
        let entries: Vec<IndexEntry> = chunks
            .iter()
            .enumerate()
            .filter(|(_, chunk)| !chunk.text.trim().is_empty())
            .map(|(position, chunk)| IndexEntry {
                id: entry_id(&chunk.metadata, position),
                text: chunk.text.clone(),
                metadata: chunk.metadata.clone(),
                embedding: Vec::new(),
            })
            .collect();
        self.add_entries(collection, entries).await
    }

    /// Store prepared entries, returning the number of entries written.
    ///
    /// Entries with blank text are dropped; entries without an embedding are
    /// embedded first. Ids that collide with each other or with stored ids
    /// get a numeric `_{n}` suffix so every submitted entry is kept. Concurrent
    /// calls embed in parallel but resolve ids and insert one at a time, so
    /// two calls never claim the same suffix.
    pub async fn add_entries(&self, collection: &str, entries: Vec<IndexEntry>) -> Result<usize> {
        self.create_or_get(collection).await?;

        let mut entries: Vec<IndexEntry> =
            entries.into_iter().filter(|entry| !entry.text.trim().is_empty()).collect();
        if entries.is_empty() {
            debug!(collection, "nothing to add");
            return Ok(0);
        }

        let missing: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.embedding.is_empty())
            .map(|(i, _)| i)
            .collect();
        if !missing.is_empty() {
            let texts: Vec<&str> = missing.iter().map(|&i| entries[i].text.as_str()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await.inspect_err(|e| {
                error!(collection, error = %e, "embedding failed during add");
            })?;
            for (i, embedding) in missing.into_iter().zip(embeddings) {
                entries[i].embedding = embedding;
            }
        }

        let _write = self.writes.lock().await;
        let ids = self.unique_ids(collection, entries.iter().map(|e| e.id.clone()).collect()).await?;
        for (entry, id) in entries.iter_mut().zip(ids) {
            entry.id = id;
        }

        self.store.insert(collection, &entries).await.inspect_err(|e| {
            error!(collection, error = %e, "insert failed");
        })?;

        let entry_count = entries.len();
        info!(collection, entry_count, "added entries");
        Ok(entry_count)
    }

    /// Resolve id collisions within `ids` and against ids already stored.
    async fn unique_ids(&self, collection: &str, ids: Vec<String>) -> Result<Vec<String>> {
        let requested: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut taken: HashSet<String> = self.store.existing_ids(collection, &requested).await?;
        let mut seen: HashSet<String> = HashSet::with_capacity(ids.len());

        let mut unique = Vec::with_capacity(ids.len());
        for id in ids {
            if !taken.contains(&id) && seen.insert(id.clone()) {
                unique.push(id);
                continue;
            }

            let mut n = 1;
            let resolved = loop {
                let candidate = format!("{id}_{n}");
                if !taken.contains(&candidate) && !seen.contains(&candidate) {
                    let stored = self.store.existing_ids(collection, &[candidate.as_str()]).await?;
                    if stored.is_empty() {
                        break candidate;
                    }
                    taken.extend(stored);
                }
                n += 1;
            };
            debug!(collection, id = %id, resolved = %resolved, "renamed colliding id");
            seen.insert(resolved.clone());
            unique.push(resolved);
        }
        Ok(unique)
    }

    /// Return up to `top_k` passages whose similarity to `text` is at least
    /// `threshold`, most similar first.
    ///
    /// A missing or empty collection yields an empty list. Embedding failures
    /// propagate.
    pub async fn query(
        &self,
        collection: &str,
        text: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<RetrievalResult>> {
        if top_k == 0 || !self.store.has_collection(collection).await? {
            debug!(collection, top_k, "query skipped");
            return Ok(Vec::new());
        }
        if self.store.count(collection).await? == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(text).await?;
        let neighbors = self.store.search(collection, &embedding, top_k).await?;

        let mut results: Vec<RetrievalResult> = neighbors
            .into_iter()
            .map(|neighbor| RetrievalResult {
                content: neighbor.entry.text,
                metadata: neighbor.entry.metadata,
                similarity: (1.0 - neighbor.distance).clamp(0.0, 1.0),
            })
            .filter(|result| result.similarity >= threshold)
            .collect();
        results.sort_by(|a, b| {
            b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(collection, result_count = results.len(), threshold, "query completed");
        Ok(results)
    }

    /// Replace `name` with an empty collection of the same configuration.
    ///
    /// Other collections are untouched.
    pub async fn reset(&self, name: &str) -> Result<()> {
        let dimensions = self.dimensions();
        let mut handles = self.handles.write().await;
        self.store.reset_collection(name, dimensions).await.inspect_err(|e| {
            error!(collection = name, error = %e, "failed to reset collection");
        })?;
        handles.insert(name.to_string(), CollectionHandle { name: name.to_string(), dimensions });
        info!(collection = name, "collection reset");
        Ok(())
    }

    /// Name and entry count of a collection, creating it if needed.
    pub async fn info(&self, name: &str) -> Result<CollectionInfo> {
        self.create_or_get(name).await?;
        let count = self.store.count(name).await?;
        Ok(CollectionInfo { name: name.to_string(), count })
    }

    /// Names of every collection in the underlying store.
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        self.store.list_collections().await
    }

    /// Delete entries by id.
    pub async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        self.store.delete(collection, ids).await?;
        info!(collection, deleted = ids.len(), "deleted entries");
        Ok(())
    }

    /// Drop a collection and forget its handle.
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut handles = self.handles.write().await;
        self.store.delete_collection(name).await?;
        handles.remove(name);
        info!(collection = name, "collection deleted");
        Ok(())
    }
}

/// `doc_{source}_{page or position}_{chunk index}_{random}` with path
/// separators flattened to `_`.
fn entry_id(metadata: &ChunkMetadata, position: usize) -> String {
    let page = metadata.page().map_or(position, |page| page as usize);
    let disambiguator = Uuid::new_v4().simple().to_string();
    format!("doc_{}_{page}_{}_{}", metadata.source(), metadata.chunk_index, &disambiguator[..8])
        .replace(['/', '\\'], "_")
}
