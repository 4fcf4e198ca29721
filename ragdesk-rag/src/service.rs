//! The RAG service: ingestion and question answering over two collections.
//!
//! [`RagService`] wires the chunker, the [`VectorIndex`], the [`Retriever`]
//! and the [`AnswerSynthesizer`] together and exposes the operations callers
//! use: rebuilding the document and web collections, answering a query, and
//! start-up initialization.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragdesk_rag::{RagConfig, RagService};
//!
//! let service = RagService::builder()
//!     .config(RagConfig::from_env()?)
//!     .embedding_provider(Arc::new(embedder))
//!     .language_model(Arc::new(model))
//!     .build()?;
//!
//! service.initialize(false, true).await;
//! let answer = service.process_query("What is the deductible?", true, None, None).await;
//! ```

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::chunking::{RecursiveChunker, SeparatorProfile};
use crate::config::RagConfig;
use crate::document::{Answer, RetrievalResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::{CollectionInfo, VectorIndex};
use crate::inmemory::InMemoryVectorStore;
use crate::model::{LanguageModel, ResilientModel};
use crate::reranker::Reranker;
use crate::retrieval::Retriever;
use crate::sources::{
    DocumentLoader, JsonSnapshotCrawler, TextDirectoryLoader, WebCrawler, normalize_web_pages,
};
use crate::synthesis::AnswerSynthesizer;
use crate::vectorstore::VectorStore;

/// Answer text returned when a query fails for any reason.
pub const QUERY_ERROR_ANSWER: &str =
    "I encountered an error while processing your query. Please try again.";

/// Ingestion and query orchestration. Construct one via [`RagService::builder()`].
pub struct RagService {
    config: RagConfig,
    index: Arc<VectorIndex>,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    loader: Arc<dyn DocumentLoader>,
    crawler: Option<Arc<dyn WebCrawler>>,
}

impl RagService {
    /// Create a new [`RagServiceBuilder`].
    pub fn builder() -> RagServiceBuilder {
        RagServiceBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Rebuild the document collection from the document loader.
    ///
    /// Returns the number of chunks indexed.
    ///
    /// # Errors
    ///
    /// Propagates reset, loading, embedding and storage failures.
    pub async fn process_documents(&self) -> Result<usize> {
        let collection = self.config.document_collection_name.as_str();
        self.index.reset(collection).await?;

        let documents = self.loader.load_all().await?;
        info!(document_count = documents.len(), "loaded document parts");

        let chunker = RecursiveChunker::new(
            self.config.chunk_size,
            self.config.chunk_overlap,
            SeparatorProfile::BenefitsSummary,
        );
        let chunks = chunker.split_documents(&documents);
        info!(chunk_count = chunks.len(), "created document chunks");

        let added = self.index.add(collection, &chunks).await?;
        info!(collection, chunk_count = added, "document collection rebuilt");
        Ok(added)
    }

    /// Rebuild the web collection from crawled pages.
    ///
    /// Cached pages are used unless `force_crawl` is set or the cache is
    /// empty. A crawl that fails or yields nothing leaves the collection
    /// empty and returns `0`.
    ///
    /// # Errors
    ///
    /// Propagates reset, embedding and storage failures.
    pub async fn process_web_content(&self, force_crawl: bool) -> Result<usize> {
        let collection = self.config.web_crawl_collection_name.as_str();
        let Some(crawler) = &self.crawler else {
            warn!("no web crawler configured, skipping web content");
            return Ok(0);
        };
        self.index.reset(collection).await?;

        let cached = if force_crawl { Vec::new() } else { crawler.cached_pages().await? };
        let pages = if cached.is_empty() {
            info!(force_crawl, "crawling web content");
            match crawler.crawl().await {
                Ok(pages) => pages,
                Err(e) => {
                    error!(error = %e, "web crawl failed");
                    return Ok(0);
                }
            }
        } else {
            info!(page_count = cached.len(), "using cached web pages");
            cached
        };
        if pages.is_empty() {
            warn!("no web pages found or crawled");
            return Ok(0);
        }

        let documents = normalize_web_pages(&pages);
        info!(document_count = documents.len(), "normalized web pages");

        let chunker = RecursiveChunker::new(
            self.config.chunk_size,
            self.config.chunk_overlap,
            SeparatorProfile::Generic,
        );
        let chunks = chunker.split_documents(&documents);
        let added = self.index.add(collection, &chunks).await?;
        info!(collection, chunk_count = added, "web collection rebuilt");
        Ok(added)
    }

    /// Answer `query` from the indexed collections.
    ///
    /// `top_k` and `threshold` default to the configured values. Never fails:
    /// any error is logged and turned into [`QUERY_ERROR_ANSWER`].
    pub async fn process_query(
        &self,
        query: &str,
        include_web: bool,
        top_k: Option<usize>,
        threshold: Option<f32>,
    ) -> Answer {
        match self.answer(query, include_web, top_k, threshold).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(error = %e, "error processing query");
                Answer::bare(QUERY_ERROR_ANSWER)
            }
        }
    }

    async fn answer(
        &self,
        query: &str,
        include_web: bool,
        top_k: Option<usize>,
        threshold: Option<f32>,
    ) -> Result<Answer> {
        let top_k = top_k.unwrap_or(self.config.retrieval_top_k);
        let threshold = threshold.unwrap_or(self.config.retrieval_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(RagError::Config(format!("threshold ({threshold}) must be within [0, 1]")));
        }

        let context = self.context(query, include_web, top_k, threshold).await;
        info!(context_count = context.len(), include_web, "retrieved relevant passages");
        self.synthesizer.synthesize(query, &context).await
    }

    async fn context(
        &self,
        query: &str,
        include_web: bool,
        top_k: usize,
        threshold: f32,
    ) -> Vec<RetrievalResult> {
        let documents = self.config.document_collection_name.as_str();
        let results = if include_web {
            let collections = [documents, self.config.web_crawl_collection_name.as_str()];
            self.retriever.retrieve_multi(query, &collections, top_k, threshold).await
        } else {
            self.retriever.retrieve(query, top_k, threshold, documents).await
        };
        self.retriever.rerank(query, results, top_k).await
    }

    /// Prepare the collections for serving queries.
    ///
    /// Rebuilds the document collection (and the web collection when
    /// `include_web` is set) if `force_reload` is set or the document
    /// collection is empty; otherwise only makes sure the collections exist.
    /// Returns `false` if anything failed.
    pub async fn initialize(&self, force_reload: bool, include_web: bool) -> bool {
        match self.try_initialize(force_reload, include_web).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "error initializing RAG service");
                false
            }
        }
    }

    async fn try_initialize(&self, force_reload: bool, include_web: bool) -> Result<()> {
        let documents = self.index.info(&self.config.document_collection_name).await?;
        if !force_reload && documents.count > 0 {
            info!(collection = %documents.name, count = documents.count, "using existing index");
            if include_web {
                self.index.create_or_get(&self.config.web_crawl_collection_name).await?;
            }
            return Ok(());
        }

        info!(force_reload, "initializing index with documents");
        self.process_documents().await?;
        let documents = self.index.info(&self.config.document_collection_name).await?;
        info!(collection = %documents.name, count = documents.count, "collection ready");

        if include_web {
            info!("initializing index with web content");
            self.process_web_content(force_reload).await?;
            let web = self.index.info(&self.config.web_crawl_collection_name).await?;
            info!(collection = %web.name, count = web.count, "collection ready");
        }
        Ok(())
    }

    /// Name and entry count of every collection.
    pub async fn collections(&self) -> Result<Vec<CollectionInfo>> {
        let mut infos = Vec::new();
        for name in self.index.list_collections().await? {
            infos.push(self.index.info(&name).await?);
        }
        Ok(infos)
    }
}

/// Builder for constructing a [`RagService`].
///
/// The embedding provider and language model are required. The vector store
/// defaults to an [`InMemoryVectorStore`], the loader to a
/// [`TextDirectoryLoader`] over `documents_path`, and the crawler to a
/// [`JsonSnapshotCrawler`] over `web_snapshot_path`.
#[derive(Default)]
pub struct RagServiceBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    language_model: Option<Arc<dyn LanguageModel>>,
    document_loader: Option<Arc<dyn DocumentLoader>>,
    web_crawler: Option<Arc<dyn WebCrawler>>,
    reranker: Option<Arc<dyn Reranker>>,
    without_web: bool,
}

impl RagServiceBuilder {
    /// Set the service configuration. Defaults to [`RagConfig::default()`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the generative language model.
    pub fn language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.language_model = Some(model);
        self
    }

    /// Set the document loader.
    pub fn document_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.document_loader = Some(loader);
        self
    }

    /// Set the web crawler.
    pub fn web_crawler(mut self, crawler: Arc<dyn WebCrawler>) -> Self {
        self.web_crawler = Some(crawler);
        self.without_web = false;
        self
    }

    /// Run without any web crawler; web ingestion becomes a no-op.
    pub fn without_web_crawler(mut self) -> Self {
        self.web_crawler = None;
        self.without_web = true;
        self
    }

    /// Set a reranker applied to fused results.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Build the [`RagService`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if any required field is missing.
    pub fn build(self) -> Result<RagService> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let language_model = self
            .language_model
            .ok_or_else(|| RagError::Config("language_model is required".to_string()))?;
        let vector_store =
            self.vector_store.unwrap_or_else(|| Arc::new(InMemoryVectorStore::new()));
        let loader = self
            .document_loader
            .unwrap_or_else(|| Arc::new(TextDirectoryLoader::new(config.documents_path.clone())));
        let crawler = match self.web_crawler {
            Some(crawler) => Some(crawler),
            None if self.without_web => None,
            None => Some(Arc::new(JsonSnapshotCrawler::new(config.web_snapshot_path.clone()))
                as Arc<dyn WebCrawler>),
        };

        let retry = config.retry_policy();
        let index = Arc::new(
            VectorIndex::new(vector_store, embedding_provider)
                .with_retry(retry)
                .with_batch_size(config.embedding_batch_size),
        );
        let mut retriever = Retriever::new(index.clone());
        if let Some(reranker) = self.reranker {
            retriever = retriever.with_reranker(reranker);
        }
        let synthesizer = AnswerSynthesizer::new(Arc::new(ResilientModel::new(language_model, retry)));

        Ok(RagService { config, index, retriever, synthesizer, loader, crawler })
    }
}
