//! Retrieval-augmented question answering over document and web collections.
//!
//! This crate provides:
//! - Recursive, overlap-preserving text chunking with separator profiles
//! - An embedding seam with batching, zero vectors for blank text and retries
//! - Per-collection vector indexing over a pluggable [`VectorStore`]
//! - Threshold-filtered retrieval fused across collections
//! - Grounded answer synthesis with citation back-extraction
//! - [`RagService`], which ties ingestion and querying together
//!
//! # Feature flags
//!
//! - `openai`: [`openai::OpenAIEmbeddingProvider`] for OpenAI-compatible embedding APIs
//! - `gemini`: [`gemini::GeminiModel`] for Gemini answer generation

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod inmemory;
pub mod model;
pub mod reranker;
pub mod retrieval;
pub mod retry;
pub mod service;
pub mod sources;
pub mod synthesis;
pub mod vectorstore;

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, RecursiveChunker, SeparatorProfile, fallback_split};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    Answer, Chunk, ChunkMetadata, Citation, CitationMetadata, Document, DocumentMetadata,
    IndexEntry, RetrievalResult, SourceType,
};
pub use embedding::{EmbeddingProvider, ResilientEmbedder};
pub use error::{RagError, Result};
pub use index::{CollectionHandle, CollectionInfo, VectorIndex};
pub use inmemory::{InMemoryVectorStore, cosine_similarity};
pub use model::{GenerationConfig, LanguageModel, ResilientModel};
pub use reranker::{Reranker, SimilarityReranker};
pub use retrieval::Retriever;
pub use retry::RetryPolicy;
pub use service::{QUERY_ERROR_ANSWER, RagService, RagServiceBuilder};
pub use sources::{
    DocumentLoader, FaqEntry, JsonSnapshotCrawler, TextDirectoryLoader, WebCrawler, WebPage,
    normalize_web_pages,
};
pub use synthesis::{AnswerSynthesizer, NO_CONTEXT_ANSWER};
pub use vectorstore::{Neighbor, VectorStore};
