//! Error types for the `ragdesk-rag` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in RAG operations.
///
/// Which of these degrade to empty results and which propagate is decided by
/// the calling component, not by the variant: retrieval swallows
/// [`RagError::Embedding`] at query time, while ingestion and synthesis
/// propagate everything.
#[derive(Debug, Error)]
pub enum RagError {
    /// A document could not be read or decoded.
    #[error("Ingestion error ({source_path}): {message}")]
    Ingestion {
        /// The path or URL of the offending document.
        source_path: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during document chunking.
    #[error("Chunking error: {0}")]
    Chunking(String),

    /// An error occurred during result reranking.
    #[error("Reranker error ({reranker}): {message}")]
    Reranker {
        /// The reranker that produced the error.
        reranker: String,
        /// A description of the failure.
        message: String,
    },

    /// The generative model call failed.
    #[error("Synthesis error ({model}): {message}")]
    Synthesis {
        /// The model that produced the error.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// A network-bound call did not finish in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The per-attempt deadline that elapsed.
        after: Duration,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RagError {
    pub(crate) fn vector_store(backend: &str, message: impl Into<String>) -> Self {
        Self::VectorStore { backend: backend.to_string(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
