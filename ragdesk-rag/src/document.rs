//! Data types for documents, chunks, index entries, retrieval results and citations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a passage originally came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// A file loaded from the document corpus.
    #[default]
    Document,
    /// The body text of a crawled web page.
    Web,
    /// A single question/answer pair scraped from a web page.
    WebFaq,
}

impl SourceType {
    /// Whether this passage came from crawled web content.
    pub fn is_web(self) -> bool {
        matches!(self, Self::Web | Self::WebFaq)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Web => "web",
            Self::WebFaq => "web_faq",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata attached to a [`Document`] by its loader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DocumentMetadata {
    /// File path or URL of the original source.
    pub source: String,
    /// 1-based page number, when the loader splits by page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Short document type, e.g. `txt`, `pdf`, `html`.
    #[serde(rename = "type")]
    pub doc_type: String,
    /// Kind of content extracted, e.g. `text` or `table`.
    pub content_type: String,
    /// Corpus the passage belongs to.
    #[serde(default)]
    pub source_type: SourceType,
    /// Page title for web content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Crawl timestamp for web content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl DocumentMetadata {
    /// Metadata for a file in the document corpus.
    pub fn file(
        source: impl Into<String>,
        doc_type: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            doc_type: doc_type.into(),
            content_type: content_type.into(),
            ..Self::default()
        }
    }

    /// Set the page number.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// A source document handed to the chunker. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// The normalized text content of the document.
    pub content: String,
    /// Loader-provided metadata.
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self { content: content.into(), metadata }
    }
}

/// Metadata of a [`Chunk`]: the parent document's metadata plus its position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChunkMetadata {
    #[serde(flatten)]
    pub document: DocumentMetadata,
    /// Position of this chunk within its document, starting at 0.
    pub chunk_index: usize,
    /// Number of chunks the document was split into.
    pub total_chunks: usize,
    /// Collection the passage was retrieved from. Set by multi-collection retrieval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl ChunkMetadata {
    pub fn source(&self) -> &str {
        &self.document.source
    }

    pub fn page(&self) -> Option<u32> {
        self.document.page
    }

    pub fn source_type(&self) -> SourceType {
        self.document.source_type
    }
}

/// A bounded substring of a [`Document`]; the unit of indexing and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The text content of the chunk. Never empty.
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A stored row of a collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// Identifier, unique within its collection.
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// The vector embedding for `text`.
    pub embedding: Vec<f32>,
}

/// A passage returned for a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity in `[0, 1]`; higher is more relevant.
    pub similarity: f32,
}

/// Metadata presented with a [`Citation`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CitationMetadata {
    /// Display name of the source: the URL for web content, a cleaned-up file
    /// name otherwise.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
}

/// A passage confirmed (or presumed) to underlie a synthesized answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub content: String,
    pub metadata: CitationMetadata,
    pub similarity: f32,
}

/// The final answer to a query: the model's text and the passages it used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Citation>,
}

impl Answer {
    /// An answer with no citations.
    pub fn bare(text: impl Into<String>) -> Self {
        Self { text: text.into(), sources: Vec::new() }
    }
}
