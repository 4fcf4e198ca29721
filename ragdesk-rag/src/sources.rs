//! Ingestion collaborators: document loaders, web crawlers and the web page
//! normalizer.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::document::{Document, DocumentMetadata, SourceType};
use crate::error::{RagError, Result};

/// Body text written by crawlers for pages they could not parse.
pub const NO_CONTENT_EXTRACTED: &str = "No content extracted";

/// Loads raw documents from some source into normalized text.
///
/// Loaders may return an empty list for unsupported or unreadable input, but
/// must never return undecoded binary as text.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load a single file.
    async fn load(&self, path: &Path) -> Result<Vec<Document>>;

    /// Load every document the loader knows about.
    async fn load_all(&self) -> Result<Vec<Document>>;
}

/// Loads `.txt` and `.md` files from a directory tree, one document per file.
///
/// Files are visited in name order so ingestion is reproducible.
#[derive(Debug, Clone)]
pub struct TextDirectoryLoader {
    root: PathBuf,
}

impl TextDirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn doc_type(path: &Path) -> Option<&'static str> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "txt" => Some("text"),
            "md" | "markdown" => Some("markdown"),
            _ => None,
        }
    }

    async fn read_text(path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        String::from_utf8(bytes).map_err(|e| RagError::Ingestion {
            source_path: path.display().to_string(),
            message: format!("not valid UTF-8: {e}"),
        })
    }
}

#[async_trait]
impl DocumentLoader for TextDirectoryLoader {
    async fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let Some(doc_type) = Self::doc_type(path) else {
            warn!(path = %path.display(), "unsupported file format, skipping");
            return Ok(Vec::new());
        };

        let text = match Self::read_text(path).await {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load document, skipping");
                return Ok(Vec::new());
            }
        };

        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(vec![Document::new(text, DocumentMetadata::file(source, doc_type, "text"))])
    }

    async fn load_all(&self) -> Result<Vec<Document>> {
        if !self.root.is_dir() {
            warn!(path = %self.root.display(), "documents directory not found");
            return Ok(Vec::new());
        }

        let files: Vec<PathBuf> = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| Self::doc_type(path).is_some())
            .collect();
        info!(path = %self.root.display(), file_count = files.len(), "found documents");

        let mut documents = Vec::new();
        for path in &files {
            debug!(path = %path.display(), "loading document");
            documents.extend(self.load(path).await?);
        }
        info!(document_count = documents.len(), "loaded documents");
        Ok(documents)
    }
}

/// A question/answer pair scraped from a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FaqEntry {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

/// A crawled page record as written by the external crawler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WebPage {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub full_text: String,
    #[serde(default)]
    pub faq_content: Vec<FaqEntry>,
    #[serde(default)]
    pub timestamp: String,
}

/// Source of crawled web pages.
#[async_trait]
pub trait WebCrawler: Send + Sync {
    /// Pages from a previous crawl. Empty when none are available.
    async fn cached_pages(&self) -> Result<Vec<WebPage>>;

    /// Crawl now and return the fresh pages.
    async fn crawl(&self) -> Result<Vec<WebPage>>;
}

/// Reads page records from the JSON array an external crawler writes.
///
/// `crawl` re-reads the snapshot and fails when it is missing or malformed;
/// `cached_pages` treats both as "no cache".
#[derive(Debug, Clone)]
pub struct JsonSnapshotCrawler {
    path: PathBuf,
}

impl JsonSnapshotCrawler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<Vec<WebPage>> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let pages: Vec<WebPage> = serde_json::from_str(&raw)?;
        info!(path = %self.path.display(), page_count = pages.len(), "loaded crawled pages");
        Ok(pages)
    }
}

#[async_trait]
impl WebCrawler for JsonSnapshotCrawler {
    async fn cached_pages(&self) -> Result<Vec<WebPage>> {
        match self.read().await {
            Ok(pages) => Ok(pages),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "no usable crawl snapshot");
                Ok(Vec::new())
            }
        }
    }

    async fn crawl(&self) -> Result<Vec<WebPage>> {
        self.read().await.map_err(|e| RagError::Ingestion {
            source_path: self.path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Turn crawled pages into documents: one `web` document per page body and
/// one `web_faq` document per complete question/answer pair.
pub fn normalize_web_pages(pages: &[WebPage]) -> Vec<Document> {
    let mut documents = Vec::new();
    for page in pages {
        let metadata = |source_type: SourceType| DocumentMetadata {
            source: page.url.clone(),
            doc_type: "html".to_string(),
            content_type: "text".to_string(),
            source_type,
            title: Some(page.title.clone()),
            timestamp: Some(page.timestamp.clone()),
            ..DocumentMetadata::default()
        };

        if !page.full_text.trim().is_empty() && page.full_text != NO_CONTENT_EXTRACTED {
            documents.push(Document::new(page.full_text.clone(), metadata(SourceType::Web)));
        }

        for faq in &page.faq_content {
            if faq.question.is_empty() || faq.answer.is_empty() {
                continue;
            }
            documents.push(Document::new(
                format!("Q: {}\nA: {}", faq.question, faq.answer),
                metadata(SourceType::WebFaq),
            ));
        }
    }
    documents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizer_splits_bodies_and_faqs() {
        let pages = vec![
            WebPage {
                url: "https://support.example.com/orders".into(),
                title: "Orders".into(),
                full_text: "How orders work.".into(),
                faq_content: vec![
                    FaqEntry { question: "Can I cancel?".into(), answer: "Yes, before 3pm.".into() },
                    FaqEntry { question: "Unanswered?".into(), answer: String::new() },
                ],
                timestamp: "2024-05-01 10:00:00".into(),
            },
            WebPage {
                url: "https://support.example.com/blank".into(),
                full_text: NO_CONTENT_EXTRACTED.into(),
                ..WebPage::default()
            },
        ];

        let documents = normalize_web_pages(&pages);
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].metadata.source_type, SourceType::Web);
        assert_eq!(documents[0].metadata.title.as_deref(), Some("Orders"));
        assert_eq!(documents[1].content, "Q: Can I cancel?\nA: Yes, before 3pm.");
        assert_eq!(documents[1].metadata.source_type, SourceType::WebFaq);
        assert_eq!(documents[1].metadata.source, "https://support.example.com/orders");
    }

    #[test]
    fn page_records_tolerate_missing_fields() {
        let pages: Vec<WebPage> =
            serde_json::from_str(r#"[{"url": "https://a.example", "full_text": "body"}]"#).unwrap();
        assert_eq!(pages[0].title, "");
        assert!(pages[0].faq_content.is_empty());
    }
}
