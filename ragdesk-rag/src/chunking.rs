//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! splits text on an ordered list of separators (a [`SeparatorProfile`]),
//! merges the pieces back into chunks of at most `chunk_size` characters and
//! carries up to `chunk_overlap` characters of context from one chunk into the
//! next.
//!
//! If the recursive splitter rejects its input, a simpler
//! paragraph → sentence → fixed-width splitter takes over. Both paths measure
//! length in characters and never emit an empty chunk.

use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::document::{Chunk, ChunkMetadata, Document};
use crate::error::{RagError, Result};

static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n\s*\n").expect("unreachable error: failed to compile paragraph pattern")
});
static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[.!?]\s+").expect("unreachable error: failed to compile sentence pattern")
});

/// Section headings that recur in Summary of Benefits and Coverage documents.
const BENEFITS_SUMMARY_SEPARATORS: &[&str] = &[
    "\n\n",
    "\n",
    "Medical Event",
    "Services You May Need",
    "What You Will Pay",
    "Limitations, Exceptions, & Other Important Information",
    "Common Medical Event",
    ". ",
    "? ",
    "! ",
    ", ",
    " ",
    "",
];

const GENERIC_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "? ", "! ", ", ", " ", ""];

/// Ordered separators for [`RecursiveChunker`], most structural first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SeparatorProfile {
    /// Tuned for insurance benefit summaries: adds the recurring section
    /// headings between line and sentence boundaries.
    BenefitsSummary,
    /// Paragraph, line, sentence, clause, word, character.
    #[default]
    Generic,
    /// Caller-supplied separators. A trailing `""` is implied.
    Custom(Vec<String>),
}

impl SeparatorProfile {
    /// The separators to try, always ending with the character separator `""`.
    pub fn separators(&self) -> Vec<&str> {
        let mut separators: Vec<&str> = match self {
            Self::BenefitsSummary => BENEFITS_SUMMARY_SEPARATORS.to_vec(),
            Self::Generic => GENERIC_SEPARATORS.to_vec(),
            Self::Custom(custom) => custom.iter().map(String::as_str).collect(),
        };
        if separators.last() != Some(&"") {
            separators.push("");
        }
        separators
    }
}

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s stamped with `chunk_index` and
/// `total_chunks`. Embeddings are attached later by the index.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;

    /// Split every document, skipping those with empty text.
    fn chunk_all(&self, documents: &[Document]) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = documents.iter().flat_map(|doc| self.chunk(doc)).collect();
        info!(
            document_count = documents.len(),
            chunk_count = chunks.len(),
            "split documents into chunks"
        );
        chunks
    }
}

/// Splits text hierarchically using a [`SeparatorProfile`].
///
/// The first separator present in the text is used to cut it into pieces;
/// pieces shorter than `chunk_size` are merged greedily, longer ones are
/// split again with the remaining separators. Consecutive chunks share up
/// to `chunk_overlap` characters.
///
/// # Example
///
/// ```rust,ignore
/// use ragdesk_rag::{RecursiveChunker, SeparatorProfile};
///
/// let chunker = RecursiveChunker::new(500, 50, SeparatorProfile::Generic);
/// let pieces = chunker.split_text(&text);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    profile: SeparatorProfile,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: characters carried over between consecutive chunks
    /// * `profile`: separators to split on
    pub fn new(chunk_size: usize, chunk_overlap: usize, profile: SeparatorProfile) -> Self {
        Self { chunk_size, chunk_overlap, profile }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn profile(&self) -> &SeparatorProfile {
        &self.profile
    }

    /// Split text into ordered, non-empty chunks.
    ///
    /// Falls back to [`fallback_split`] when the recursive splitter fails.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        match self.try_split_text(text) {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "recursive split failed, using fallback splitter");
                fallback_split(text, self.chunk_size)
            }
        }
    }

    /// Run the recursive splitter alone, without the fallback.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Chunking`] if `chunk_size` is zero, if
    /// `chunk_overlap >= chunk_size`, or if non-blank input produced no chunk.
    pub fn try_split_text(&self, text: &str) -> Result<Vec<String>> {
        if self.chunk_size == 0 {
            return Err(RagError::Chunking("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Chunking(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        let separators = self.profile.separators();
        let chunks = split_recursive(text, &separators, self.chunk_size, self.chunk_overlap);
        if chunks.is_empty() && !text.trim().is_empty() {
            return Err(RagError::Chunking("splitter produced no chunks".to_string()));
        }
        Ok(chunks)
    }

    /// Split documents into chunks, stamping `chunk_index` and `total_chunks`.
    ///
    /// Documents with empty text are skipped.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        self.chunk_all(documents)
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.content.is_empty() {
            debug!(source = %document.metadata.source, "skipping empty document");
            return Vec::new();
        }

        let pieces = self.split_text(&document.content);
        let total_chunks = pieces.len();

        pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| Chunk {
                text,
                metadata: ChunkMetadata {
                    document: document.metadata.clone(),
                    chunk_index,
                    total_chunks,
                    collection: None,
                },
            })
            .collect()
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split with the first separator found in `text`, recursing into pieces
/// that are still too long.
fn split_recursive(
    text: &str,
    separators: &[&str],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    let mut separator = "";
    let mut remaining: &[&str] = &[];
    for (i, candidate) in separators.iter().enumerate() {
        if candidate.is_empty() {
            break;
        }
        if text.contains(candidate) {
            separator = candidate;
            remaining = &separators[i + 1..];
            break;
        }
    }

    let mut chunks = Vec::new();
    let mut fitting: Vec<&str> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) < chunk_size {
            fitting.push(piece);
            continue;
        }

        if !fitting.is_empty() {
            chunks.extend(merge_pieces(&fitting, chunk_size, chunk_overlap));
            fitting.clear();
        }

        if remaining.is_empty() {
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
        } else {
            chunks.extend(split_recursive(piece, remaining, chunk_size, chunk_overlap));
        }
    }

    if !fitting.is_empty() {
        chunks.extend(merge_pieces(&fitting, chunk_size, chunk_overlap));
    }

    chunks
}

/// Cut `text` before every occurrence of `separator`, so each separator
/// stays attached to the start of the piece that follows it. An empty
/// separator yields one piece per character.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(start, c)| &text[start..start + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(separator) {
        if pos > start {
            pieces.push(&text[start..pos]);
        }
        start = pos;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Greedily merge pieces into chunks of at most `chunk_size` characters.
///
/// When a chunk is emitted, pieces are dropped from the front until at most
/// `chunk_overlap` characters remain; those become the start of the next chunk.
fn merge_pieces(pieces: &[&str], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0;

    for &piece in pieces {
        let len = char_len(piece);
        if total + len > chunk_size && !window.is_empty() {
            push_joined(&mut chunks, &window);
            while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                match window.pop_front() {
                    Some(dropped) => total -= char_len(dropped),
                    None => break,
                }
            }
        }
        window.push_back(piece);
        total += len;
    }

    push_joined(&mut chunks, &window);
    chunks
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Paragraph → sentence → fixed-width splitting.
///
/// Used when [`RecursiveChunker::try_split_text`] fails. Every chunk is
/// non-empty and at most `chunk_size` characters; oversized sentences are cut
/// into windows that overlap by `min(100, chunk_size / 10)` characters.
pub fn fallback_split(text: &str, chunk_size: usize) -> Vec<String> {
    let max_len = chunk_size.max(1);
    let overlap = (max_len / 10).min(100);
    let step = max_len - overlap;

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in PARAGRAPH_BREAK.split(text) {
        if char_len(&current) + char_len(paragraph) <= max_len {
            current.push_str(paragraph);
            current.push_str("\n\n");
            continue;
        }

        flush(&mut chunks, &mut current);

        if char_len(paragraph) <= max_len {
            current.push_str(paragraph);
            current.push_str("\n\n");
            continue;
        }

        for sentence in split_sentences(paragraph) {
            if char_len(&current) + char_len(sentence) <= max_len {
                current.push_str(sentence);
                current.push(' ');
                continue;
            }

            flush(&mut chunks, &mut current);

            if char_len(sentence) > max_len {
                let chars: Vec<char> = sentence.chars().collect();
                let mut start = 0;
                while start < chars.len() {
                    let end = (start + max_len).min(chars.len());
                    let window: String = chars[start..end].iter().collect();
                    if !window.trim().is_empty() {
                        chunks.push(window);
                    }
                    if end == chars.len() {
                        break;
                    }
                    start += step;
                }
            } else {
                current.push_str(sentence);
                current.push(' ');
            }
        }
    }

    flush(&mut chunks, &mut current);
    chunks
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
}

/// Split after `.`, `!` or `?` when followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(text) {
        sentences.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_keep_start_of_following_piece() {
        let pieces = split_keeping_separator("one. two. three", ". ");
        assert_eq!(pieces, vec!["one", ". two", ". three"]);
    }

    #[test]
    fn empty_separator_splits_into_characters() {
        let pieces = split_keeping_separator("añb", "");
        assert_eq!(pieces, vec!["a", "ñ", "b"]);
    }

    #[test]
    fn custom_profile_gains_character_separator() {
        let profile = SeparatorProfile::Custom(vec!["###".to_string()]);
        assert_eq!(profile.separators(), vec!["###", ""]);
        assert_eq!(SeparatorProfile::Generic.separators().last(), Some(&""));
    }

    #[test]
    fn merge_carries_tail_pieces_into_next_chunk() {
        let pieces = ["aaaa", " bbbb", " cccc", " dddd"];
        let chunks = merge_pieces(&pieces, 10, 5);
        assert_eq!(chunks, vec!["aaaa bbbb", "bbbb cccc", "cccc dddd"]);
    }

    #[test]
    fn sentences_split_after_terminal_punctuation() {
        let sentences = split_sentences("First one. Second?  Third! tail");
        assert_eq!(sentences, vec!["First one.", "Second?", "Third!", "tail"]);
    }

    #[test]
    fn invalid_overlap_uses_fallback() {
        let chunker = RecursiveChunker::new(20, 40, SeparatorProfile::Generic);
        assert!(chunker.try_split_text("some words here").is_err());

        let chunks = chunker.split_text("alpha beta gamma delta epsilon zeta eta theta");
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| !c.is_empty() && c.chars().count() <= 20));
    }

    #[test]
    fn fallback_windows_long_sentences() {
        let text = "x".repeat(250);
        let chunks = fallback_split(&text, 100);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert_eq!(chunks[0].chars().count(), 100);
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        let chunker = RecursiveChunker::new(50, 5, SeparatorProfile::Generic);
        assert!(chunker.split_text("  \n\n \n ").is_empty());
    }
}
