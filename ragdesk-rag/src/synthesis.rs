//! Grounded answer synthesis with citation back-extraction.
//!
//! The synthesizer renders retrieved passages behind numbered markers
//! (`[Document 2: ...]`, `[Web Document 3: ...]`), asks the model to answer
//! from that context alone, and then scans the answer for the markers it
//! echoed to decide which passages to cite.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::document::{Answer, Citation, CitationMetadata, RetrievalResult};
use crate::error::{RagError, Result};
use crate::model::{GenerationConfig, LanguageModel};

/// Answer text returned when no passage passes the similarity threshold.
pub const NO_CONTEXT_ANSWER: &str = "I Don't Know.";

/// Number of passages cited when the model cites none explicitly.
pub const FALLBACK_CITATIONS: usize = 2;

const DEFAULT_PREAMBLE: &str = "You are a customer support assistant. You answer questions about \
the organization's plan documents and its published web pages.";

/// Builds grounded prompts, calls the model and reconciles citations.
pub struct AnswerSynthesizer {
    model: Arc<dyn LanguageModel>,
    generation: GenerationConfig,
    preamble: String,
}

impl AnswerSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            generation: GenerationConfig::default(),
            preamble: DEFAULT_PREAMBLE.to_string(),
        }
    }

    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// Replace the assistant description that opens every prompt.
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    /// Answer `query` from `context`, which must already be ranked.
    ///
    /// With no context the model is not called and the answer is
    /// [`NO_CONTEXT_ANSWER`] with no sources. Model failures propagate as
    /// [`RagError::Synthesis`]; this method never retries on its own.
    pub async fn synthesize(&self, query: &str, context: &[RetrievalResult]) -> Result<Answer> {
        if context.is_empty() {
            debug!("no context passed the threshold, skipping generation");
            return Ok(Answer::bare(NO_CONTEXT_ANSWER));
        }

        let prompt = build_prompt(&self.preamble, query, &format_context(context));
        let text = self.model.generate(&prompt, &self.generation).await.map_err(|e| {
            error!(model = self.model.name(), error = %e, "generation failed");
            match e {
                e @ RagError::Synthesis { .. } => e,
                other => RagError::Synthesis {
                    model: self.model.name().to_string(),
                    message: other.to_string(),
                },
            }
        })?;

        let sources = extract_citations(&text, context);
        info!(
            model = self.model.name(),
            context_count = context.len(),
            citation_count = sources.len(),
            "answer synthesized"
        );
        Ok(Answer { text, sources })
    }
}

/// The name a passage is presented under: the URL for web content, the
/// file name with `_` as spaces and without `.pdf`/`.docx` otherwise.
pub fn display_name(result: &RetrievalResult) -> String {
    let source = result.metadata.source();
    if result.metadata.source_type().is_web() {
        source.to_string()
    } else {
        source.replace('_', " ").replace(".pdf", "").replace(".docx", "")
    }
}

/// The marker that identifies the passage at 1-based `number`.
pub fn marker(result: &RetrievalResult, number: usize) -> String {
    if result.metadata.source_type().is_web() {
        format!("Web Document {number}")
    } else {
        format!("Document {number}")
    }
}

/// Render passages in order, each under its bracketed marker header.
pub fn format_context(context: &[RetrievalResult]) -> String {
    context
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let number = i + 1;
            let name = display_name(result);
            let header = match result.metadata.page() {
                Some(page) if !result.metadata.source_type().is_web() => {
                    format!("[{}: {name} (Page {page})]", marker(result, number))
                }
                _ => format!("[{}: {name}]", marker(result, number)),
            };
            format!("{header}\n{}\n", result.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The full grounded prompt for one query.
pub fn build_prompt(preamble: &str, query: &str, context: &str) -> String {
    format!(
        "{preamble}\n\
         \n\
         Answer the user's question using only the context documents below.\n\
         \n\
         RULES:\n\
         1. Base your answer exclusively on the context. Do not add or infer facts that it does not state.\n\
         2. If the context does not contain the answer, reply with exactly \"{NO_CONTEXT_ANSWER}\"\n\
         3. Write plain sentences, or a numbered list if needed. Do not use bullet points, asterisks (*) or dashes (-).\n\
         4. Cite every document you rely on by its marker in your answer text, for example \"Document 2\" or \"Web Document 3\".\n\
         5. When several documents are relevant, cite all of them.\n\
         6. Explain domain-specific terms briefly when the context defines them.\n\
         \n\
         CONTEXT:\n\
         {context}\n\
         \n\
         USER QUESTION:\n\
         {query}\n\
         \n\
         ANSWER:"
    )
}

/// Whether `text` mentions `marker` as a whole number, so `Document 1` does
/// not match inside `Document 12`.
fn mentions(text: &str, marker: &str) -> bool {
    text.match_indices(marker).any(|(start, matched)| {
        !text[start + matched.len()..].starts_with(|c: char| c.is_ascii_digit())
    })
}

fn citation(result: &RetrievalResult) -> Citation {
    let source_type = result.metadata.source_type();
    Citation {
        content: result.content.clone(),
        metadata: CitationMetadata {
            source: display_name(result),
            page: result.metadata.page(),
            source_type: Some(source_type),
        },
        similarity: result.similarity,
    }
}

/// Citations for the passages whose markers appear in `answer`.
///
/// Citations are deduplicated by `(source, page)`. When the answer mentions
/// no marker, the [`FALLBACK_CITATIONS`] most similar passages are cited.
pub fn extract_citations(answer: &str, context: &[RetrievalResult]) -> Vec<Citation> {
    let mut seen: HashSet<(String, Option<u32>)> = HashSet::new();
    let mut cited = Vec::new();
    for (i, result) in context.iter().enumerate() {
        if !mentions(answer, &marker(result, i + 1)) {
            continue;
        }
        let entry = citation(result);
        if seen.insert((entry.metadata.source.clone(), entry.metadata.page)) {
            cited.push(entry);
        }
    }

    if cited.is_empty() && !context.is_empty() {
        debug!("answer cites no marker, falling back to the most similar passages");
        let mut ranked: Vec<&RetrievalResult> = context.iter().collect();
        ranked.sort_by(|a, b| {
            b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal)
        });
        cited = ranked.into_iter().take(FALLBACK_CITATIONS).map(citation).collect();
    }
    cited
}
