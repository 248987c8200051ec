//! Citation-grounded answer assembly.
//!
//! Builds a prompt that numbers every retrieved chunk as `[Source N]` with
//! its filename, page and element type, sends it to the [`ChatProvider`],
//! and returns the completion with one [`Source`] per chunk in rank order.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::error::GenerationError;
use crate::llm::ChatProvider;
use crate::models::{QueryResult, SearchHit, Source};

/// Returned without calling the model when retrieval finds nothing.
pub const NO_INFORMATION_ANSWER: &str =
    "I couldn't find any relevant information in the indexed documents to answer this question.";

const INSTRUCTIONS: &str = "You answer questions using only the context below. \
Cite the sources you rely on as [Source N]. \
If the context does not contain the answer, say that you don't know.";

pub struct AnswerSynthesizer {
    chat: Arc<dyn ChatProvider>,
    excerpt_chars: usize,
}

impl AnswerSynthesizer {
    pub fn new(chat: Arc<dyn ChatProvider>, excerpt_chars: usize) -> Self {
        Self {
            chat,
            excerpt_chars,
        }
    }

    pub async fn answer(
        &self,
        question: &str,
        hits: &[SearchHit],
    ) -> Result<QueryResult, GenerationError> {
        if hits.is_empty() {
            return Ok(QueryResult {
                answer: NO_INFORMATION_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let sources = sources_for(hits, self.excerpt_chars);
        let prompt = build_prompt(question, hits);
        tracing::debug!(provider = self.chat.name(), chunks = hits.len(), "generating answer");

        match self.chat.complete(&prompt).await {
            Ok(answer) => Ok(QueryResult { answer, sources }),
            Err(e) => Err(e.with_sources(sources)),
        }
    }
}

pub fn build_prompt(question: &str, hits: &[SearchHit]) -> String {
    let mut prompt = String::new();
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\nContext:\n");
    for (i, hit) in hits.iter().enumerate() {
        let m = &hit.metadata;
        let page = m
            .page
            .map(|p| format!("page {}", p))
            .unwrap_or_else(|| "no page".to_string());
        let _ = writeln!(
            prompt,
            "\n[Source {}] ({}, {}, {})\n{}",
            i + 1,
            m.filename,
            page,
            m.element_type,
            hit.text
        );
    }
    let _ = write!(prompt, "\nQuestion: {}\nAnswer:", question);
    prompt
}

pub fn sources_for(hits: &[SearchHit], excerpt_chars: usize) -> Vec<Source> {
    hits.iter()
        .map(|hit| Source {
            filename: hit.metadata.filename.clone(),
            page: hit.metadata.page,
            element_type: hit.metadata.element_type,
            content: excerpt(&hit.text, excerpt_chars),
            similarity: hit.similarity,
        })
        .collect()
}

/// `text` cut to at most `max_chars` characters, `…` included.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let end = text
        .char_indices()
        .nth(max_chars - 1)
        .map_or(text.len(), |(i, _)| i);
    format!("{}…", text[..end].trim_end())
}
