//! Retrieval on top of the vector index.
//!
//! Over-fetches from [`VectorIndex::search`] and caps how many hits a single
//! `(filename, page)` may contribute, so one dense page cannot crowd every
//! other source out of the answer context.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::index::VectorIndex;
use crate::models::SearchHit;

/// Candidates fetched per requested result before the page cap applies.
const OVERFETCH_FACTOR: usize = 3;

pub struct Retriever {
    index: Arc<VectorIndex>,
    max_chunks_per_page: usize,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, max_chunks_per_page: usize) -> Self {
        Self {
            index,
            max_chunks_per_page: max_chunks_per_page.max(1),
        }
    }

    /// Top `top_k` hits with similarity `>= min_similarity`, in rank order.
    pub async fn retrieve(
        &self,
        question: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchHit>> {
        let candidates = self
            .index
            .search(question, top_k.saturating_mul(OVERFETCH_FACTOR), min_similarity)
            .await?;
        let hits = cap_per_page(candidates, self.max_chunks_per_page, top_k);
        tracing::debug!(question, hits = hits.len(), "retrieved");
        Ok(hits)
    }
}

/// Keep at most `per_page` hits for each `(filename, page)`, preserving
/// order, then truncate to `top_k`.
///
/// Text and markdown chunks carry no page, so a whole text file shares one
/// `(filename, None)` budget.
pub fn cap_per_page(candidates: Vec<SearchHit>, per_page: usize, top_k: usize) -> Vec<SearchHit> {
    let mut seen: HashMap<(String, Option<u32>), usize> = HashMap::new();
    candidates
        .into_iter()
        .filter(|hit| {
            let key = (hit.metadata.filename.clone(), hit.metadata.page);
            let count = seen.entry(key).or_insert(0);
            *count += 1;
            *count <= per_page
        })
        .take(top_k)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkMetadata, ElementType};

    fn hit(id: &str, filename: &str, page: Option<u32>, similarity: f32) -> SearchHit {
        SearchHit {
            chunk_id: id.to_string(),
            text: id.to_string(),
            similarity,
            metadata: ChunkMetadata {
                filename: filename.to_string(),
                page,
                element_type: ElementType::NarrativeText,
                element_index: 0,
            },
        }
    }

    #[test]
    fn test_cap_per_page_keeps_rank_order() {
        let candidates = vec![
            hit("a", "x.pdf", Some(1), 0.9),
            hit("b", "x.pdf", Some(1), 0.8),
            hit("c", "x.pdf", Some(1), 0.7),
            hit("d", "x.pdf", Some(2), 0.6),
            hit("e", "y.pdf", Some(1), 0.5),
        ];
        let ids: Vec<String> = cap_per_page(candidates, 2, 10)
            .into_iter()
            .map(|h| h.chunk_id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "d", "e"]);
    }

    #[test]
    fn test_cap_then_truncate() {
        let candidates = vec![
            hit("a", "x.md", None, 0.9),
            hit("b", "x.md", None, 0.8),
            hit("c", "y.md", None, 0.7),
            hit("d", "z.md", None, 0.6),
        ];
        let ids: Vec<String> = cap_per_page(candidates, 1, 2)
            .into_iter()
            .map(|h| h.chunk_id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_pageless_file_shares_one_budget() {
        let candidates = vec![
            hit("a", "notes.md", None, 0.9),
            hit("b", "notes.md", None, 0.8),
            hit("c", "notes.md", None, 0.7),
            hit("d", "report.pdf", Some(1), 0.6),
        ];
        let ids: Vec<String> = cap_per_page(candidates, 2, 10)
            .into_iter()
            .map(|h| h.chunk_id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "d"]);
    }
}
