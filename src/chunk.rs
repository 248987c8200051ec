//! Element-aware chunker.
//!
//! Turns a [`Document`]'s elements into [`Chunk`]s of at most
//! `max_chunk_chars` characters:
//!
//! - Prose elements (titles, paragraphs, list items, unknown) on the same
//!   page are packed greedily, joined by a blank line.
//! - Tables and charts always get chunks of their own so citations point
//!   at exactly one structured element.
//! - An element longer than the limit is hard-split, preferring line
//!   breaks, then whitespace, then a plain character boundary.
//! - Charts with no caption become a `[chart on page N]` placeholder chunk,
//!   and images stored without OCR become `[image on page N]`.
//!
//! Each chunk receives a deterministic UUID derived from its filename,
//! first element index and position, plus a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, ChunkMetadata, Document, Element, ElementType};

struct Pending {
    text: String,
    chars: usize,
    page: Option<u32>,
    element_type: ElementType,
    element_index: u32,
}

struct ChunkBuilder<'a> {
    filename: &'a str,
    chunks: Vec<Chunk>,
}

impl ChunkBuilder<'_> {
    fn push(&mut self, text: &str, page: Option<u32>, element_type: ElementType, element_index: u32) {
        let offset = self.chunks.len() as u32;
        self.chunks.push(make_chunk(
            self.filename,
            offset,
            text,
            ChunkMetadata {
                filename: self.filename.to_string(),
                page,
                element_type,
                element_index,
            },
        ));
    }

    fn flush(&mut self, pending: &mut Option<Pending>) {
        if let Some(p) = pending.take() {
            self.push(&p.text, p.page, p.element_type, p.element_index);
        }
    }
}

/// Split a document into chunks. Chunk offsets are contiguous from 0.
pub fn chunk_document(doc: &Document, max_chunk_chars: usize) -> Vec<Chunk> {
    let max_chars = max_chunk_chars.max(1);
    let mut builder = ChunkBuilder {
        filename: doc.filename(),
        chunks: Vec::new(),
    };
    let mut pending: Option<Pending> = None;

    for el in &doc.elements {
        let Some(content) = chunk_content(el) else {
            continue;
        };
        let page = el.metadata.page;
        let index = el.metadata.element_index;
        let chars = content.chars().count();

        if el.element_type.is_structured() {
            builder.flush(&mut pending);
            for piece in hard_split(&content, max_chars) {
                builder.push(&piece, page, el.element_type, index);
            }
            continue;
        }

        if let Some(p) = pending.as_mut() {
            if p.page == page && p.chars + 2 + chars <= max_chars {
                p.text.push_str("\n\n");
                p.text.push_str(&content);
                p.chars += 2 + chars;
                if p.element_type == ElementType::Title {
                    p.element_type = el.element_type;
                }
                continue;
            }
        }
        builder.flush(&mut pending);

        if chars > max_chars {
            for piece in hard_split(&content, max_chars) {
                builder.push(&piece, page, el.element_type, index);
            }
        } else {
            pending = Some(Pending {
                text: content,
                chars,
                page,
                element_type: el.element_type,
                element_index: index,
            });
        }
    }
    builder.flush(&mut pending);

    builder.chunks
}

/// The text an element contributes, or `None` if it contributes nothing.
fn chunk_content(el: &Element) -> Option<String> {
    let trimmed = el.content.trim();
    if !trimmed.is_empty() {
        return Some(trimmed.to_string());
    }
    let label = match el.element_type {
        ElementType::Chart => "chart",
        // Image ingested without OCR.
        ElementType::Unknown => "image",
        _ => return None,
    };
    Some(match el.metadata.page {
        Some(p) => format!("[{} on page {}]", label, p),
        None => format!("[{}]", label),
    })
}

/// Split `text` into pieces of at most `max_chars` characters.
fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut remaining = text.trim();

    while !remaining.is_empty() {
        if remaining.chars().count() <= max_chars {
            pieces.push(remaining.to_string());
            break;
        }
        let limit = remaining
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let window = &remaining[..limit];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(char::is_whitespace))
            .filter(|&pos| pos > 0)
            .unwrap_or(limit);

        let piece = remaining[..split_at].trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        remaining = remaining[split_at..].trim_start();
    }

    pieces
}

/// Deterministic chunk id for `(filename, first element, position)`.
pub fn chunk_id(filename: &str, element_index: u32, offset: u32) -> String {
    let name = format!("{}:{}:{}", filename, element_index, offset);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

fn make_chunk(filename: &str, offset: u32, text: &str, metadata: ChunkMetadata) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        chunk_id: chunk_id(filename, metadata.element_index, offset),
        chunk_offset: offset,
        text: text.to_string(),
        hash,
        embedding: None,
        source_metadata: metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ElementMetadata;
    use std::path::PathBuf;

    fn el(t: ElementType, content: &str, page: Option<u32>) -> Element {
        Element {
            element_type: t,
            content: content.to_string(),
            metadata: ElementMetadata {
                page,
                ..Default::default()
            },
        }
    }

    fn doc(elements: Vec<Element>) -> Document {
        Document::new("doc.md".to_string(), PathBuf::from("doc.md"), elements)
    }

    #[test]
    fn test_prose_packs_into_one_chunk() {
        let d = doc(vec![
            el(ElementType::Title, "Overview", None),
            el(ElementType::NarrativeText, "First paragraph.", None),
            el(ElementType::NarrativeText, "Second paragraph.", None),
        ]);
        let chunks = chunk_document(&d, 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].text,
            "Overview\n\nFirst paragraph.\n\nSecond paragraph."
        );
        assert_eq!(chunks[0].source_metadata.element_index, 0);
        assert_eq!(
            chunks[0].source_metadata.element_type,
            ElementType::NarrativeText
        );
    }

    #[test]
    fn test_tables_are_never_merged() {
        let d = doc(vec![
            el(ElementType::NarrativeText, "Intro.", None),
            el(ElementType::Table, "a | b\nc | d", None),
            el(ElementType::NarrativeText, "Outro.", None),
        ]);
        let chunks = chunk_document(&d, 1000);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].text, "a | b\nc | d");
        assert_eq!(chunks[1].source_metadata.element_type, ElementType::Table);
        assert_eq!(chunks[1].source_metadata.element_index, 1);
    }

    #[test]
    fn test_page_change_starts_new_chunk() {
        let d = doc(vec![
            el(ElementType::NarrativeText, "Page one.", Some(1)),
            el(ElementType::NarrativeText, "Page two.", Some(2)),
        ]);
        let chunks = chunk_document(&d, 1000);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].source_metadata.page, Some(2));
    }

    #[test]
    fn test_long_element_is_split_within_limit() {
        let long = "word ".repeat(100);
        let d = doc(vec![el(ElementType::NarrativeText, &long, None)]);
        let chunks = chunk_document(&d, 42);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 42, "chunk too long: {}", c.text.len());
            assert!(!c.text.starts_with(' ') && !c.text.ends_with(' '));
        }
    }

    #[test]
    fn test_single_long_token_splits_on_char_boundary() {
        let d = doc(vec![el(ElementType::NarrativeText, &"é".repeat(25), None)]);
        let chunks = chunk_document(&d, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 10));
    }

    #[test]
    fn test_empty_chart_gets_placeholder() {
        let d = doc(vec![
            el(ElementType::Chart, "", Some(4)),
            el(ElementType::Chart, "  ", None),
            el(ElementType::NarrativeText, "   ", None),
        ]);
        let chunks = chunk_document(&d, 1000);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "[chart on page 4]");
        assert_eq!(chunks[1].text, "[chart]");
    }

    #[test]
    fn test_empty_unknown_element_gets_image_placeholder() {
        let d = doc(vec![el(ElementType::Unknown, "", Some(1))]);
        let chunks = chunk_document(&d, 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "[image on page 1]");
        assert_eq!(chunks[0].source_metadata.element_type, ElementType::Unknown);
    }

    #[test]
    fn test_offsets_contiguous_and_ids_deterministic() {
        let elements: Vec<Element> = (0..20)
            .map(|i| el(ElementType::NarrativeText, &format!("Paragraph number {}.", i), None))
            .collect();
        let d = doc(elements);
        let c1 = chunk_document(&d, 50);
        let c2 = chunk_document(&d, 50);
        assert_eq!(c1.len(), c2.len());
        for (i, (a, b)) in c1.iter().zip(c2.iter()).enumerate() {
            assert_eq!(a.chunk_offset, i as u32);
            assert_eq!(a.chunk_id, b.chunk_id);
            assert_eq!(a.hash, b.hash);
        }
        let ids: std::collections::HashSet<_> = c1.iter().map(|c| &c.chunk_id).collect();
        assert_eq!(ids.len(), c1.len());
    }

    #[test]
    fn test_chunk_id_depends_on_filename() {
        assert_ne!(chunk_id("a.md", 0, 0), chunk_id("b.md", 0, 0));
        assert_eq!(chunk_id("a.md", 3, 1), chunk_id("a.md", 3, 1));
    }

    #[test]
    fn test_empty_document_has_no_chunks() {
        assert!(chunk_document(&doc(vec![]), 1000).is_empty());
    }
}
