//! Core data models used throughout doc-lens.
//!
//! These types represent the elements, documents, chunks, and query results
//! that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Kind of content an [`Element`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Title,
    NarrativeText,
    Table,
    Chart,
    ListItem,
    Unknown,
}

impl ElementType {
    pub const ALL: [ElementType; 6] = [
        ElementType::Title,
        ElementType::NarrativeText,
        ElementType::Table,
        ElementType::Chart,
        ElementType::ListItem,
        ElementType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Title => "title",
            ElementType::NarrativeText => "narrative_text",
            ElementType::Table => "table",
            ElementType::Chart => "chart",
            ElementType::ListItem => "list_item",
            ElementType::Unknown => "unknown",
        }
    }

    /// Parse the stored snake_case name. Unrecognized names map to `Unknown`.
    pub fn parse(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .unwrap_or(ElementType::Unknown)
    }

    /// Tables and charts keep their own chunks so citations stay precise.
    pub fn is_structured(&self) -> bool {
        matches!(self, ElementType::Table | ElementType::Chart)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel rectangle within a page raster or image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// True when the two boxes share at least one row of pixels.
    pub fn overlaps_vertically(&self, other: &BoundingBox) -> bool {
        self.y < other.bottom() && other.y < self.bottom()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementMetadata {
    /// 1-based page number; `None` for formats without pages.
    pub page: Option<u32>,
    pub bounding_box: Option<BoundingBox>,
    /// OCR confidence in `[0, 1]`.
    pub source_confidence: Option<f32>,
    pub element_index: u32,
}

/// One semantically distinct unit extracted from a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub element_type: ElementType,
    pub content: String,
    pub metadata: ElementMetadata,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentMetadata {
    pub filename: String,
    /// Where the file was read from. Never persisted.
    #[serde(skip)]
    pub source_path: PathBuf,
    pub page_count: Option<u32>,
    pub element_types: BTreeMap<ElementType, usize>,
}

/// The result of extracting one file.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub elements: Vec<Element>,
    pub doc_metadata: DocumentMetadata,
}

impl Document {
    /// Build a document, assigning sequential `element_index` values in
    /// extraction order and tallying element types.
    pub fn new(filename: String, source_path: PathBuf, mut elements: Vec<Element>) -> Self {
        let mut element_types = BTreeMap::new();
        for (i, el) in elements.iter_mut().enumerate() {
            el.metadata.element_index = i as u32;
            *element_types.entry(el.element_type).or_insert(0) += 1;
        }
        Self {
            elements,
            doc_metadata: DocumentMetadata {
                filename,
                source_path,
                page_count: None,
                element_types,
            },
        }
    }

    pub fn filename(&self) -> &str {
        &self.doc_metadata.filename
    }
}

/// Provenance carried by every chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub filename: String,
    pub page: Option<u32>,
    pub element_type: ElementType,
    /// Index of the first element merged into this chunk.
    pub element_index: u32,
}

/// The retrieval unit: text plus provenance, embedded at ingestion.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub chunk_id: String,
    /// Position of this chunk within its document.
    pub chunk_offset: u32,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
    pub embedding: Option<Vec<f32>>,
    pub source_metadata: ChunkMetadata,
}

/// A chunk returned from similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub text: String,
    pub similarity: f32,
    pub metadata: ChunkMetadata,
}

/// One cited source in a query answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub filename: String,
    pub page: Option<u32>,
    pub element_type: ElementType,
    /// Bounded excerpt of the chunk text.
    pub content: String,
    pub similarity: f32,
}

/// Answer plus the sources it was grounded in, in retrieval order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<Source>,
}

/// Per-document index summary.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub filename: String,
    pub chunks: i64,
    pub pages: i64,
    pub indexed_at: i64,
}

/// Pipeline stage a document is in (or failed at).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Uploaded,
    Extracted,
    Chunked,
    Indexed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Uploaded => "uploaded",
            Stage::Extracted => "extracted",
            Stage::Chunked => "chunked",
            Stage::Indexed => "indexed",
        };
        f.write_str(s)
    }
}

/// Terminal or in-flight state of one document's ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DocumentState {
    Uploaded,
    Extracted,
    Chunked,
    Indexed,
    /// `stage` is the last stage reached before the failure.
    Failed { stage: Stage, reason: String },
}

impl DocumentState {
    pub fn is_indexed(&self) -> bool {
        matches!(self, DocumentState::Indexed)
    }
}

/// A chunk that could not be embedded.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkFailure {
    pub chunk_id: String,
    pub error: String,
}

/// Report of one document's trip through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub filename: String,
    pub state: DocumentState,
    pub elements: usize,
    pub element_types: BTreeMap<ElementType, usize>,
    pub chunks: usize,
    pub failed_chunks: Vec<ChunkFailure>,
}

impl IngestOutcome {
    pub fn new(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            state: DocumentState::Uploaded,
            elements: 0,
            element_types: BTreeMap::new(),
            chunks: 0,
            failed_chunks: Vec::new(),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            DocumentState::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(t: ElementType, content: &str) -> Element {
        Element {
            element_type: t,
            content: content.to_string(),
            metadata: ElementMetadata::default(),
        }
    }

    #[test]
    fn test_document_assigns_sequential_indices() {
        let doc = Document::new(
            "a.md".to_string(),
            PathBuf::from("/tmp/a.md"),
            vec![
                el(ElementType::Title, "T"),
                el(ElementType::NarrativeText, "p1"),
                el(ElementType::NarrativeText, "p2"),
            ],
        );
        let indices: Vec<u32> = doc
            .elements
            .iter()
            .map(|e| e.metadata.element_index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(doc.doc_metadata.element_types[&ElementType::NarrativeText], 2);
        assert_eq!(doc.doc_metadata.element_types[&ElementType::Title], 1);
    }

    #[test]
    fn test_element_type_roundtrip_names() {
        for t in ElementType::ALL {
            assert_eq!(ElementType::parse(t.as_str()), t);
        }
        assert_eq!(ElementType::parse("figure"), ElementType::Unknown);
    }

    #[test]
    fn test_element_type_serializes_snake_case() {
        let json = serde_json::to_string(&ElementType::NarrativeText).unwrap();
        assert_eq!(json, "\"narrative_text\"");
    }

    #[test]
    fn test_bounding_box_vertical_overlap() {
        let a = BoundingBox { x: 0, y: 10, width: 5, height: 10 };
        let b = BoundingBox { x: 50, y: 15, width: 5, height: 10 };
        let c = BoundingBox { x: 0, y: 20, width: 5, height: 5 };
        assert!(a.overlaps_vertically(&b));
        assert!(!a.overlaps_vertically(&c));
    }
}
