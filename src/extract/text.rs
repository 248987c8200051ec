//! Structural split of plain text into elements.
//!
//! Used for `.txt`/`.md` files, native PDF page text and OCR output alike.
//! Lines are scanned once, top to bottom:
//!
//! - blank line: ends the current paragraph
//! - `# Heading`: `title`
//! - `- item` / `1. item`: `list_item`
//! - a table run (see [`table`](super::table)): one `table` element
//! - anything else: accumulates into a `narrative_text` paragraph
//!
//! Sources without markdown syntax (PDF text, OCR) also infer titles from
//! short standalone lines.

use super::patterns::patterns;
use super::table::detect_table;
use crate::models::{BoundingBox, Element, ElementMetadata, ElementType};

/// Longest standalone line treated as an inferred title.
const MAX_INFERRED_TITLE_CHARS: usize = 80;

/// Where a block of text came from and what to look for in it.
#[derive(Debug, Clone, Default)]
pub struct TextContext {
    pub page: Option<u32>,
    pub bounding_box: Option<BoundingBox>,
    pub confidence: Option<f32>,
    pub detect_tables: bool,
    /// Treat short standalone lines as titles (no markdown headings available).
    pub infer_titles: bool,
}

impl TextContext {
    fn element(&self, element_type: ElementType, content: String) -> Element {
        Element {
            element_type,
            content,
            metadata: ElementMetadata {
                page: self.page,
                bounding_box: self.bounding_box,
                source_confidence: self.confidence,
                element_index: 0,
            },
        }
    }
}

/// Split `text` into typed elements in reading order.
pub fn structure_text(text: &str, ctx: &TextContext) -> Vec<Element> {
    let lines: Vec<&str> = text.lines().collect();
    let mut elements = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if trimmed.is_empty() {
            flush_paragraph(&mut paragraph, &mut elements, ctx);
            i += 1;
            continue;
        }

        if ctx.detect_tables {
            if let Some(table) = detect_table(&lines[i..]) {
                flush_paragraph(&mut paragraph, &mut elements, ctx);
                elements.push(ctx.element(ElementType::Table, table.render()));
                i += table.lines_consumed;
                continue;
            }
        }

        if let Some(caps) = patterns().heading.captures(line) {
            flush_paragraph(&mut paragraph, &mut elements, ctx);
            let heading = caps.get(1).map(|m| m.as_str()).unwrap_or(trimmed);
            elements.push(ctx.element(ElementType::Title, heading.trim().to_string()));
            i += 1;
            continue;
        }

        if let Some(caps) = patterns().list_item.captures(line) {
            flush_paragraph(&mut paragraph, &mut elements, ctx);
            let item = caps.get(1).map(|m| m.as_str()).unwrap_or(trimmed);
            elements.push(ctx.element(ElementType::ListItem, collapse_whitespace(item)));
            i += 1;
            continue;
        }

        paragraph.push(trimmed);
        i += 1;
    }
    flush_paragraph(&mut paragraph, &mut elements, ctx);

    elements
}

fn flush_paragraph(paragraph: &mut Vec<&str>, elements: &mut Vec<Element>, ctx: &TextContext) {
    if paragraph.is_empty() {
        return;
    }
    let content = collapse_whitespace(&paragraph.join(" "));
    let element_type = if ctx.infer_titles && paragraph.len() == 1 && looks_like_title(&content) {
        ElementType::Title
    } else {
        ElementType::NarrativeText
    };
    elements.push(ctx.element(element_type, content));
    paragraph.clear();
}

fn looks_like_title(line: &str) -> bool {
    let count = line.chars().count();
    if count == 0 || count > MAX_INFERRED_TITLE_CHARS {
        return false;
    }
    if line.ends_with(['.', ',', ';', ':', '?', '!']) {
        return false;
    }
    let starts_upper = line.chars().next().is_some_and(|c| c.is_uppercase());
    let words = line.split_whitespace().count();
    starts_upper && words <= 12
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md() -> TextContext {
        TextContext {
            detect_tables: true,
            ..Default::default()
        }
    }

    fn types(elements: &[Element]) -> Vec<ElementType> {
        elements.iter().map(|e| e.element_type).collect()
    }

    #[test]
    fn test_markdown_structure() {
        let text = "# Quarterly Report\n\nSales grew in every region.\nMost of it came from new accounts.\n\n- North\n- South\n\n| Region | Q1 | Q2 | Q3 |\n|---|---|---|---|\n| North | 1 | 2 | 3 |\n| South | 4 | 5 | 6 |\n\nClosing remarks.";
        let elements = structure_text(text, &md());
        assert_eq!(
            types(&elements),
            vec![
                ElementType::Title,
                ElementType::NarrativeText,
                ElementType::ListItem,
                ElementType::ListItem,
                ElementType::Table,
                ElementType::NarrativeText,
            ]
        );
        assert_eq!(elements[0].content, "Quarterly Report");
        assert_eq!(
            elements[1].content,
            "Sales grew in every region. Most of it came from new accounts."
        );
        assert_eq!(elements[2].content, "North");
        assert!(elements[4].content.starts_with("Region | Q1 | Q2 | Q3"));
    }

    #[test]
    fn test_tables_disabled_flow_into_prose() {
        let text = "| a | b |\n| c | d |";
        let ctx = TextContext::default();
        let elements = structure_text(text, &ctx);
        assert_eq!(types(&elements), vec![ElementType::NarrativeText]);
        assert!(elements[0].content.contains("| a | b |"));
    }

    #[test]
    fn test_numbered_list_items() {
        let elements = structure_text("1. first\n2) second", &md());
        assert_eq!(types(&elements), vec![ElementType::ListItem; 2]);
        assert_eq!(elements[1].content, "second");
    }

    #[test]
    fn test_inferred_titles_only_when_enabled() {
        let text = "Introduction\n\nThe body text of the section ends with a period.";
        let plain = structure_text(text, &md());
        assert_eq!(plain[0].element_type, ElementType::NarrativeText);

        let ctx = TextContext {
            infer_titles: true,
            ..md()
        };
        let inferred = structure_text(text, &ctx);
        assert_eq!(inferred[0].element_type, ElementType::Title);
        assert_eq!(inferred[1].element_type, ElementType::NarrativeText);
    }

    #[test]
    fn test_page_and_confidence_propagate() {
        let ctx = TextContext {
            page: Some(3),
            confidence: Some(0.8),
            ..md()
        };
        let elements = structure_text("Some words here.", &ctx);
        assert_eq!(elements[0].metadata.page, Some(3));
        assert_eq!(elements[0].metadata.source_confidence, Some(0.8));
    }

    #[test]
    fn test_empty_text_has_no_elements() {
        assert!(structure_text("", &md()).is_empty());
        assert!(structure_text("\n\n  \n", &md()).is_empty());
    }
}
