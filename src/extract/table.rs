//! Table detection in line-oriented text.
//!
//! A table is a run of at least two consecutive rows that split into the
//! same number of cells (two or more) using one delimiter style:
//!
//! | Style | Row looks like |
//! |-------|----------------|
//! | pipe | `| a | b | c |` or `a | b | c` |
//! | tab | `a\tb\tc` (OCR emits tabs for wide column gaps) |
//! | spaces | `a   b   c` (two or more spaces between short cells) |
//!
//! Markdown separator rows (`|---|:---:|`) are consumed but not rendered.
//! Detected tables are rendered row-major, one row per line, cells joined
//! by ` | `.

use super::patterns::patterns;

/// Longest cell accepted in a space-aligned row. Keeps prose with double
/// spaces after full stops from reading as a table.
const MAX_SPACED_CELL_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Pipe,
    Tab,
    Spaces,
}

const DELIMITERS: [Delimiter; 3] = [Delimiter::Pipe, Delimiter::Tab, Delimiter::Spaces];

/// A table found at the start of a slice of lines.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedTable {
    /// Number of input lines the table spans, separator rows included.
    pub lines_consumed: usize,
    pub rows: Vec<Vec<String>>,
}

impl DetectedTable {
    /// Row-major rendering: one line per row, cells joined by ` | `.
    pub fn render(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.join(" | "))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// True for markdown header separator rows such as `|---|:---:|`.
pub fn is_separator_row(line: &str) -> bool {
    line.contains('-') && patterns().separator.is_match(line)
}

fn split_cells(line: &str, delimiter: Delimiter) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cells: Vec<String> = match delimiter {
        Delimiter::Pipe => {
            if !trimmed.contains('|') {
                return None;
            }
            let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
            let inner = inner.strip_suffix('|').unwrap_or(inner);
            inner.split('|').map(|c| c.trim().to_string()).collect()
        }
        Delimiter::Tab => {
            if !trimmed.contains('\t') {
                return None;
            }
            trimmed
                .split('\t')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect()
        }
        Delimiter::Spaces => {
            let cells: Vec<String> = patterns()
                .multi_space
                .split(trimmed)
                .map(|c| c.trim().to_string())
                .collect();
            if cells
                .iter()
                .any(|c| c.is_empty() || c.chars().count() > MAX_SPACED_CELL_CHARS)
            {
                return None;
            }
            cells
        }
    };
    if cells.len() < 2 {
        return None;
    }
    Some(cells)
}

/// Detect a table starting at `lines[0]`.
///
/// Returns `None` unless at least two data rows agree on delimiter style
/// and cell count.
pub fn detect_table(lines: &[&str]) -> Option<DetectedTable> {
    let first = lines.first()?;
    for delimiter in DELIMITERS {
        let Some(header) = split_cells(first, delimiter) else {
            continue;
        };
        let width = header.len();
        let mut rows = vec![header];
        let mut consumed = 1;

        for line in &lines[1..] {
            if delimiter == Delimiter::Pipe && is_separator_row(line) {
                consumed += 1;
                continue;
            }
            match split_cells(line, delimiter) {
                Some(cells) if cells.len() == width => {
                    rows.push(cells);
                    consumed += 1;
                }
                _ => break,
            }
        }

        if rows.len() >= 2 {
            return Some(DetectedTable {
                lines_consumed: consumed,
                rows,
            });
        }
    }
    None
}
