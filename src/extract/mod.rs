//! Element extraction: one input file in, one [`Document`] out.
//!
//! Dispatch is by file extension (case-insensitive):
//!
//! | Extension | Handling |
//! |-----------|----------|
//! | `txt`, `md` | structural split into titles, list items, tables and paragraphs |
//! | `pdf` | native text per page, OCR fallback for scanned pages, figures as charts |
//! | `png`, `jpg`, `jpeg`, `tiff`, `tif`, `bmp` | OCR, then the same structural split plus chart regions |
//!
//! Extraction is synchronous; the orchestrator runs it on a blocking thread.
//! A file larger than `extraction.max_file_bytes` is rejected before it is
//! read. An empty file yields an empty document.

pub mod chart;
mod patterns;
mod pdf;
mod raster;
pub mod table;
pub mod text;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use crate::models::Document;
use crate::ocr::{create_ocr_engine, OcrEngine};
use text::{structure_text, TextContext};

/// Extensions accepted by [`Extractor::extract`].
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "pdf", "png", "jpg", "jpeg", "tiff", "tif", "bmp", "txt", "md",
];

/// Per-document extraction switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractOptions {
    pub use_ocr: bool,
    pub extract_tables: bool,
    pub extract_charts: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            use_ocr: true,
            extract_tables: true,
            extract_charts: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    PlainText,
    Markdown,
    Pdf,
    Image,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "txt" => Ok(FileKind::PlainText),
            "md" => Ok(FileKind::Markdown),
            "pdf" => Ok(FileKind::Pdf),
            "png" | "jpg" | "jpeg" | "tiff" | "tif" | "bmp" => Ok(FileKind::Image),
            "" => Err(ExtractionError::UnsupportedFileType(
                path.display().to_string(),
            )),
            other => Err(ExtractionError::UnsupportedFileType(other.to_string())),
        }
    }
}

/// True if `path` has an extension the extractor handles.
pub fn is_supported(path: &Path) -> bool {
    FileKind::from_path(path).is_ok()
}

/// Converts files into documents. Cheap to share across threads.
pub struct Extractor {
    pub(crate) ocr: Arc<dyn OcrEngine>,
    max_file_bytes: u64,
    pub(crate) min_native_text_chars: usize,
    pub(crate) min_chart_height: u32,
}

impl Extractor {
    pub fn new(config: &ExtractionConfig, ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            ocr,
            max_file_bytes: config.max_file_bytes,
            min_native_text_chars: config.min_native_text_chars,
            min_chart_height: config.min_chart_height,
        }
    }

    /// Build an extractor with the OCR engine named in the config.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config, create_ocr_engine(config))
    }

    /// Extract `path`, naming the document after the file's name.
    pub fn extract(&self, path: &Path, options: &ExtractOptions) -> Result<Document, ExtractionError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        self.extract_as(path, &filename, options)
    }

    /// Extract `path` but record `filename` as the document's name.
    ///
    /// Used for uploads, where the bytes sit in a temporary file.
    pub fn extract_as(
        &self,
        path: &Path,
        filename: &str,
        options: &ExtractOptions,
    ) -> Result<Document, ExtractionError> {
        let kind = FileKind::from_path(path)?;
        let io_err = |source| ExtractionError::Io {
            path: path.display().to_string(),
            source,
        };

        let size = std::fs::metadata(path).map_err(io_err)?.len();
        if size > self.max_file_bytes {
            return Err(ExtractionError::TooLarge {
                path: filename.to_string(),
                size,
                limit: self.max_file_bytes,
            });
        }
        if size == 0 {
            return Ok(Document::new(filename.to_string(), path.to_path_buf(), Vec::new()));
        }

        let bytes = std::fs::read(path).map_err(io_err)?;
        let (elements, page_count) = match kind {
            FileKind::PlainText | FileKind::Markdown => {
                let text = String::from_utf8_lossy(&bytes);
                let ctx = TextContext {
                    detect_tables: options.extract_tables,
                    infer_titles: kind == FileKind::PlainText,
                    ..Default::default()
                };
                (structure_text(&text, &ctx), None)
            }
            FileKind::Pdf => {
                let (elements, pages) = pdf::extract_pdf(&bytes, options, self)?;
                (elements, Some(pages))
            }
            FileKind::Image => (raster::extract_image(&bytes, options, self)?, Some(1)),
        };

        let mut doc = Document::new(filename.to_string(), path.to_path_buf(), elements);
        doc.doc_metadata.page_count = page_count;
        tracing::debug!(
            filename,
            elements = doc.elements.len(),
            pages = ?page_count,
            "extracted document"
        );
        Ok(doc)
    }
}
