//! OCR capability.
//!
//! The extractor only depends on the [`OcrEngine`] trait. Two engines ship:
//! - **[`TesseractOcr`]**: runs the `tesseract` binary in TSV mode, which
//!   gives per-word boxes and confidences.
//! - **[`DisabledOcr`]**: always fails; used when `extraction.ocr_engine = "disabled"`.
//!
//! Word boxes are regrouped into [`OcrLine`]s. Wide horizontal gaps between
//! words on one line become tab characters so that grid-like layouts survive
//! into the text and can be picked up by table detection.

use image::DynamicImage;
use std::collections::BTreeMap;
use std::process::Command;
use std::sync::Arc;

use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use crate::models::BoundingBox;

/// One recognized line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrLine {
    pub text: String,
    pub bbox: BoundingBox,
    /// Mean word confidence in `[0, 1]`.
    pub confidence: f32,
    /// Tesseract block number; lines in different blocks are separate paragraphs.
    pub block: u32,
}

/// Result of recognizing one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrOutput {
    /// Full text: lines joined by `\n`, blocks separated by a blank line.
    pub text: String,
    /// Mean word confidence in `[0, 1]`; `0.0` when nothing was recognized.
    pub confidence: f32,
    pub lines: Vec<OcrLine>,
}

impl OcrOutput {
    /// Build the joined text and overall confidence from recognized lines.
    pub fn from_lines(lines: Vec<OcrLine>) -> Self {
        let mut text = String::new();
        let mut prev_block = None;
        for line in &lines {
            if let Some(b) = prev_block {
                text.push_str(if b == line.block { "\n" } else { "\n\n" });
            }
            text.push_str(&line.text);
            prev_block = Some(line.block);
        }
        let confidence = if lines.is_empty() {
            0.0
        } else {
            lines.iter().map(|l| l.confidence).sum::<f32>() / lines.len() as f32
        };
        Self {
            text,
            confidence,
            lines,
        }
    }
}

/// Trait for OCR backends.
///
/// Called from blocking extraction code, so implementations may do
/// synchronous I/O.
pub trait OcrEngine: Send + Sync {
    /// Engine identifier used in logs.
    fn name(&self) -> &str;

    /// Recognize text in `image`.
    fn recognize(&self, image: &DynamicImage) -> Result<OcrOutput, ExtractionError>;
}

/// An OCR engine that always fails.
pub struct DisabledOcr;

impl OcrEngine for DisabledOcr {
    fn name(&self) -> &str {
        "disabled"
    }

    fn recognize(&self, _image: &DynamicImage) -> Result<OcrOutput, ExtractionError> {
        Err(ExtractionError::Ocr("OCR engine is disabled".to_string()))
    }
}

/// OCR via the Tesseract command-line tool.
///
/// The image is written to a temporary PNG that is removed when the call
/// returns, whether recognition succeeded or not.
pub struct TesseractOcr {
    binary: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }
}

impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<OcrOutput, ExtractionError> {
        let tmp = tempfile::Builder::new()
            .prefix("lens-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| ExtractionError::Ocr(format!("could not create temp file: {}", e)))?;

        image
            .save_with_format(tmp.path(), image::ImageFormat::Png)
            .map_err(|e| ExtractionError::Ocr(format!("could not write temp image: {}", e)))?;

        let output = Command::new(&self.binary)
            .arg(tmp.path())
            .arg("stdout")
            .args(["-l", &self.language])
            .arg("tsv")
            .output()
            .map_err(|e| {
                ExtractionError::Ocr(format!(
                    "failed to execute '{}' (is tesseract installed?): {}",
                    self.binary, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Ocr(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        Ok(OcrOutput::from_lines(parse_tesseract_tsv(&tsv)))
    }
}

/// Create the OCR engine named in the extraction config.
pub fn create_ocr_engine(config: &ExtractionConfig) -> Arc<dyn OcrEngine> {
    match config.ocr_engine.as_str() {
        "tesseract" => Arc::new(TesseractOcr::new(
            config.tesseract_path.clone(),
            config.ocr_language.clone(),
        )),
        _ => Arc::new(DisabledOcr),
    }
}

struct Word {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
    conf: f32,
    text: String,
}

/// Parse Tesseract TSV output into lines, in reading order.
///
/// Columns: `level page_num block_num par_num line_num word_num left top
/// width height conf text`. Only level-5 (word) rows with non-empty text
/// are used.
pub fn parse_tesseract_tsv(tsv: &str) -> Vec<OcrLine> {
    let mut grouped: BTreeMap<(u32, u32, u32), Vec<Word>> = BTreeMap::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.splitn(12, '\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }
        let num = |i: usize| cols[i].trim().parse::<u32>().unwrap_or(0);
        let conf = cols[10].trim().parse::<f32>().unwrap_or(-1.0);
        grouped
            .entry((num(2), num(3), num(4)))
            .or_default()
            .push(Word {
                left: num(6),
                top: num(7),
                width: num(8),
                height: num(9),
                conf,
                text: text.to_string(),
            });
    }

    grouped
        .into_iter()
        .map(|((block, _, _), mut words)| {
            words.sort_by_key(|w| w.left);
            words_to_line(block, &words)
        })
        .collect()
}

fn words_to_line(block: u32, words: &[Word]) -> OcrLine {
    let x0 = words.iter().map(|w| w.left).min().unwrap_or(0);
    let y0 = words.iter().map(|w| w.top).min().unwrap_or(0);
    let x1 = words.iter().map(|w| w.left + w.width).max().unwrap_or(0);
    let y1 = words.iter().map(|w| w.top + w.height).max().unwrap_or(0);
    let line_height = (y1 - y0).max(1);

    let mut text = String::new();
    let mut prev_right: Option<u32> = None;
    for w in words {
        if let Some(right) = prev_right {
            let gap = w.left.saturating_sub(right);
            // A gap wider than the line is tall is a column break.
            if gap as f32 > line_height as f32 * 1.2 {
                text.push('\t');
            } else {
                text.push(' ');
            }
        }
        text.push_str(&w.text);
        prev_right = Some(w.left + w.width);
    }

    let confs: Vec<f32> = words.iter().map(|w| w.conf).filter(|c| *c >= 0.0).collect();
    let confidence = if confs.is_empty() {
        0.0
    } else {
        (confs.iter().sum::<f32>() / confs.len() as f32 / 100.0).clamp(0.0, 1.0)
    };

    OcrLine {
        text,
        bbox: BoundingBox {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        },
        confidence,
        block,
    }
}
