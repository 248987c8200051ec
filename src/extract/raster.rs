//! Raster input: standalone image files and scanned PDF pages.

use image::DynamicImage;

use super::chart::detect_chart_regions;
use super::text::{structure_text, TextContext};
use super::{ExtractOptions, Extractor};
use crate::error::ExtractionError;
use crate::models::{Element, ElementMetadata, ElementType};

/// Extract elements from an image file's bytes.
///
/// Without OCR the image is represented by a single empty `unknown`
/// element so the file still shows up in the collection.
pub(super) fn extract_image(
    bytes: &[u8],
    options: &ExtractOptions,
    extractor: &Extractor,
) -> Result<Vec<Element>, ExtractionError> {
    if !options.use_ocr {
        return Ok(vec![Element {
            element_type: ElementType::Unknown,
            content: String::new(),
            metadata: ElementMetadata {
                page: Some(1),
                ..Default::default()
            },
        }]);
    }

    let img = image::load_from_memory(bytes).map_err(|e| ExtractionError::Image(e.to_string()))?;
    ocr_raster(&img, 1, options, extractor)
}

/// OCR one raster and split the result into text, table and chart elements.
pub(super) fn ocr_raster(
    img: &DynamicImage,
    page: u32,
    options: &ExtractOptions,
    extractor: &Extractor,
) -> Result<Vec<Element>, ExtractionError> {
    let output = extractor.ocr.recognize(img)?;
    tracing::debug!(
        engine = extractor.ocr.name(),
        page,
        lines = output.lines.len(),
        confidence = output.confidence,
        "OCR complete"
    );

    let ctx = TextContext {
        page: Some(page),
        bounding_box: None,
        confidence: Some(output.confidence),
        detect_tables: options.extract_tables,
        infer_titles: true,
    };
    let mut elements = structure_text(&output.text, &ctx);

    if options.extract_charts {
        for region in detect_chart_regions(img, &output.lines, extractor.min_chart_height) {
            elements.push(Element {
                element_type: ElementType::Chart,
                content: region.caption,
                metadata: ElementMetadata {
                    page: Some(page),
                    bounding_box: Some(region.bbox),
                    source_confidence: Some(output.confidence),
                    element_index: 0,
                },
            });
        }
    }

    Ok(elements)
}
