//! Chart and figure region detection.
//!
//! For raster input the page is scanned row by row. Rows covered by an OCR
//! text line are masked out; what remains is grouped into horizontal bands
//! of "ink" (pixels darker than the background). A band at least
//! `min_height` pixels tall is reported as a chart region, captioned by the
//! OCR lines directly above or below it.

use image::DynamicImage;

use super::patterns::patterns;
use crate::models::BoundingBox;
use crate::ocr::OcrLine;

/// Luma value below which a pixel counts as ink.
const INK_THRESHOLD: u8 = 200;
/// Blank rows tolerated inside one band (gridlines, bar gaps).
const MAX_ROW_GAP: u32 = 3;
/// Text lines within this many pixels of a band caption it.
const CAPTION_DISTANCE: u32 = 24;

/// A detected chart region and its caption text (possibly empty).
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRegion {
    pub bbox: BoundingBox,
    pub caption: String,
}

/// Find chart bands in `image` that no OCR text line overlaps.
pub fn detect_chart_regions(
    image: &DynamicImage,
    text_lines: &[OcrLine],
    min_height: u32,
) -> Vec<ChartRegion> {
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }
    // Ignore specks: a row needs a minimum amount of ink.
    let min_ink = (width / 100).max(2);

    let text_row = |y: u32| {
        text_lines
            .iter()
            .any(|l| y >= l.bbox.y && y < l.bbox.bottom())
    };

    let mut ink_rows = Vec::with_capacity(height as usize);
    for y in 0..height {
        if text_row(y) {
            ink_rows.push(false);
            continue;
        }
        let ink = (0..width)
            .filter(|&x| gray.get_pixel(x, y).0[0] < INK_THRESHOLD)
            .count() as u32;
        ink_rows.push(ink >= min_ink);
    }

    let mut regions = Vec::new();
    for (top, bottom) in ink_bands(&ink_rows) {
        let band_height = bottom - top;
        if band_height < min_height {
            continue;
        }
        let (left, right) = horizontal_extent(&gray, top, bottom);
        let bbox = BoundingBox {
            x: left,
            y: top,
            width: right.saturating_sub(left),
            height: band_height,
        };
        let caption = caption_for(&bbox, text_lines);
        regions.push(ChartRegion { bbox, caption });
    }
    regions
}

/// Group ink rows into `[top, bottom)` bands, bridging short gaps.
fn ink_bands(ink_rows: &[bool]) -> Vec<(u32, u32)> {
    let mut bands = Vec::new();
    let mut start: Option<u32> = None;
    let mut last_ink = 0u32;

    for (y, &ink) in ink_rows.iter().enumerate() {
        let y = y as u32;
        if ink {
            match start {
                Some(_) if y - last_ink - 1 <= MAX_ROW_GAP => {}
                Some(s) => {
                    bands.push((s, last_ink + 1));
                    start = Some(y);
                }
                None => start = Some(y),
            }
            last_ink = y;
        }
    }
    if let Some(s) = start {
        bands.push((s, last_ink + 1));
    }
    bands
}

fn horizontal_extent(gray: &image::GrayImage, top: u32, bottom: u32) -> (u32, u32) {
    let (width, _) = gray.dimensions();
    let mut left = width;
    let mut right = 0;
    for y in top..bottom {
        for x in 0..width {
            if gray.get_pixel(x, y).0[0] < INK_THRESHOLD {
                left = left.min(x);
                right = right.max(x + 1);
            }
        }
    }
    if left > right {
        (0, width)
    } else {
        (left, right)
    }
}

/// Text lines touching the band, top to bottom. Caption-style lines
/// (`Figure 2: ...`) win over plain adjacent labels when both are present.
fn caption_for(bbox: &BoundingBox, text_lines: &[OcrLine]) -> String {
    let adjacent: Vec<&OcrLine> = text_lines
        .iter()
        .filter(|l| {
            let gap = if l.bbox.y >= bbox.bottom() {
                l.bbox.y - bbox.bottom()
            } else if l.bbox.bottom() <= bbox.y {
                bbox.y - l.bbox.bottom()
            } else {
                0
            };
            gap <= CAPTION_DISTANCE
        })
        .collect();

    let captions: Vec<&str> = adjacent
        .iter()
        .filter(|l| patterns().caption.is_match(&l.text))
        .map(|l| l.text.as_str())
        .collect();
    if !captions.is_empty() {
        return captions.join("\n");
    }
    adjacent
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// First caption-style line in page text (`Figure 1: ...`), used for PDF
/// images where no geometry is available.
pub fn caption_in_text(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|l| patterns().caption.is_match(l))
        .map(|l| l.to_string())
}
