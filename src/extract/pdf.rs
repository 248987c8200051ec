//! PDF extraction with lopdf.
//!
//! Pages are processed independently. A page whose native text layer is
//! (nearly) empty is treated as a scan: its embedded images are decoded
//! and OCR'd. Pages with real text get one `chart` element per embedded
//! image, captioned from the page text when a `Figure ...` line exists.
//! A page that fails to parse is logged and skipped.

use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Object, ObjectId, Stream};

use super::chart::caption_in_text;
use super::raster::ocr_raster;
use super::text::{structure_text, TextContext};
use super::{ExtractOptions, Extractor};
use crate::error::ExtractionError;
use crate::models::{Element, ElementMetadata, ElementType};

/// Images smaller than this on either side (bullets, rules, logos) are
/// not reported as charts.
const MIN_FIGURE_SIDE: u32 = 32;

/// Extract elements from PDF bytes. Returns the elements and page count.
pub(super) fn extract_pdf(
    bytes: &[u8],
    options: &ExtractOptions,
    extractor: &Extractor,
) -> Result<(Vec<Element>, u32), ExtractionError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))?;
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;
    let mut elements = Vec::new();

    for (page_num, page_id) in pages {
        let text = match doc.extract_text(&[page_num]) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(page = page_num, error = %e, "skipping unreadable PDF page");
                continue;
            }
        };
        let images = page_images(&doc, page_id);
        let native_chars = text.chars().filter(|c| !c.is_whitespace()).count();

        if native_chars < extractor.min_native_text_chars && options.use_ocr && !images.is_empty() {
            tracing::debug!(page = page_num, images = images.len(), "OCR fallback for scanned page");
            for img in &images {
                let raster = match decode_image(img.stream, img.width, img.height) {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(page = page_num, error = %e, "skipping undecodable page image");
                        continue;
                    }
                };
                match ocr_raster(&raster, page_num, options, extractor) {
                    Ok(found) => elements.extend(found),
                    Err(e) => {
                        tracing::warn!(page = page_num, error = %e, "OCR failed for page image");
                    }
                }
            }
            continue;
        }

        let ctx = TextContext {
            page: Some(page_num),
            bounding_box: None,
            confidence: None,
            detect_tables: options.extract_tables,
            infer_titles: true,
        };
        elements.extend(structure_text(&text, &ctx));

        if options.extract_charts {
            let caption = caption_in_text(&text).unwrap_or_default();
            for img in images
                .iter()
                .filter(|i| i.width >= MIN_FIGURE_SIDE && i.height >= MIN_FIGURE_SIDE)
            {
                tracing::debug!(page = page_num, width = img.width, height = img.height, "figure");
                elements.push(Element {
                    element_type: ElementType::Chart,
                    content: caption.clone(),
                    metadata: ElementMetadata {
                        page: Some(page_num),
                        ..Default::default()
                    },
                });
            }
        }
    }

    Ok((elements, page_count))
}

struct PageImage<'a> {
    width: u32,
    height: u32,
    stream: &'a Stream,
}

fn resolve_dict<'a>(doc: &'a lopdf::Document, obj: &'a Object) -> Option<&'a Dictionary> {
    doc.dereference(obj).ok()?.1.as_dict().ok()
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    dict.get(key)
        .ok()?
        .as_i64()
        .ok()
        .and_then(|v| u32::try_from(v).ok())
}

/// Image XObjects referenced directly from the page's resources.
fn page_images(doc: &lopdf::Document, page_id: ObjectId) -> Vec<PageImage<'_>> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    let Some(resources) = page
        .get(b"Resources")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
    else {
        return Vec::new();
    };
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
    else {
        return Vec::new();
    };

    let mut images = Vec::new();
    for (_, obj) in xobjects.iter() {
        let Ok((_, obj)) = doc.dereference(obj) else {
            continue;
        };
        let Ok(stream) = obj.as_stream() else {
            continue;
        };
        let is_image = stream
            .dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .map(|n| n == b"Image")
            .unwrap_or(false);
        if !is_image {
            continue;
        }
        let (Some(width), Some(height)) = (
            dict_u32(&stream.dict, b"Width"),
            dict_u32(&stream.dict, b"Height"),
        ) else {
            continue;
        };
        images.push(PageImage {
            width,
            height,
            stream,
        });
    }
    images
}

fn filter_names(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![n.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().ok().map(|n| n.to_vec()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Decode an image XObject into a raster.
///
/// JPEG streams (`DCTDecode`) are handed to the image crate. Other streams
/// are decompressed and read as 8-bit gray, RGB or CMYK samples.
fn decode_image(stream: &Stream, width: u32, height: u32) -> Result<DynamicImage, String> {
    let filters = filter_names(stream);
    if filters.iter().any(|f| f == b"DCTDecode") {
        return image::load_from_memory(&stream.content).map_err(|e| e.to_string());
    }
    if filters.iter().any(|f| f == b"JPXDecode" || f == b"JBIG2Decode" || f == b"CCITTFaxDecode") {
        return Err("unsupported image encoding".to_string());
    }

    let bits = dict_u32(&stream.dict, b"BitsPerComponent").unwrap_or(8);
    if bits != 8 {
        return Err(format!("unsupported bits per component: {}", bits));
    }

    let samples = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream.decompressed_content().map_err(|e| e.to_string())?
    };

    let pixels = (width as usize) * (height as usize);
    if pixels == 0 {
        return Err("empty image".to_string());
    }
    match samples.len() / pixels {
        1 => GrayImage::from_raw(width, height, samples[..pixels].to_vec())
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| "gray sample buffer too small".to_string()),
        3 => RgbImage::from_raw(width, height, samples[..pixels * 3].to_vec())
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| "RGB sample buffer too small".to_string()),
        4 => {
            let rgb: Vec<u8> = samples[..pixels * 4]
                .chunks_exact(4)
                .flat_map(|p| {
                    let k = 255 - p[3] as u16;
                    [p[0], p[1], p[2]].map(|c| ((255 - c as u16) * k / 255) as u8)
                })
                .collect();
            RgbImage::from_raw(width, height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| "CMYK sample buffer too small".to_string())
        }
        n => Err(format!("unsupported sample layout ({} bytes per pixel)", n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_decode_raw_gray_image() {
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "BitsPerComponent" => 8,
                "ColorSpace" => "DeviceGray",
            },
            vec![0, 255, 255, 0],
        );
        let img = decode_image(&stream, 2, 2).unwrap();
        assert_eq!(img.width(), 2);
        assert_eq!(img.to_luma8().get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let stream = Stream::new(dictionary! { "BitsPerComponent" => 8 }, vec![0, 1]);
        assert!(decode_image(&stream, 4, 4).is_err());
    }

    #[test]
    fn test_decode_rejects_one_bit_images() {
        let stream = Stream::new(dictionary! { "BitsPerComponent" => 1 }, vec![0; 8]);
        assert!(decode_image(&stream, 8, 8).unwrap_err().contains("bits per component"));
    }
}
