//! Integration tests for the non-text formats: hand-built PDFs and
//! generated PNGs, with a scripted OCR engine standing in for tesseract.

use image::{DynamicImage, GrayImage, Luma};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use doc_lens::config::ExtractionConfig;
use doc_lens::error::ExtractionError;
use doc_lens::extract::{ExtractOptions, Extractor};
use doc_lens::models::{BoundingBox, ElementType};
use doc_lens::ocr::{DisabledOcr, OcrEngine, OcrLine, OcrOutput};

/// Minimal valid PDF containing the text "quarterly phrase".
/// Builds body then xref with correct byte offsets so lopdf can parse it.
fn minimal_pdf_with_phrase() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(b"4 0 obj << /Length 48 >> stream\nBT /F1 12 Tf 100 700 Td (quarterly phrase) Tj ET\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o1).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o2).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o3).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o4).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o5).as_bytes());
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// One-page PDF with a text line per entry of `lines` and `image` drawn
/// as an uncompressed 8-bit gray image XObject.
fn pdf_with_image(lines: &[&str], image: &GrayImage) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(image.width()),
            "Height" => i64::from(image.height()),
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        image.as_raw().clone(),
    ));

    let mut operations = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
        operations.push(Operation::new(
            "Td",
            vec![72.into(), (720 - 20 * i as i64).into()],
        ));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("ET", vec![]));
    }
    operations.push(Operation::new("q", vec![]));
    operations.push(Operation::new(
        "cm",
        vec![200.into(), 0.into(), 0.into(), 200.into(), 100.into(), 300.into()],
    ));
    operations.push(Operation::new("Do", vec!["Im1".into()]));
    operations.push(Operation::new("Q", vec![]));
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => dictionary! { "Im1" => image_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// 200x200 white raster with a solid dark band in rows 80..150.
fn chart_raster() -> GrayImage {
    let mut img = GrayImage::from_pixel(200, 200, Luma([255u8]));
    for y in 80..150 {
        for x in 40..160 {
            img.put_pixel(x, y, Luma([30u8]));
        }
    }
    img
}

/// Returns the same lines for every image.
struct ScriptedOcr {
    lines: Vec<OcrLine>,
}

impl OcrEngine for ScriptedOcr {
    fn name(&self) -> &str {
        "scripted"
    }
    fn recognize(&self, _image: &DynamicImage) -> Result<OcrOutput, ExtractionError> {
        Ok(OcrOutput::from_lines(self.lines.clone()))
    }
}

fn ocr_line(text: &str, y: u32, height: u32, block: u32) -> OcrLine {
    OcrLine {
        text: text.to_string(),
        bbox: BoundingBox {
            x: 20,
            y,
            width: 160,
            height,
        },
        confidence: 0.9,
        block,
    }
}

fn write_chart_png(path: &Path) {
    chart_raster().save(path).unwrap();
}

fn scripted_extractor() -> Extractor {
    let ocr = ScriptedOcr {
        lines: vec![
            ocr_line("Sales Overview", 10, 20, 0),
            ocr_line("Figure 1: Monthly sales", 160, 15, 1),
        ],
    };
    Extractor::new(&ExtractionConfig::default(), Arc::new(ocr))
}

#[test]
fn test_pdf_native_text_parses() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("report.pdf");
    fs::write(&path, minimal_pdf_with_phrase()).unwrap();

    let extractor = Extractor::new(&ExtractionConfig::default(), Arc::new(DisabledOcr));
    let doc = extractor
        .extract(&path, &ExtractOptions::default())
        .unwrap();
    assert_eq!(doc.filename(), "report.pdf");
    assert_eq!(doc.doc_metadata.page_count, Some(1));
    assert!(doc.elements.iter().all(|e| e.metadata.page == Some(1)));
    assert!(doc
        .elements
        .iter()
        .any(|e| e.content.contains("quarterly phrase")));
}

#[test]
fn test_scanned_pdf_page_falls_back_to_ocr() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("scanned.pdf");
    fs::write(&path, pdf_with_image(&[], &chart_raster())).unwrap();

    let doc = scripted_extractor()
        .extract(&path, &ExtractOptions::default())
        .unwrap();
    assert_eq!(doc.doc_metadata.page_count, Some(1));

    let title = doc
        .elements
        .iter()
        .find(|e| e.element_type == ElementType::Title)
        .expect("OCR title");
    assert_eq!(title.content, "Sales Overview");
    assert_eq!(title.metadata.page, Some(1));
    assert!(title.metadata.source_confidence.is_some());

    let chart = doc
        .elements
        .iter()
        .find(|e| e.element_type == ElementType::Chart)
        .expect("chart from scanned page");
    assert!(chart.content.contains("Figure 1"));
    assert_eq!(chart.metadata.page, Some(1));
}

#[test]
fn test_scanned_pdf_page_without_ocr_has_no_elements() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("scanned.pdf");
    fs::write(&path, pdf_with_image(&[], &chart_raster())).unwrap();

    let options = ExtractOptions {
        use_ocr: false,
        extract_charts: false,
        ..Default::default()
    };
    let doc = scripted_extractor().extract(&path, &options).unwrap();
    assert_eq!(doc.doc_metadata.page_count, Some(1));
    assert!(doc.elements.is_empty());
}

#[test]
fn test_pdf_image_becomes_captioned_chart() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("figures.pdf");
    let lines = [
        "Quarterly revenue grew in every region this year.",
        "Figure 1: Revenue by region",
    ];
    fs::write(&path, pdf_with_image(&lines, &chart_raster())).unwrap();

    // Native text is long enough that OCR must not be consulted.
    let extractor = Extractor::new(&ExtractionConfig::default(), Arc::new(DisabledOcr));
    let doc = extractor
        .extract(&path, &ExtractOptions::default())
        .unwrap();

    assert!(doc
        .elements
        .iter()
        .any(|e| e.element_type != ElementType::Chart && e.content.contains("Quarterly revenue")));
    let charts: Vec<_> = doc
        .elements
        .iter()
        .filter(|e| e.element_type == ElementType::Chart)
        .collect();
    assert_eq!(charts.len(), 1);
    assert_eq!(charts[0].content, "Figure 1: Revenue by region");
    assert_eq!(charts[0].metadata.page, Some(1));

    let options = ExtractOptions {
        extract_charts: false,
        ..Default::default()
    };
    let doc = extractor.extract(&path, &options).unwrap();
    assert!(doc
        .elements
        .iter()
        .all(|e| e.element_type != ElementType::Chart));
}

#[test]
fn test_pdf_uppercase_extension_is_accepted() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("REPORT.PDF");
    fs::write(&path, minimal_pdf_with_phrase()).unwrap();
    let extractor = Extractor::new(&ExtractionConfig::default(), Arc::new(DisabledOcr));
    assert!(extractor.extract(&path, &ExtractOptions::default()).is_ok());
}

#[test]
fn test_corrupt_pdf_is_extraction_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broken.pdf");
    fs::write(&path, b"not a pdf at all, just some bytes").unwrap();
    let extractor = Extractor::new(&ExtractionConfig::default(), Arc::new(DisabledOcr));
    let err = extractor
        .extract(&path, &ExtractOptions::default())
        .unwrap_err();
    assert!(matches!(err, ExtractionError::Pdf(_)), "got {:?}", err);
}

#[test]
fn test_image_ocr_yields_title_and_captioned_chart() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("scan.png");
    write_chart_png(&path);

    let doc = scripted_extractor()
        .extract(&path, &ExtractOptions::default())
        .unwrap();
    assert_eq!(doc.doc_metadata.page_count, Some(1));

    let title = doc
        .elements
        .iter()
        .find(|e| e.element_type == ElementType::Title)
        .expect("title element");
    assert_eq!(title.content, "Sales Overview");
    assert_eq!(title.metadata.page, Some(1));
    assert!(title.metadata.source_confidence.is_some());

    let charts: Vec<_> = doc
        .elements
        .iter()
        .filter(|e| e.element_type == ElementType::Chart)
        .collect();
    assert_eq!(charts.len(), 1);
    assert!(charts[0].content.contains("Figure 1"));
    let bbox = charts[0].metadata.bounding_box.expect("chart bbox");
    assert_eq!(bbox.y, 80);
    assert_eq!(bbox.height, 70);

    let indices: Vec<u32> = doc.elements.iter().map(|e| e.metadata.element_index).collect();
    let expected: Vec<u32> = (0..doc.elements.len() as u32).collect();
    assert_eq!(indices, expected);
}

#[test]
fn test_image_without_chart_detection() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("scan.png");
    write_chart_png(&path);

    let options = ExtractOptions {
        extract_charts: false,
        ..Default::default()
    };
    let doc = scripted_extractor().extract(&path, &options).unwrap();
    assert!(doc
        .elements
        .iter()
        .all(|e| e.element_type != ElementType::Chart));
}

#[test]
fn test_image_without_ocr_is_placeholder() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("scan.png");
    write_chart_png(&path);

    let options = ExtractOptions {
        use_ocr: false,
        ..Default::default()
    };
    let doc = scripted_extractor().extract(&path, &options).unwrap();
    assert_eq!(doc.elements.len(), 1);
    assert_eq!(doc.elements[0].element_type, ElementType::Unknown);
    assert!(doc.elements[0].content.is_empty());
}

#[test]
fn test_undecodable_image_is_extraction_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.jpg");
    fs::write(&path, b"definitely not a jpeg").unwrap();
    let err = scripted_extractor()
        .extract(&path, &ExtractOptions::default())
        .unwrap_err();
    assert!(matches!(err, ExtractionError::Image(_)));
}

#[test]
fn test_disabled_ocr_surfaces_error_for_images() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("scan.png");
    write_chart_png(&path);
    let extractor = Extractor::new(&ExtractionConfig::default(), Arc::new(DisabledOcr));
    let err = extractor
        .extract(&path, &ExtractOptions::default())
        .unwrap_err();
    assert!(matches!(err, ExtractionError::Ocr(_)));
}
