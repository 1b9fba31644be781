use image::GrayImage;
use thiserror::Error;

use crate::types::{BoundingBox, Detection};

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("Detector engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available — build with `tesseract` feature")]
    NotAvailable,
}

/// Abstraction over a text-detection engine.
///
/// Implementations take a preprocessed grayscale image and return every
/// recognized text span with its confidence and position. The call is an
/// opaque synchronous boundary; timeout and cancellation belong to the
/// caller.
pub trait DetectionSource: Send + Sync {
    fn detect(&self, image: &GrayImage) -> Result<Vec<Detection>, DetectError>;
}

// ── Mock source (always available, used for tests) ────────────────────────────

/// Returns a pre-set detection list regardless of input — useful for unit
/// testing fusion and extraction without an OCR engine installed.
pub struct MockDetector {
    detections: Vec<Detection>,
}

impl MockDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    /// A source that never detects anything.
    pub fn empty() -> Self {
        Self { detections: Vec::new() }
    }

    /// Build a source from `(text, confidence)` pairs, synthesizing one
    /// bounding-box row per entry (20 px tall, stacked top to bottom).
    pub fn from_lines(lines: &[(&str, f32)]) -> Self {
        let detections = lines
            .iter()
            .enumerate()
            .map(|(i, (text, confidence))| {
                let y = i as f32 * 20.0;
                Detection::new(*text, *confidence, BoundingBox::new(0.0, y, 200.0, y + 18.0))
            })
            .collect();
        Self { detections }
    }
}

impl DetectionSource for MockDetector {
    fn detect(&self, _image: &GrayImage) -> Result<Vec<Detection>, DetectError> {
        Ok(self.detections.clone())
    }
}

/// A source that always fails — exercises the orchestrator's per-variant
/// error isolation in tests.
#[cfg(test)]
pub struct FailingDetector;

#[cfg(test)]
impl DetectionSource for FailingDetector {
    fn detect(&self, _image: &GrayImage) -> Result<Vec<Detection>, DetectError> {
        Err(DetectError::Engine("simulated failure".into()))
    }
}

// ── Tesseract source (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_source {
    use super::{DetectError, DetectionSource};
    use crate::types::{BoundingBox, Detection};
    use image::GrayImage;
    use leptess::LepTess;
    use std::io::Cursor;

    pub struct TesseractDetector {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractDetector {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    impl DetectionSource for TesseractDetector {
        fn detect(&self, image: &GrayImage) -> Result<Vec<Detection>, DetectError> {
            let mut png = Vec::new();
            image::DynamicImage::ImageLuma8(image.clone())
                .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
                .map_err(|e| DetectError::ImageDecode(e.to_string()))?;

            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| DetectError::Engine(e.to_string()))?;
            lt.set_image_from_mem(&png)
                .map_err(|e| DetectError::ImageDecode(e.to_string()))?;
            let text = lt
                .get_utf8_text()
                .map_err(|e| DetectError::Engine(e.to_string()))?;
            let confidence = (lt.mean_text_conf() as f32 / 100.0).clamp(0.0, 1.0);

            // Tesseract reports page-level text; synthesize one detection
            // per line with an even vertical split of the page.
            let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
            let row_height = image.height() as f32 / lines.len().max(1) as f32;
            Ok(lines
                .iter()
                .enumerate()
                .map(|(i, line)| {
                    let y = i as f32 * row_height;
                    Detection::new(
                        line.trim(),
                        confidence,
                        BoundingBox::new(0.0, y, image.width() as f32, y + row_height),
                    )
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_image() -> GrayImage {
        GrayImage::from_pixel(8, 8, image::Luma([255u8]))
    }

    #[test]
    fn mock_returns_preset_detections() {
        let src = MockDetector::from_lines(&[("Total: $5.50", 0.9)]);
        let out = src.detect(&blank_image()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "Total: $5.50");
        assert_eq!(out[0].confidence, 0.9);
    }

    #[test]
    fn mock_from_lines_stacks_rows_vertically() {
        let src = MockDetector::from_lines(&[("a line", 0.5), ("b line", 0.5)]);
        let out = src.detect(&blank_image()).unwrap();
        assert!(out[0].bbox.y1 < out[1].bbox.y1);
    }

    #[test]
    fn empty_mock_detects_nothing() {
        assert!(MockDetector::empty().detect(&blank_image()).unwrap().is_empty());
    }
}
