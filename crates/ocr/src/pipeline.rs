use std::path::{Path, PathBuf};
use std::time::Instant;

use image::DynamicImage;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use spesa_core::{Currency, ExpenseCategory, ExtractionConfig, ReceiptRecord, UNTITLED_TITLE};

use crate::detector::DetectionSource;
use crate::extract::{amount, date, title};
use crate::fusion::fuse;
use crate::layout;
use crate::quality::{aggregate_confidence, image_quality, FieldConfidences};
use crate::types::Detection;
use crate::variants;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),
}

/// What the pipeline hands the caller: the contract record plus
/// transport-level context.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutcome {
    pub record: ReceiptRecord,
    /// Weighted overall confidence (see quality module).
    pub confidence: f32,
    pub category: ExpenseCategory,
    /// Detected language code keying the structured-mode tables.
    pub language: String,
    /// Number of lines that survived fusion. Zero is the only externally
    /// meaningful failure signal.
    pub usable_detections: usize,
}

/// The result of processing one file on disk.
#[derive(Debug)]
pub struct FileOutcome {
    /// SHA-256 hex digest of the original file — the content-addressed key.
    pub hash_hex: String,
    pub elapsed_ms: u128,
    pub outcome: ExtractionOutcome,
}

/// The extraction pipeline: variants → fusion → field extractors →
/// record → confidence aggregation. One instance per concurrent request;
/// instances share no mutable state.
pub struct ExtractionPipeline<D: DetectionSource> {
    source: D,
    config: ExtractionConfig,
}

impl<D: DetectionSource> ExtractionPipeline<D> {
    pub fn new(source: D) -> Self {
        Self { source, config: ExtractionConfig::default() }
    }

    pub fn with_config(source: D, config: ExtractionConfig) -> Self {
        Self { source, config }
    }

    /// Extract a structured record from an image. Never fails: malformed
    /// or empty input degrades to default field values.
    pub fn extract(&self, image: &DynamicImage) -> ExtractionOutcome {
        let gray = image.to_luma8();
        let quality = image_quality(&gray, &self.config);
        let detections = variants::run_variants(&self.source, &gray, &self.config);
        self.extract_from_detections(detections, quality)
    }

    /// Run fusion and the extractors over an externally supplied detection
    /// list. `quality` is the caller's image-quality estimate (0 when
    /// unknown).
    pub fn extract_from_detections(
        &self,
        detections: Vec<Detection>,
        quality: f32,
    ) -> ExtractionOutcome {
        let lines = fuse(detections);
        if lines.is_empty() {
            warn!("zero usable detections survived fusion");
            return ExtractionOutcome {
                record: ReceiptRecord::empty(),
                confidence: aggregate_confidence(&FieldConfidences::default(), quality),
                category: ExpenseCategory::Other,
                language: "en".to_string(),
                usable_detections: 0,
            };
        }

        let title = title::extract_title(&lines);
        let date = date::extract_date(&lines, &self.config);
        let amount = amount::extract_amount_with_cap(&lines, self.config.fallback_amount_cap);

        let fields = FieldConfidences {
            merchant: title.score.min(1.0),
            date: date.as_ref().map_or(0.0, |d| d.score.min(1.0)),
            total: amount.as_ref().map_or(0.0, |a| a.score.min(1.0)),
            // The flat extractors do not pull a tax line; structured mode does.
            tax: 0.0,
        };
        let confidence = aggregate_confidence(&fields, quality);

        let joined = lines
            .iter()
            .map(|l| l.normalized_text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let category = ExpenseCategory::classify(&joined);
        let language = layout::detect_language(&joined).to_string();

        let usable_detections = lines.len();
        let record = ReceiptRecord {
            title: title.value,
            date: date.map(|d| d.canonical).unwrap_or_default(),
            amount: amount.as_ref().map_or(0.0, |a| a.value),
            currency: amount.map_or(Currency::Unknown, |a| a.currency),
            raw_text: lines.into_iter().map(|l| l.raw_text).collect(),
        };
        info!(
            title = %record.title,
            date = %record.date,
            amount = record.amount,
            currency = %record.currency,
            confidence,
            "extraction finished"
        );

        ExtractionOutcome {
            record,
            confidence,
            category,
            language,
            usable_detections,
        }
    }

    /// Structured line-grouping mode: one detector pass, physical-line
    /// clustering, per-language table classification. Same record shape,
    /// plus a real tax confidence for the aggregate.
    pub fn extract_structured(&self, image: &DynamicImage) -> ExtractionOutcome {
        let gray = image.to_luma8();
        let quality = image_quality(&gray, &self.config);

        let detections = match self.source.detect(&variants::default_preprocess(&gray)) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "structured-mode detection failed");
                Vec::new()
            }
        };
        let structured = layout::extract_structured(&detections, &self.config);

        let fields = FieldConfidences {
            merchant: structured.merchant.as_ref().map_or(0.0, |f| f.confidence),
            date: structured.date.as_ref().map_or(0.0, |f| f.confidence),
            total: structured.total.as_ref().map_or(0.0, |f| f.confidence),
            tax: structured.tax.as_ref().map_or(0.0, |f| f.confidence),
        };
        let confidence = aggregate_confidence(&fields, quality);

        // Same output invariants as the flat mode: unique raw lines in
        // descending-confidence order.
        let mut raw_lines: Vec<(String, f32)> = Vec::new();
        for line in &structured.lines {
            if !raw_lines.iter().any(|(text, _)| text == &line.text) {
                raw_lines.push((line.text.clone(), line.confidence));
            }
        }
        raw_lines.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let joined = raw_lines
            .iter()
            .map(|(text, _)| text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let category = ExpenseCategory::classify(&joined);
        let usable_detections = raw_lines.len();

        let record = ReceiptRecord {
            title: structured
                .merchant
                .map_or_else(|| UNTITLED_TITLE.to_string(), |f| f.value),
            date: structured.date.map_or_else(String::new, |f| f.value),
            amount: structured.total.as_ref().map_or(0.0, |f| f.value),
            currency: structured.currency,
            raw_text: raw_lines.into_iter().map(|(text, _)| text).collect(),
        };

        ExtractionOutcome {
            record,
            confidence,
            category,
            language: structured.language.to_string(),
            usable_detections,
        }
    }

    /// Process a file on disk: read, decode, hash, extract.
    pub async fn process_file(&self, path: &Path) -> Result<FileOutcome, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        let started = Instant::now();
        let image = image::load_from_memory(&bytes)?;
        let hash_hex = crate::hash::to_hex(&crate::hash::sha256_bytes(&bytes));

        let outcome = self.extract(&image);
        Ok(FileOutcome {
            hash_hex,
            elapsed_ms: started.elapsed().as_millis(),
            outcome,
        })
    }
}

// ── Watch-folder integration ──────────────────────────────────────────────────

/// Spawn a notify watcher on `watch_dir` that sends newly created file
/// paths to `tx`. The returned watcher must be kept alive for watching to
/// continue.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{EventKind, RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        if let Ok(ev) = event {
            if matches!(ev.kind, EventKind::Create(_)) {
                for path in ev.paths {
                    let _ = tx.try_send(path);
                }
            }
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::MockDetector;
    use crate::types::{BoundingBox, VariantKind};
    use image::{GrayImage, ImageBuffer, Luma};
    use std::io::Cursor;

    fn tiny_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(8, 8, |x, _| Luma([(x * 30) as u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn receipt_detections() -> Vec<Detection> {
        let mut dets = Vec::new();
        for (i, (text, confidence)) in [
            ("Total: $33.71", 0.9f32),
            ("Date: 03/15/2024", 0.85),
            ("DOMINO'S PIZZA", 0.95),
        ]
        .iter()
        .enumerate()
        {
            let y = i as f32 * 20.0;
            let mut d =
                Detection::new(*text, *confidence, BoundingBox::new(0.0, y, 200.0, y + 18.0));
            d.variant = VariantKind::Binary;
            dets.push(d);
        }
        dets
    }

    #[test]
    fn end_to_end_receipt_scenario() {
        let pipeline = ExtractionPipeline::new(MockDetector::empty());
        let outcome = pipeline.extract_from_detections(receipt_detections(), 0.8);

        assert_eq!(outcome.record.title, "DOMINO'S PIZZA");
        assert_eq!(outcome.record.date, "03/15/2024");
        assert_eq!(outcome.record.amount, 33.71);
        assert_eq!(outcome.record.currency, Currency::Usd);
        assert_eq!(outcome.category, ExpenseCategory::Food);
        assert_eq!(outcome.usable_detections, 3);
    }

    #[test]
    fn raw_text_ordered_by_confidence() {
        let pipeline = ExtractionPipeline::new(MockDetector::empty());
        let outcome = pipeline.extract_from_detections(receipt_detections(), 0.0);
        assert_eq!(
            outcome.record.raw_text,
            vec!["DOMINO'S PIZZA", "Total: $33.71", "Date: 03/15/2024"]
        );
    }

    #[test]
    fn extraction_is_idempotent() {
        let pipeline = ExtractionPipeline::new(MockDetector::empty());
        let a = pipeline.extract_from_detections(receipt_detections(), 0.5);
        let b = pipeline.extract_from_detections(receipt_detections(), 0.5);
        assert_eq!(a, b);
    }

    #[test]
    fn zero_detections_degrades_to_defaults() {
        let pipeline = ExtractionPipeline::new(MockDetector::empty());
        let outcome = pipeline.extract_from_detections(Vec::new(), 0.0);

        assert_eq!(outcome.usable_detections, 0);
        assert_eq!(outcome.record.title, UNTITLED_TITLE);
        assert_eq!(outcome.record.date, "");
        assert_eq!(outcome.record.amount, 0.0);
        assert_eq!(outcome.record.currency, Currency::Unknown);
        assert_eq!(outcome.confidence, 0.0);
    }

    #[test]
    fn extract_runs_full_pipeline_over_mock_source() {
        let source = MockDetector::from_lines(&[
            ("STARBUCKS COFFEE", 0.95),
            ("Total: $5.50", 0.9),
        ]);
        let pipeline = ExtractionPipeline::new(source);
        let image = image::load_from_memory(&tiny_png()).unwrap();
        let outcome = pipeline.extract(&image);

        assert_eq!(outcome.record.title, "STARBUCKS COFFEE");
        assert_eq!(outcome.record.amount, 5.5);
        assert_eq!(outcome.record.currency, Currency::Usd);
    }

    #[test]
    fn structured_mode_produces_same_record_shape() {
        let source = MockDetector::from_lines(&[
            ("Main Store", 0.9),
            ("Date: 13/3/2024", 0.85),
            ("Total ₹450.00", 0.9),
        ]);
        let pipeline = ExtractionPipeline::new(source);
        let image = image::load_from_memory(&tiny_png()).unwrap();
        let outcome = pipeline.extract_structured(&image);

        assert_eq!(outcome.record.title, "Main Store");
        assert_eq!(outcome.record.date, "03/13/2024");
        assert_eq!(outcome.record.amount, 450.0);
        assert_eq!(outcome.record.currency, Currency::Inr);
    }

    #[tokio::test]
    async fn process_file_hashes_and_extracts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.png");
        tokio::fs::write(&path, tiny_png()).await.unwrap();

        let pipeline = ExtractionPipeline::new(MockDetector::from_lines(&[
            ("CORNER CAFE", 0.9),
            ("Total: $12.00", 0.9),
        ]));
        let result = pipeline.process_file(&path).await.unwrap();

        assert_eq!(result.hash_hex.len(), 64);
        assert_eq!(result.outcome.record.amount, 12.0);
    }

    #[tokio::test]
    async fn process_file_rejects_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-an-image.png");
        tokio::fs::write(&path, b"plain text").await.unwrap();

        let pipeline = ExtractionPipeline::new(MockDetector::empty());
        assert!(matches!(
            pipeline.process_file(&path).await,
            Err(PipelineError::Decode(_))
        ));
    }
}
