use image::GrayImage;
use spesa_core::ExtractionConfig;
use tracing::{debug, warn};

use crate::detector::DetectionSource;
use crate::types::{Detection, VariantKind};

// ── Preprocessing primitives ──────────────────────────────────────────────────

/// Stretch pixel intensities to the full 0–255 range.
pub fn contrast_stretch(img: &GrayImage) -> GrayImage {
    let (min_px, max_px) = img
        .pixels()
        .fold((255u8, 0u8), |(mn, mx), p| (mn.min(p[0]), mx.max(p[0])));

    if max_px == min_px {
        // Uniform image — nothing to stretch.
        return img.clone();
    }

    let range = (max_px - min_px) as u32;
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y)[0];
        image::Luma([((p - min_px) as u32 * 255 / range) as u8])
    })
}

/// Global binarization with an Otsu-selected threshold.
pub fn otsu_threshold(img: &GrayImage) -> GrayImage {
    let mut histogram = [0u32; 256];
    for p in img.pixels() {
        histogram[p[0] as usize] += 1;
    }

    let total = (img.width() * img.height()) as f64;
    let sum_all: f64 = histogram
        .iter()
        .enumerate()
        .map(|(v, &n)| v as f64 * n as f64)
        .sum();

    let mut sum_bg = 0.0f64;
    let mut weight_bg = 0.0f64;
    let mut best_threshold = 0u8;
    let mut best_variance = 0.0f64;

    for (value, &count) in histogram.iter().enumerate() {
        weight_bg += count as f64;
        if weight_bg == 0.0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0.0 {
            break;
        }
        sum_bg += value as f64 * count as f64;

        let mean_bg = sum_bg / weight_bg;
        let mean_fg = (sum_all - sum_bg) / weight_fg;
        let variance = weight_bg * weight_fg * (mean_bg - mean_fg).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best_threshold = value as u8;
        }
    }

    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if img.get_pixel(x, y)[0] > best_threshold {
            image::Luma([255])
        } else {
            image::Luma([0])
        }
    })
}

/// Local-mean adaptive binarization over `block_size`² neighborhoods,
/// offset by `c`.
pub fn adaptive_threshold(img: &GrayImage, block_size: u32, c: i32) -> GrayImage {
    let (width, height) = img.dimensions();
    let half_block = block_size / 2;
    let mut result = GrayImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let mut sum = 0u32;
            let mut count = 0u32;

            let y_start = y.saturating_sub(half_block);
            let y_end = (y + half_block + 1).min(height);
            let x_start = x.saturating_sub(half_block);
            let x_end = (x + half_block + 1).min(width);

            for ly in y_start..y_end {
                for lx in x_start..x_end {
                    sum += img.get_pixel(lx, ly)[0] as u32;
                    count += 1;
                }
            }

            let threshold = (sum / count) as i32 - c;
            let output = if img.get_pixel(x, y)[0] as i32 > threshold { 255 } else { 0 };
            result.put_pixel(x, y, image::Luma([output]));
        }
    }

    result
}

/// 3×3 median filter. Border pixels are passed through unchanged.
pub fn median_denoise(img: &GrayImage) -> GrayImage {
    let (width, height) = img.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
            return *img.get_pixel(x, y);
        }
        let mut window = [0u8; 9];
        let mut i = 0;
        for dy in 0..3 {
            for dx in 0..3 {
                window[i] = img.get_pixel(x + dx - 1, y + dy - 1)[0];
                i += 1;
            }
        }
        window.sort_unstable();
        image::Luma([window[4]])
    })
}

// ── Variant strategies ────────────────────────────────────────────────────────

fn binary_variant(img: &GrayImage) -> GrayImage {
    otsu_threshold(img)
}

fn adaptive_variant(img: &GrayImage) -> GrayImage {
    adaptive_threshold(img, 11, 2)
}

fn enhanced_variant(img: &GrayImage) -> GrayImage {
    otsu_threshold(&contrast_stretch(img))
}

fn denoised_variant(img: &GrayImage) -> GrayImage {
    otsu_threshold(&median_denoise(img))
}

/// Default preprocessing used for the zero-detection fallback.
pub fn default_preprocess(img: &GrayImage) -> GrayImage {
    contrast_stretch(img)
}

/// The fixed strategy set, in enumeration (and tie-break) order. Every
/// entry is a pure image → image function, safe to run in any order.
const STRATEGIES: &[(VariantKind, fn(&GrayImage) -> GrayImage)] = &[
    (VariantKind::Binary, binary_variant),
    (VariantKind::Adaptive, adaptive_variant),
    (VariantKind::Enhanced, enhanced_variant),
    (VariantKind::Denoised, denoised_variant),
];

// ── Orchestrator ──────────────────────────────────────────────────────────────

/// Run the detector over every preprocessing variant, tagging detections
/// with their originating strategy and dropping those below the confidence
/// floor. A failing variant is logged and skipped, never fatal. If all
/// variants come back empty, the detector is invoked once more on the
/// default-preprocessed image.
pub fn run_variants(
    source: &dyn DetectionSource,
    image: &GrayImage,
    config: &ExtractionConfig,
) -> Vec<Detection> {
    let mut all = Vec::new();

    for (kind, strategy) in STRATEGIES {
        let processed = strategy(image);
        match source.detect(&processed) {
            Ok(detections) => {
                debug!(variant = %kind, regions = detections.len(), "variant detection finished");
                all.extend(
                    detections
                        .into_iter()
                        .filter(|d| d.confidence > config.confidence_floor)
                        .map(|d| Detection { variant: *kind, ..d }),
                );
            }
            Err(e) => warn!(variant = %kind, error = %e, "variant detection failed, skipping"),
        }
    }

    if all.is_empty() {
        warn!("all variants empty, falling back to standard preprocessing");
        match source.detect(&default_preprocess(image)) {
            Ok(detections) => all.extend(
                detections
                    .into_iter()
                    .map(|d| Detection { variant: VariantKind::Standard, ..d }),
            ),
            Err(e) => warn!(error = %e, "fallback detection failed"),
        }
    }

    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{FailingDetector, MockDetector};

    fn bimodal_image() -> GrayImage {
        // Left half dark, right half bright.
        GrayImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                image::Luma([40u8])
            } else {
                image::Luma([220u8])
            }
        })
    }

    #[test]
    fn otsu_separates_bimodal_image() {
        let out = otsu_threshold(&bimodal_image());
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(9, 0)[0], 255);
    }

    #[test]
    fn otsu_output_is_binary() {
        let out = otsu_threshold(&bimodal_image());
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn contrast_stretch_reaches_full_range() {
        let img = GrayImage::from_fn(4, 1, |x, _| image::Luma([(100 + x * 10) as u8]));
        let out = contrast_stretch(&img);
        let min = out.pixels().map(|p| p[0]).min().unwrap();
        let max = out.pixels().map(|p| p[0]).max().unwrap();
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn contrast_stretch_uniform_image_unchanged() {
        let img = GrayImage::from_pixel(4, 4, image::Luma([128u8]));
        let out = contrast_stretch(&img);
        assert!(out.pixels().all(|p| p[0] == 128));
    }

    #[test]
    fn median_removes_isolated_speck() {
        let mut img = GrayImage::from_pixel(5, 5, image::Luma([255u8]));
        img.put_pixel(2, 2, image::Luma([0u8]));
        let out = median_denoise(&img);
        assert_eq!(out.get_pixel(2, 2)[0], 255);
    }

    #[test]
    fn run_variants_drops_below_floor() {
        let source = MockDetector::from_lines(&[("kept", 0.5), ("dropped", 0.1)]);
        let config = ExtractionConfig::default();
        let out = run_variants(&source, &bimodal_image(), &config);
        assert!(out.iter().all(|d| d.text == "kept"));
        // One surviving detection per variant.
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn run_variants_tags_detections_with_strategy() {
        let source = MockDetector::from_lines(&[("line", 0.9)]);
        let config = ExtractionConfig::default();
        let out = run_variants(&source, &bimodal_image(), &config);
        let kinds: Vec<VariantKind> = out.iter().map(|d| d.variant).collect();
        assert_eq!(
            kinds,
            vec![
                VariantKind::Binary,
                VariantKind::Adaptive,
                VariantKind::Enhanced,
                VariantKind::Denoised,
            ]
        );
    }

    #[test]
    fn run_variants_survives_failing_detector() {
        let config = ExtractionConfig::default();
        let out = run_variants(&FailingDetector, &bimodal_image(), &config);
        assert!(out.is_empty());
    }

    #[test]
    fn fallback_fires_when_all_variants_below_floor() {
        // Everything sits below the floor, so variants yield nothing; the
        // standard fallback runs unfiltered.
        let source = MockDetector::from_lines(&[("faint", 0.1)]);
        let config = ExtractionConfig::default();
        let out = run_variants(&source, &bimodal_image(), &config);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].variant, VariantKind::Standard);
    }
}
