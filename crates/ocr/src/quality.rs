use image::GrayImage;

use spesa_core::ExtractionConfig;

/// Per-field confidences feeding the overall score. A field that was not
/// found contributes 0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldConfidences {
    pub merchant: f32,
    pub date: f32,
    pub total: f32,
    pub tax: f32,
}

/// Fixed aggregation weights: total matters most, image quality least.
pub fn aggregate_confidence(fields: &FieldConfidences, quality: f32) -> f32 {
    0.2 * fields.merchant + 0.2 * fields.date + 0.3 * fields.total + 0.2 * fields.tax
        + 0.1 * quality
}

/// Estimate image quality in [0, 1] as the mean of normalized sharpness
/// (Laplacian variance) and normalized contrast (intensity stddev).
pub fn image_quality(img: &GrayImage, config: &ExtractionConfig) -> f32 {
    let (width, height) = img.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let count = (width * height) as f64;
    let sum: f64 = img.pixels().map(|p| p[0] as f64).sum();
    let mean = sum / count;
    let variance: f64 = img
        .pixels()
        .map(|p| (p[0] as f64 - mean).powi(2))
        .sum::<f64>()
        / count;
    let contrast = (variance.sqrt() / config.contrast_norm).min(1.0);

    // Laplacian response over interior pixels.
    let mut responses = Vec::with_capacity(((width - 2) * (height - 2)) as usize);
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = img.get_pixel(x, y)[0] as f64;
            let response = img.get_pixel(x, y - 1)[0] as f64
                + img.get_pixel(x, y + 1)[0] as f64
                + img.get_pixel(x - 1, y)[0] as f64
                + img.get_pixel(x + 1, y)[0] as f64
                - 4.0 * center;
            responses.push(response);
        }
    }
    let lap_mean = responses.iter().sum::<f64>() / responses.len() as f64;
    let lap_variance = responses
        .iter()
        .map(|r| (r - lap_mean).powi(2))
        .sum::<f64>()
        / responses.len() as f64;
    let sharpness = (lap_variance / config.sharpness_norm).min(1.0);

    ((sharpness + contrast) / 2.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one_for_perfect_input() {
        let fields = FieldConfidences { merchant: 1.0, date: 1.0, total: 1.0, tax: 1.0 };
        assert!((aggregate_confidence(&fields, 1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn missing_fields_contribute_zero() {
        let fields = FieldConfidences::default();
        assert!((aggregate_confidence(&fields, 0.5) - 0.05).abs() < 1e-6);
    }

    #[test]
    fn total_weight_dominates_single_fields() {
        let only_total = FieldConfidences { total: 1.0, ..Default::default() };
        let only_date = FieldConfidences { date: 1.0, ..Default::default() };
        assert!(aggregate_confidence(&only_total, 0.0) > aggregate_confidence(&only_date, 0.0));
    }

    #[test]
    fn uniform_image_has_zero_quality() {
        let img = GrayImage::from_pixel(16, 16, image::Luma([128u8]));
        assert_eq!(image_quality(&img, &ExtractionConfig::default()), 0.0);
    }

    #[test]
    fn checkerboard_scores_high() {
        let img = GrayImage::from_fn(16, 16, |x, y| {
            if (x + y) % 2 == 0 {
                image::Luma([0u8])
            } else {
                image::Luma([255u8])
            }
        });
        let q = image_quality(&img, &ExtractionConfig::default());
        assert!(q > 0.9, "quality was {q}");
    }

    #[test]
    fn tiny_image_scores_zero() {
        let img = GrayImage::from_pixel(2, 2, image::Luma([10u8]));
        assert_eq!(image_quality(&img, &ExtractionConfig::default()), 0.0);
    }
}
