use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned bounding box of a detection, in source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        BoundingBox { x1, y1, x2, y2 }
    }
}

/// One preprocessing strategy applied to the source image before detection.
///
/// The enum order is the fixed enumeration the orchestrator runs and the
/// tie-break order of the fusion sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    /// Global Otsu binarization.
    Binary,
    /// Adaptive local-mean binarization.
    Adaptive,
    /// Contrast stretch followed by Otsu binarization.
    Enhanced,
    /// 3×3 median denoise followed by Otsu binarization.
    Denoised,
    /// Default preprocessing (grayscale contrast stretch), used by the
    /// zero-detection fallback and by detection sources directly.
    Standard,
}

impl VariantKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VariantKind::Binary => "binary",
            VariantKind::Adaptive => "adaptive",
            VariantKind::Enhanced => "enhanced",
            VariantKind::Denoised => "denoised",
            VariantKind::Standard => "standard",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One OCR-reported text span. Produced by a [`crate::DetectionSource`];
/// the `variant` tag is overwritten by the orchestrator with the strategy
/// that produced the input image.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub text: String,
    /// Detector confidence in [0, 1].
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub variant: VariantKind,
}

impl Detection {
    pub fn new(text: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Detection {
            text: text.into(),
            confidence,
            bbox,
            variant: VariantKind::Standard,
        }
    }
}

/// A detection that survived filtering, carrying both the original text
/// (for output) and its normalized form (for matching).
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLine {
    pub raw_text: String,
    pub normalized_text: String,
    pub confidence: f32,
    pub variant: VariantKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_names_match_strategy_labels() {
        assert_eq!(VariantKind::Binary.as_str(), "binary");
        assert_eq!(VariantKind::Denoised.to_string(), "denoised");
    }

    #[test]
    fn detection_defaults_to_standard_variant() {
        let d = Detection::new("Total", 0.9, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(d.variant, VariantKind::Standard);
    }
}
