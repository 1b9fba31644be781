// ── Compiled regex cache ─────────────────────────────────────────────────────
// Usage: `re!(re_name, r"pattern");` then `re_name()` anywhere in the module.
macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static regex::Regex {
            static R: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
            R.get_or_init(|| regex::Regex::new($pat).expect("invalid regex"))
        }
    };
}

pub mod detector;
pub mod extract;
pub mod fusion;
pub mod hash;
pub mod layout;
pub mod pipeline;
pub mod quality;
pub mod types;
pub mod variants;

pub use detector::{DetectError, DetectionSource, MockDetector};
pub use extract::{extract_amount, extract_date, extract_title};
pub use fusion::{fuse, normalize_text};
pub use hash::{record_path, sha256_bytes, to_hex};
pub use layout::{
    detect_language, extract_structured, group_lines, GroupedLine, ScoredField, StructuredReceipt,
};
pub use pipeline::{
    spawn_intake_watcher, ExtractionOutcome, ExtractionPipeline, FileOutcome, PipelineError,
};
pub use quality::{aggregate_confidence, image_quality, FieldConfidences};
pub use types::{BoundingBox, Detection, NormalizedLine, VariantKind};
pub use variants::run_variants;
