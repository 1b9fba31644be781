use std::collections::HashSet;

use tracing::debug;

use crate::types::{Detection, NormalizedLine};

re!(re_whitespace, r"\s+");
// Allow-list: word characters, whitespace, light punctuation, and the
// currency symbols the extractors understand.
re!(re_disallowed, r"[^\w\s:;.,/$€£¥₹%-]");

/// Normalize text for matching: lowercase, collapse whitespace runs, drop
/// characters outside the allow-list. The original text is preserved
/// separately for output.
pub fn normalize_text(text: &str) -> String {
    let lower = text.to_lowercase();
    let collapsed = re_whitespace().replace_all(&lower, " ");
    let kept = re_disallowed().replace_all(&collapsed, "");
    kept.trim().to_string()
}

/// Merge tagged detections from all variants into one ranked,
/// duplicate-free sequence.
///
/// Detections with blank or sub-2-character text are discarded. The rest
/// are sorted by confidence descending; the sort is stable, so ties keep
/// their first-seen order, which is the fixed variant enumeration order.
/// Deduplication then keeps the first occurrence of each exact
/// (non-normalized) text, which is necessarily its highest-confidence
/// instance.
pub fn fuse(detections: Vec<Detection>) -> Vec<NormalizedLine> {
    let mut lines: Vec<NormalizedLine> = detections
        .into_iter()
        .filter_map(|d| {
            let raw = d.text.trim();
            if raw.chars().count() < 2 {
                return None;
            }
            Some(NormalizedLine {
                raw_text: raw.to_string(),
                normalized_text: normalize_text(raw),
                confidence: d.confidence,
                variant: d.variant,
            })
        })
        .collect();

    lines.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen: HashSet<String> = HashSet::new();
    let before = lines.len();
    lines.retain(|l| seen.insert(l.raw_text.clone()));
    debug!(total = before, unique = lines.len(), "fused detections");

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, VariantKind};

    fn det(text: &str, confidence: f32, variant: VariantKind) -> Detection {
        Detection {
            text: text.to_string(),
            confidence,
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            variant,
        }
    }

    #[test]
    fn normalize_lowercases_and_collapses_whitespace() {
        assert_eq!(normalize_text("Total:   $33.71"), "total: $33.71");
    }

    #[test]
    fn normalize_keeps_currency_symbols() {
        assert_eq!(normalize_text("₹1200"), "₹1200");
        assert_eq!(normalize_text("€ 9,50"), "€ 9,50");
    }

    #[test]
    fn normalize_drops_disallowed_characters() {
        assert_eq!(normalize_text("A*B(C)"), "abc");
    }

    #[test]
    fn fuse_orders_by_confidence_descending() {
        let out = fuse(vec![
            det("low", 0.3, VariantKind::Binary),
            det("high", 0.9, VariantKind::Binary),
            det("mid", 0.6, VariantKind::Adaptive),
        ]);
        let raw: Vec<&str> = out.iter().map(|l| l.raw_text.as_str()).collect();
        assert_eq!(raw, vec!["high", "mid", "low"]);
    }

    #[test]
    fn fuse_keeps_highest_confidence_duplicate() {
        let out = fuse(vec![
            det("Total: $5", 0.4, VariantKind::Binary),
            det("Total: $5", 0.8, VariantKind::Enhanced),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 0.8);
        assert_eq!(out[0].variant, VariantKind::Enhanced);
    }

    #[test]
    fn fuse_tie_break_is_first_seen_order() {
        // Equal confidence: the Binary detection entered first and stays first.
        let out = fuse(vec![
            det("alpha", 0.5, VariantKind::Binary),
            det("beta", 0.5, VariantKind::Adaptive),
        ]);
        assert_eq!(out[0].raw_text, "alpha");
        assert_eq!(out[1].raw_text, "beta");
    }

    #[test]
    fn fuse_discards_short_and_blank_text() {
        let out = fuse(vec![
            det("  ", 0.9, VariantKind::Binary),
            det("x", 0.9, VariantKind::Binary),
            det("ok", 0.9, VariantKind::Binary),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].raw_text, "ok");
    }

    #[test]
    fn fuse_dedup_is_exact_not_normalized() {
        // Different exact text, same normalized form — both survive.
        let out = fuse(vec![
            det("Total", 0.9, VariantKind::Binary),
            det("TOTAL", 0.8, VariantKind::Binary),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn fuse_is_idempotent_on_identical_input() {
        let input = vec![
            det("Total: $5", 0.4, VariantKind::Binary),
            det("STORE", 0.8, VariantKind::Adaptive),
            det("Total: $5", 0.8, VariantKind::Enhanced),
        ];
        let a = fuse(input.clone());
        let b = fuse(input);
        assert_eq!(a, b);
    }
}
