use tracing::debug;

use spesa_core::UNTITLED_TITLE;

use crate::types::NormalizedLine;

re!(re_label, r"(?i)(?:title|merchant|store|vendor|name)[:.\s-]+(.+)");
re!(re_label_remnant, r"(?i)^(?:title|merchant|store|name)\s*[:.-]?\s*");
re!(re_structural, r"(?i)date|amount|total|invoice|receipt|bill|tax|payment|customer");
// 1–4 capitalized words, nothing else on the line.
re!(re_proper_noun, r"^[A-Z][a-z]+(?:\s+[A-Z][a-z]+){0,3}$");
re!(re_business_suffix, r"(?i)LLC|Inc|Corp|Shop|Store|Restaurant|Cafe|Hotel");
re!(re_date_like, r"\d{1,2}[/.-]\d{1,2}");
re!(re_amount_like, r"[$€£¥₹]\s*\d+");

#[derive(Debug, Clone, PartialEq)]
pub struct TitleMatch {
    pub value: String,
    /// Heuristic tier score, used only for confidence aggregation.
    pub score: f32,
}

/// Extract the merchant/title line. The cascade returns at the first tier
/// that produces any match; it never falls back once a tier has answered.
pub fn extract_title(lines: &[NormalizedLine]) -> TitleMatch {
    // Tier 1: explicit label. Strip any label remnant from the capture;
    // a leftover single word shorter than 4 characters is a label
    // fragment, not a title, so keep scanning.
    for line in lines {
        if let Some(caps) = re_label().captures(&line.raw_text) {
            let cleaned = re_label_remnant()
                .replace(caps[1].trim(), "")
                .trim()
                .to_string();
            if cleaned.is_empty()
                || (cleaned.split_whitespace().count() == 1 && cleaned.chars().count() < 4)
            {
                continue;
            }
            debug!(title = %cleaned, "title from explicit label");
            return TitleMatch { value: cleaned, score: 0.9 };
        }
    }

    // Tier 2: collect merchant-name candidates across all lines.
    let mut candidates: Vec<(String, f32)> = Vec::new();
    for line in lines {
        let text = line.raw_text.as_str();
        if text.chars().count() < 3 || re_structural().is_match(text) {
            continue;
        }
        if re_proper_noun().is_match(text) {
            candidates.push((text.to_string(), 0.8));
            continue;
        }
        if re_business_suffix().is_match(text) {
            candidates.push((text.to_string(), 0.7));
            continue;
        }
        // The first line that is neither date- nor amount-shaped is often
        // the merchant name; recorded at most once.
        if candidates.is_empty()
            && !re_date_like().is_match(text)
            && !re_amount_like().is_match(text)
        {
            candidates.push((text.to_string(), 0.5));
        }
    }
    let mut best: Option<&(String, f32)> = None;
    for candidate in &candidates {
        if best.is_none_or(|b| candidate.1 > b.1) {
            best = Some(candidate);
        }
    }
    if let Some((value, score)) = best {
        debug!(title = %value, score, "title from candidate collection");
        return TitleMatch { value: value.clone(), score: *score };
    }

    // Tier 3: first non-numeric line of usable length.
    for line in lines {
        let text = line.raw_text.as_str();
        if text.chars().count() >= 3 && !text.chars().all(|c| c.is_ascii_digit()) {
            return TitleMatch { value: text.to_string(), score: 0.3 };
        }
    }

    TitleMatch { value: UNTITLED_TITLE.to_string(), score: 0.0 }
}
