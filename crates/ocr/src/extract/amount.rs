use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

use spesa_core::Currency;

use crate::types::NormalizedLine;

// OCR frequently reads "$" as the letter "S"; "Amount: S92" is a dollar
// amount.
re!(re_s_misread, r"(?i)amount\s*:?\s*s\s*(?P<val>\d+(?:[.,]\d{1,2})?)");
re!(re_s_label_context, r"(?i)amount\s*:?\s*s\s*\d");
re!(re_s_leading_context, r"(?i)^s\s*\d");

re!(re_monetary_keyword, r"(?i)amount|total|sum|price|cost|fee");
re!(re_bare_integer, r"^\d+$");

re!(
    re_label_symbol_value,
    r"(?i)(?:amount|total|sum|price|cost|fee)[:\s.-]*(?P<cur>[₹$€£¥])\s*(?P<val>\d+(?:[.,]\d{1,2})?)"
);
re!(
    re_label_value_symbol,
    r"(?i)(?:amount|total|sum|price|cost|fee)[:\s.-]*(?P<val>\d+(?:[.,]\d{1,2})?)\s*(?P<cur>[₹$€£¥])"
);
re!(
    re_label_word_value,
    r"(?i)(?:amount|total|sum|price|cost|fee)[:\s.-]*(?P<cur>rs\.?|rupees?\.?)\s*(?P<val>\d+(?:[.,]\d{1,2})?)"
);
re!(re_standalone_s_value, r"(?i)\bs\s*(?P<val>\d+(?:[.,]\d{1,2})?)\b");
re!(re_label_any_value, r"(?i)(?:amount|total|sum)[^0-9]*(?P<val>\d+)");
re!(
    re_label_plain_value,
    r"(?i)(?:amount|total|sum|price|cost|fee)[:\s.-]*(?P<val>\d+(?:[.,]\d{1,2})?)"
);
re!(re_symbol_value, r"(?P<cur>[₹$€£¥])\s*(?P<val>\d+(?:[.,]\d{1,2})?)");
re!(re_value_symbol, r"(?P<val>\d+(?:[.,]\d{1,2})?)\s*(?P<cur>[₹$€£¥])");
re!(re_word_value, r"(?i)\b(?P<cur>rs\.?|rupees?\.?)\s*(?P<val>\d+(?:[.,]\d{1,2})?)");
re!(re_bare_value, r"(?P<val>\d+(?:[.,]\d{2})?)");

struct AmountRule {
    pattern: fn() -> &'static regex::Regex,
    base_score: f32,
}

/// The general cascade, most specific first. Every match of every rule
/// against every line is collected; this table accumulates candidates, it
/// is not first-match-wins.
const AMOUNT_RULES: &[AmountRule] = &[
    AmountRule { pattern: re_label_symbol_value, base_score: 0.9 },
    AmountRule { pattern: re_label_value_symbol, base_score: 0.9 },
    AmountRule { pattern: re_label_word_value, base_score: 0.9 },
    AmountRule { pattern: re_standalone_s_value, base_score: 0.8 },
    AmountRule { pattern: re_label_any_value, base_score: 0.9 },
    AmountRule { pattern: re_label_plain_value, base_score: 0.8 },
    AmountRule { pattern: re_symbol_value, base_score: 0.7 },
    AmountRule { pattern: re_value_symbol, base_score: 0.7 },
    AmountRule { pattern: re_word_value, base_score: 0.7 },
    AmountRule { pattern: re_bare_value, base_score: 0.5 },
];

#[derive(Debug, Clone, PartialEq)]
pub struct AmountMatch {
    pub value: f64,
    pub currency: Currency,
    /// Heuristic weight of the winning candidate. Not a probability; the
    /// label boosts can push it past 1.0.
    pub score: f32,
}

#[derive(Debug, Clone)]
struct Candidate {
    value: f64,
    currency: Currency,
    score: f32,
    source: String,
}

/// Extract one monetary value and currency from the ranked lines.
pub fn extract_amount(lines: &[NormalizedLine]) -> Option<AmountMatch> {
    extract_amount_with_cap(lines, 10_000.0)
}

/// As [`extract_amount`], with a configurable bare-integer fallback cap.
pub fn extract_amount_with_cap(lines: &[NormalizedLine], fallback_cap: f64) -> Option<AmountMatch> {
    let mut candidates: Vec<Candidate> = Vec::new();

    // Step 1: the "$" → "S" misread. High confidence, always USD.
    for line in lines {
        if let Some(caps) = re_s_misread().captures(&line.raw_text) {
            if let Some(value) = parse_value(&caps["val"]) {
                debug!(line = %line.raw_text, value, "amount from S-misread heuristic");
                candidates.push(Candidate {
                    value,
                    currency: Currency::Usd,
                    score: 0.95,
                    source: line.raw_text.clone(),
                });
            }
        }
    }

    // Step 2: the general cascade, accumulating every match.
    for line in lines {
        let text = line.raw_text.as_str();
        let lower = text.to_lowercase();
        for rule in AMOUNT_RULES {
            for caps in (rule.pattern)().captures_iter(text) {
                let Some(value) = caps.name("val").and_then(|m| parse_value(m.as_str())) else {
                    continue;
                };

                // Step 3: calendar years and sub-unit noise are rejected
                // unless the line is explicitly monetary.
                let monetary = re_monetary_keyword().is_match(text);
                if value.fract() == 0.0 && (1900.0..=2100.0).contains(&value) && !monetary {
                    continue;
                }
                if value < 1.0 && !monetary {
                    continue;
                }

                // Step 4: currency resolution priority.
                let currency = if re_s_label_context().is_match(text)
                    || re_s_leading_context().is_match(text)
                {
                    Currency::Usd
                } else if let Some(cur) = caps.name("cur") {
                    Currency::from_indicator(cur.as_str())
                } else {
                    Currency::Unknown
                };

                // Step 5: additive label boosts.
                let mut score = rule.base_score;
                for keyword in ["total", "amount", "price"] {
                    if lower.contains(keyword) {
                        score += 0.1;
                    }
                }

                merge_candidate(
                    &mut candidates,
                    Candidate { value, currency, score, source: text.to_string() },
                );
            }
        }
    }

    // Step 7: selection.
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    for keyword in ["total", "amount"] {
        if let Some(c) = candidates
            .iter()
            .find(|c| c.source.to_lowercase().contains(keyword) && c.score >= 0.7)
        {
            debug!(value = c.value, currency = %c.currency, keyword, "selected labeled amount");
            return Some(AmountMatch { value: c.value, currency: c.currency, score: c.score });
        }
    }
    if let Some(c) = candidates.first() {
        debug!(value = c.value, currency = %c.currency, "selected highest-scoring amount");
        return Some(AmountMatch { value: c.value, currency: c.currency, score: c.score });
    }

    // Step 8: bare-integer fallback. Year-shaped integers stay rejected
    // here too; a lone "2024" is a date, not a price.
    for line in lines {
        let trimmed = line.raw_text.trim();
        if re_bare_integer().is_match(trimmed) {
            if let Some(value) = parse_value(trimmed) {
                let year_like = (1900.0..=2100.0).contains(&value);
                if value > 0.0 && value < fallback_cap && !year_like {
                    debug!(value, "amount from bare-integer fallback");
                    return Some(AmountMatch {
                        value,
                        currency: Currency::Unknown,
                        score: 0.3,
                    });
                }
            }
        }
    }

    None
}

/// Step 6: two candidates within a cent of each other are the same
/// amount; the higher-scoring one survives with its source text.
fn merge_candidate(candidates: &mut Vec<Candidate>, new: Candidate) {
    for existing in candidates.iter_mut() {
        if (existing.value - new.value).abs() < 0.01 {
            if new.score > existing.score {
                *existing = new;
            }
            return;
        }
    }
    candidates.push(new);
}

/// Parse a captured value, accepting a comma as decimal separator.
fn parse_value(s: &str) -> Option<f64> {
    Decimal::from_str(&s.replace(',', ".")).ok()?.to_f64()
}
