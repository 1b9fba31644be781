use chrono::NaiveDate;
use tracing::debug;

use spesa_core::{canonical_date, ExtractionConfig};

use crate::types::NormalizedLine;

// Numeric date with a 4-digit year, any of the three common separators.
re!(re_dmy4, r"\b(\d{1,2})[/.-](\d{1,2})[/.-](20\d{2})\b");

re!(re_labeled_numeric, r"(?i)(?:date|dt)[:.\s-]+(\d{1,2})[/.-](\d{1,2})[/.-](\d{2,4})");
re!(
    re_labeled_text_month,
    r"(?i)(?:date|dt)[:.\s-]+(\d{1,2})\s*(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\s*,?\s*(\d{2,4})"
);
re!(re_short_year, r"\b(\d{1,2})[/.-](\d{1,2})[/.-](\d{2})\b");
re!(re_iso, r"\b(\d{4})[/.-](\d{1,2})[/.-](\d{1,2})\b");
re!(
    re_text_month_day_first,
    r"(?i)\b(\d{1,2})\s*(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\s*,?\s*(\d{2,4})\b"
);
re!(
    re_text_month_month_first,
    r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\s+(\d{1,2})\s*,?\s*(\d{2,4})\b"
);

#[derive(Debug, Clone, PartialEq)]
pub struct DateMatch {
    /// Canonical `MM/DD/YYYY` string.
    pub canonical: String,
    /// Heuristic tier score, used only for confidence aggregation.
    pub score: f32,
}

#[derive(Debug, Clone, Copy)]
enum DateRuleKind {
    /// Three numeric groups in (a, b, year) order.
    NumericTriple,
    /// Day digits, month name, year digits.
    TextMonthDayFirst,
    /// Month name, day digits, year digits.
    TextMonthMonthFirst,
    /// Year, month, day groups (ISO).
    YearFirst,
}

struct DateRule {
    pattern: fn() -> &'static regex::Regex,
    kind: DateRuleKind,
    score: f32,
}

/// Tier-3 pattern table, in priority order. Each pattern is tried against
/// every line before the next pattern is considered.
const DATE_RULES: &[DateRule] = &[
    DateRule { pattern: re_labeled_numeric, kind: DateRuleKind::NumericTriple, score: 0.9 },
    DateRule { pattern: re_labeled_text_month, kind: DateRuleKind::TextMonthDayFirst, score: 0.85 },
    DateRule { pattern: re_short_year, kind: DateRuleKind::NumericTriple, score: 0.8 },
    DateRule { pattern: re_iso, kind: DateRuleKind::YearFirst, score: 0.85 },
    DateRule { pattern: re_text_month_day_first, kind: DateRuleKind::TextMonthDayFirst, score: 0.8 },
    DateRule { pattern: re_text_month_month_first, kind: DateRuleKind::TextMonthMonthFirst, score: 0.8 },
];

/// Extract one canonical `MM/DD/YYYY` date from the ranked lines.
///
/// Numeric `(a, b, year)` triples are disambiguated by one rule, applied
/// whether or not a "date" label is present: a first component greater
/// than 12 (and at most 31) can only be a day, so the order is day/month;
/// otherwise month/day is assumed.
pub fn extract_date(lines: &[NormalizedLine], config: &ExtractionConfig) -> Option<DateMatch> {
    // Tier 1: a line carrying the "date" token with a 4-digit-year pattern.
    for line in lines {
        if line.normalized_text.contains("date") {
            if let Some(date) = first_numeric_full_year(&line.raw_text, config) {
                debug!(line = %line.raw_text, "date from labeled line");
                return Some(DateMatch { canonical: canonical_date(date), score: 0.95 });
            }
        }
    }

    // Tier 2: bare 4-digit-year pattern on any line.
    for line in lines {
        if let Some(date) = first_numeric_full_year(&line.raw_text, config) {
            debug!(line = %line.raw_text, "date from bare pattern");
            return Some(DateMatch { canonical: canonical_date(date), score: 0.9 });
        }
    }

    // Tier 3: the pattern table, pattern-major.
    for rule in DATE_RULES {
        for line in lines {
            if let Some(caps) = (rule.pattern)().captures(&line.raw_text) {
                if let Some(date) = resolve_rule(rule.kind, &caps, config) {
                    debug!(line = %line.raw_text, "date from pattern table");
                    return Some(DateMatch { canonical: canonical_date(date), score: rule.score });
                }
            }
        }
    }

    // Tier 4: best-effort global scan, first match in scan order.
    for line in lines {
        for caps in re_dmy4().captures_iter(&line.raw_text) {
            if let Some(date) = numeric_triple_from_caps(&caps, config) {
                return Some(DateMatch { canonical: canonical_date(date), score: 0.7 });
            }
        }
    }

    None
}

fn first_numeric_full_year(text: &str, config: &ExtractionConfig) -> Option<NaiveDate> {
    let caps = re_dmy4().captures(text)?;
    numeric_triple_from_caps(&caps, config)
}

fn numeric_triple_from_caps(
    caps: &regex::Captures<'_>,
    config: &ExtractionConfig,
) -> Option<NaiveDate> {
    let a: u32 = caps[1].parse().ok()?;
    let b: u32 = caps[2].parse().ok()?;
    let year = expand_year(caps[3].parse().ok()?, config);
    disambiguate(a, b, year)
}

fn resolve_rule(
    kind: DateRuleKind,
    caps: &regex::Captures<'_>,
    config: &ExtractionConfig,
) -> Option<NaiveDate> {
    match kind {
        DateRuleKind::NumericTriple => numeric_triple_from_caps(caps, config),
        DateRuleKind::TextMonthDayFirst => {
            let day: u32 = caps[1].parse().ok()?;
            let month = month_abbr_to_num(&caps[2])?;
            let year = expand_year(caps[3].parse().ok()?, config);
            NaiveDate::from_ymd_opt(year, month, day)
        }
        DateRuleKind::TextMonthMonthFirst => {
            let month = month_abbr_to_num(&caps[1])?;
            let day: u32 = caps[2].parse().ok()?;
            let year = expand_year(caps[3].parse().ok()?, config);
            NaiveDate::from_ymd_opt(year, month, day)
        }
        DateRuleKind::YearFirst => {
            let year: i32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let day: u32 = caps[3].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        }
    }
}

/// A first component greater than 12 cannot be a month; otherwise default
/// to month-first. Invalid combinations are rejected rather than emitted.
fn disambiguate(a: u32, b: u32, year: i32) -> Option<NaiveDate> {
    let (month, day) = if a > 12 && a <= 31 { (b, a) } else { (a, b) };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Two-digit years expand around the configured pivot: values below it
/// land in the 2000s, the rest in the 1900s.
fn expand_year(y: i32, config: &ExtractionConfig) -> i32 {
    if y < 100 {
        if (y as u32) < config.year_pivot {
            2000 + y
        } else {
            1900 + y
        }
    } else {
        y
    }
}

fn month_abbr_to_num(name: &str) -> Option<u32> {
    match name.to_lowercase().as_str() {
        "jan" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "apr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "aug" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dec" => Some(12),
        _ => None,
    }
}
