//! Structured line-grouping mode: clusters detections into physical lines
//! and classifies them against per-language keyword tables. New languages
//! are added as table rows, not code branches.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

use spesa_core::{Currency, ExtractionConfig};

use crate::extract::date::extract_date;
use crate::types::{Detection, NormalizedLine, VariantKind};

// Currency patterns referenced by the language tables. Group 1 is the
// numeric amount, thousands separators allowed.
re!(re_cur_inr_symbol, r"₹\s*(\d+(?:,\d{3})*(?:\.\d{2})?)");
re!(re_cur_rs_word, r"(?i)\brs\.?\s*(\d+(?:,\d{3})*(?:\.\d{2})?)");
re!(re_cur_devanagari_ru, r"रु\.?\s*(\d+(?:,\d{3})*(?:\.\d{2})?)");

/// A value with the mean detection confidence of the line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredField<T> {
    pub value: T,
    pub confidence: f32,
}

/// One physical receipt line: detections within the vertical tolerance,
/// ordered left to right and joined with spaces.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedLine {
    pub text: String,
    pub confidence: f32,
    pub y: f32,
}

/// Keyword and currency tables for one language.
pub struct LanguageTable {
    pub code: &'static str,
    total: &'static [&'static str],
    tax: &'static [&'static str],
    date: &'static [&'static str],
    merchant: &'static [&'static str],
    currency_patterns: &'static [(fn() -> &'static regex::Regex, Currency)],
}

static LANGUAGE_TABLES: &[LanguageTable] = &[
    LanguageTable {
        code: "en",
        total: &["total", "amount", "sum", "grand total", "net amount"],
        tax: &["tax", "gst", "vat", "service charge"],
        date: &["date", "invoice date", "bill date"],
        merchant: &["store", "shop", "outlet", "branch"],
        currency_patterns: &[
            (re_cur_inr_symbol, Currency::Inr),
            (re_cur_rs_word, Currency::Inr),
        ],
    },
    LanguageTable {
        code: "hi",
        total: &["कुल", "राशि", "योग", "कुल राशि"],
        tax: &["कर", "जीएसटी", "वैट", "सेवा शुल्क"],
        date: &["तारीख", "बिल की तारीख", "चालान की तारीख"],
        merchant: &["दुकान", "स्टोर", "शाखा"],
        currency_patterns: &[
            (re_cur_inr_symbol, Currency::Inr),
            (re_cur_devanagari_ru, Currency::Inr),
        ],
    },
    LanguageTable {
        code: "mr",
        total: &["एकूण", "रक्कम", "बेरीज", "एकूण रक्कम"],
        tax: &["कर", "जीएसटी", "व्हॅट", "सेवा शुल्क"],
        date: &["तारीख", "बिलाची तारीख", "चालानाची तारीख"],
        merchant: &["दुकान", "स्टोअर", "शाखा"],
        currency_patterns: &[
            (re_cur_inr_symbol, Currency::Inr),
            (re_cur_devanagari_ru, Currency::Inr),
        ],
    },
];

/// Look up the table for a language code, defaulting to English.
pub fn table_for(code: &str) -> &'static LanguageTable {
    LANGUAGE_TABLES
        .iter()
        .find(|t| t.code == code)
        .unwrap_or(&LANGUAGE_TABLES[0])
}

/// Detect the dominant language of the fused text, mapped to a table code.
pub fn detect_language(text: &str) -> &'static str {
    match whatlang::detect(text).map(|info| info.lang()) {
        Some(whatlang::Lang::Hin) => "hi",
        Some(whatlang::Lang::Mar) => "mr",
        _ => "en",
    }
}

/// Cluster detections into physical lines by vertical proximity, then
/// order each line's detections left to right.
pub fn group_lines(detections: &[Detection], tolerance: f32) -> Vec<GroupedLine> {
    let mut sorted: Vec<&Detection> = detections.iter().collect();
    sorted.sort_by(|a, b| {
        a.bbox
            .y1
            .partial_cmp(&b.bbox.y1)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut groups: Vec<Vec<&Detection>> = Vec::new();
    let mut current: Vec<&Detection> = Vec::new();
    for det in sorted {
        match current.last() {
            Some(last) if (det.bbox.y1 - last.bbox.y1).abs() <= tolerance => current.push(det),
            Some(_) => {
                groups.push(std::mem::take(&mut current));
                current.push(det);
            }
            None => current.push(det),
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }

    groups
        .into_iter()
        .map(|mut group| {
            group.sort_by(|a, b| {
                a.bbox
                    .x1
                    .partial_cmp(&b.bbox.x1)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let confidence =
                group.iter().map(|d| d.confidence).sum::<f32>() / group.len() as f32;
            GroupedLine {
                text: group
                    .iter()
                    .map(|d| d.text.trim())
                    .collect::<Vec<_>>()
                    .join(" "),
                confidence,
                y: group[0].bbox.y1,
            }
        })
        .collect()
}

/// The structured-mode result: the same fields as the flat extractors,
/// each carrying its line confidence, resolved via table lookup.
#[derive(Debug, Clone)]
pub struct StructuredReceipt {
    pub merchant: Option<ScoredField<String>>,
    /// Canonical `MM/DD/YYYY`.
    pub date: Option<ScoredField<String>>,
    pub total: Option<ScoredField<f64>>,
    pub tax: Option<ScoredField<f64>>,
    pub currency: Currency,
    pub language: &'static str,
    pub lines: Vec<GroupedLine>,
}

/// Classify grouped lines against the language tables. First matching
/// line per field wins; later hits are ignored.
pub fn extract_structured(
    detections: &[Detection],
    config: &ExtractionConfig,
) -> StructuredReceipt {
    let lines = group_lines(detections, config.line_tolerance);
    let joined = lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let language = detect_language(&joined);
    let table = table_for(language);
    debug!(language, lines = lines.len(), "structured extraction");

    let mut result = StructuredReceipt {
        merchant: None,
        date: None,
        total: None,
        tax: None,
        currency: Currency::Unknown,
        language,
        lines: Vec::new(),
    };

    for line in &lines {
        let lower = line.text.to_lowercase();

        if result.merchant.is_none() && contains_any(&lower, table.merchant) {
            result.merchant = Some(ScoredField {
                value: line.text.clone(),
                confidence: line.confidence,
            });
        }

        if result.date.is_none() && contains_any(&lower, table.date) {
            if let Some(date) = date_in_line(&line.text, config) {
                result.date = Some(ScoredField { value: date, confidence: line.confidence });
            }
        }

        if result.total.is_none() && contains_any(&lower, table.total) {
            if let Some((value, currency)) = table_amount(table, &line.text) {
                result.total = Some(ScoredField { value, confidence: line.confidence });
                result.currency = currency;
            }
        }

        if result.tax.is_none() && contains_any(&lower, table.tax) {
            if let Some((value, _)) = table_amount(table, &line.text) {
                result.tax = Some(ScoredField { value, confidence: line.confidence });
            }
        }
    }

    result.lines = lines;
    result
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

fn date_in_line(text: &str, config: &ExtractionConfig) -> Option<String> {
    let line = NormalizedLine {
        raw_text: text.to_string(),
        normalized_text: crate::fusion::normalize_text(text),
        confidence: 1.0,
        variant: VariantKind::Standard,
    };
    extract_date(std::slice::from_ref(&line), config).map(|m| m.canonical)
}

fn table_amount(table: &LanguageTable, text: &str) -> Option<(f64, Currency)> {
    for (pattern, currency) in table.currency_patterns {
        if let Some(caps) = pattern().captures(text) {
            let cleaned = caps[1].replace(',', "");
            if let Some(value) = Decimal::from_str(&cleaned).ok().and_then(|d| d.to_f64()) {
                return Some((value, *currency));
            }
        }
    }
    None
}
