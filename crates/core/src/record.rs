use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::currency::Currency;

/// Placeholder title used when no merchant line could be extracted.
pub const UNTITLED_TITLE: &str = "Untitled Receipt";

/// The structured expense record produced by extraction.
///
/// Invariants, maintained by the pipeline:
/// - `amount >= 0`
/// - `date` is empty or canonical `MM/DD/YYYY`
/// - `title` is never empty (falls back to [`UNTITLED_TITLE`])
/// - `raw_text` has no two entries with identical exact text, ordered by
///   descending detection confidence, ties in first-seen order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    pub title: String,
    pub date: String,
    pub amount: f64,
    pub currency: Currency,
    pub raw_text: Vec<String>,
}

impl ReceiptRecord {
    /// The fully degraded record: placeholder title, no date, zero amount.
    pub fn empty() -> Self {
        ReceiptRecord {
            title: UNTITLED_TITLE.to_string(),
            date: String::new(),
            amount: 0.0,
            currency: Currency::Unknown,
            raw_text: Vec::new(),
        }
    }
}

/// Format a date in the canonical `MM/DD/YYYY` output form.
pub fn canonical_date(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_date_zero_pads() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(canonical_date(d), "03/05/2024");
    }

    #[test]
    fn empty_record_has_placeholder_title() {
        let r = ReceiptRecord::empty();
        assert_eq!(r.title, UNTITLED_TITLE);
        assert_eq!(r.amount, 0.0);
        assert_eq!(r.currency, Currency::Unknown);
        assert!(r.date.is_empty());
    }

    #[test]
    fn serializes_with_contract_field_names() {
        let r = ReceiptRecord {
            title: "DOMINO'S PIZZA".into(),
            date: "03/15/2024".into(),
            amount: 33.71,
            currency: Currency::Usd,
            raw_text: vec!["Total: $33.71".into()],
        };
        let json: serde_json::Value = serde_json::to_value(&r).unwrap();
        assert_eq!(json["title"], "DOMINO'S PIZZA");
        assert_eq!(json["date"], "03/15/2024");
        assert_eq!(json["amount"], 33.71);
        assert_eq!(json["currency"], "USD");
        assert_eq!(json["raw_text"][0], "Total: $33.71");
    }
}
