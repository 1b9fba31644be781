use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse expense category inferred from receipt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseCategory {
    Food,
    Transport,
    Shopping,
    Utilities,
    Entertainment,
    Other,
}

/// Keyword table driving categorization. First row with any hit wins.
const CATEGORY_TABLE: &[(ExpenseCategory, &[&str])] = &[
    (
        ExpenseCategory::Food,
        &["restaurant", "cafe", "food", "pizza", "burger", "hotel"],
    ),
    (
        ExpenseCategory::Transport,
        &["uber", "ola", "metro", "bus", "train", "fuel"],
    ),
    (
        ExpenseCategory::Shopping,
        &["store", "shop", "market", "mall"],
    ),
    (
        ExpenseCategory::Utilities,
        &["electricity", "water", "gas", "internet", "phone"],
    ),
    (
        ExpenseCategory::Entertainment,
        &["movie", "theatre", "concert", "game"],
    ),
];

impl ExpenseCategory {
    /// Categorize free-form receipt text by keyword lookup.
    pub fn classify(text: &str) -> ExpenseCategory {
        let lower = text.to_lowercase();
        for (category, keywords) in CATEGORY_TABLE {
            if keywords.iter().any(|k| lower.contains(k)) {
                return *category;
            }
        }
        ExpenseCategory::Other
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpenseCategory::Food => write!(f, "Food"),
            ExpenseCategory::Transport => write!(f, "Transport"),
            ExpenseCategory::Shopping => write!(f, "Shopping"),
            ExpenseCategory::Utilities => write!(f, "Utilities"),
            ExpenseCategory::Entertainment => write!(f, "Entertainment"),
            ExpenseCategory::Other => write!(f, "Other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_food() {
        assert_eq!(
            ExpenseCategory::classify("DOMINO'S PIZZA receipt"),
            ExpenseCategory::Food
        );
        assert_eq!(
            ExpenseCategory::classify("Restaurant bill"),
            ExpenseCategory::Food
        );
    }

    #[test]
    fn classify_transport() {
        assert_eq!(
            ExpenseCategory::classify("Uber ride downtown"),
            ExpenseCategory::Transport
        );
    }

    #[test]
    fn classify_unmatched_is_other() {
        assert_eq!(
            ExpenseCategory::classify("random text"),
            ExpenseCategory::Other
        );
    }

    #[test]
    fn first_table_row_wins() {
        // "hotel food store": food row comes before shopping.
        assert_eq!(
            ExpenseCategory::classify("hotel store"),
            ExpenseCategory::Food
        );
    }
}
