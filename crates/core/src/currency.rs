use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency of an extracted amount. `Unknown` means no symbol or currency
/// word could be resolved from the receipt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
    Inr,
    Unknown,
}

impl Currency {
    /// Resolve a currency symbol character.
    pub fn from_symbol(symbol: char) -> Currency {
        match symbol {
            '$' => Currency::Usd,
            '€' => Currency::Eur,
            '£' => Currency::Gbp,
            '¥' => Currency::Jpy,
            '₹' => Currency::Inr,
            _ => Currency::Unknown,
        }
    }

    /// Resolve a currency word ("Rs", "rupees") or a one-character symbol.
    /// Case-insensitive; trailing dots on words are ignored.
    pub fn from_indicator(indicator: &str) -> Currency {
        let token = indicator.trim().trim_end_matches('.').to_lowercase();
        if let Some(c) = token.chars().next() {
            if token.chars().count() == 1 {
                return Currency::from_symbol(c);
            }
        }
        match token.as_str() {
            "rs" | "rupee" | "rupees" => Currency::Inr,
            _ => Currency::Unknown,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Inr => "INR",
            Currency::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_table() {
        assert_eq!(Currency::from_symbol('$'), Currency::Usd);
        assert_eq!(Currency::from_symbol('€'), Currency::Eur);
        assert_eq!(Currency::from_symbol('£'), Currency::Gbp);
        assert_eq!(Currency::from_symbol('¥'), Currency::Jpy);
        assert_eq!(Currency::from_symbol('₹'), Currency::Inr);
        assert_eq!(Currency::from_symbol('#'), Currency::Unknown);
    }

    #[test]
    fn word_indicators_resolve_to_inr() {
        assert_eq!(Currency::from_indicator("Rs"), Currency::Inr);
        assert_eq!(Currency::from_indicator("rs."), Currency::Inr);
        assert_eq!(Currency::from_indicator("Rupees"), Currency::Inr);
    }

    #[test]
    fn single_char_indicator_goes_through_symbol_table() {
        assert_eq!(Currency::from_indicator("₹"), Currency::Inr);
        assert_eq!(Currency::from_indicator("$"), Currency::Usd);
    }

    #[test]
    fn serializes_as_upper_case_code() {
        assert_eq!(serde_json::to_string(&Currency::Usd).unwrap(), "\"USD\"");
        assert_eq!(
            serde_json::to_string(&Currency::Unknown).unwrap(),
            "\"UNKNOWN\""
        );
    }
}
