//! Field extractors: independent, prioritized pattern/heuristic cascades
//! evaluated over the full ranked line list.

pub mod amount;
pub mod date;
pub mod title;

pub use amount::{extract_amount, AmountMatch};
pub use date::{extract_date, DateMatch};
pub use title::{extract_title, TitleMatch};
