//! Cell coercion for the Aircraft Characteristics workbook.
//!
//! Source cells are inconsistent legacy text: numbers may carry thousands
//! separators, and "N/A" or a blank cell both mean the value is unknown.
//! A cell that cannot be parsed degrades to `None` instead of rejecting the row.

/// Literal the FAA export uses for "not applicable / unknown".
pub const NOT_AVAILABLE: &str = "N/A";

/// Outcome of coercing a single numeric cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced<T> {
    Value(T),
    /// Empty cell or the `N/A` sentinel
    Blank,
    /// Cell had content but it did not parse
    Unparseable,
}

impl<T> Coerced<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Coerced::Value(v) => Some(v),
            Coerced::Blank | Coerced::Unparseable => None,
        }
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self, Coerced::Unparseable)
    }
}

pub fn coerce_string(cell: &str) -> String {
    cell.trim().to_string()
}

/// Trimmed numeric text with thousands separators removed, or `None` for blank/N/A.
fn numeric_text(cell: &str) -> Option<String> {
    let t = cell.trim();
    if t.is_empty() || t == NOT_AVAILABLE {
        return None;
    }
    Some(t.replace(',', ""))
}

pub fn classify_integer(cell: &str) -> Coerced<i32> {
    match numeric_text(cell) {
        None => Coerced::Blank,
        Some(clean) => match clean.parse::<i32>() {
            Ok(v) => Coerced::Value(v),
            Err(_) => Coerced::Unparseable,
        },
    }
}

pub fn classify_real(cell: &str) -> Coerced<f64> {
    match numeric_text(cell) {
        None => Coerced::Blank,
        Some(clean) => match clean.parse::<f64>() {
            Ok(v) if v.is_finite() => Coerced::Value(v),
            _ => Coerced::Unparseable,
        },
    }
}

pub fn coerce_integer(cell: &str) -> Option<i32> {
    classify_integer(cell).value()
}

pub fn coerce_real(cell: &str) -> Option<f64> {
    classify_real(cell).value()
}
