//! Comparison form of text: accents stripped, ASCII only, lowercase.

use crate::spreadsheet::CellValue;
use unicode_normalization::UnicodeNormalization;

/// Decomposes `text` (NFD), drops every non-ASCII character and lowercases the rest.
///
/// Combining marks disappear with the decomposition, so `"CAFÉ"` becomes
/// `"cafe"`. Characters without an ASCII base (`"ß"`, `"€"`) are dropped.
pub fn normalize(text: &str) -> String {
    text.nfd()
        .filter(char::is_ascii)
        .map(|character| character.to_ascii_lowercase())
        .collect()
}

/// Normalizes the string form of a cell; missing cells give `""`.
pub fn normalize_value(value: &CellValue) -> String {
    match value {
        CellValue::Missing => String::new(),
        value => normalize(&value.to_string()),
    }
}
