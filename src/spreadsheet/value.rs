use chrono::NaiveDateTime;
use std::fmt::Display;

/// Typed content of one table cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    /// A number the workbook formats as a date
    Date(NaiveDateTime),
    #[default]
    Missing,
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_owned())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Text(text) => write!(f, "{text}"),
            // f64 Display prints 12.0 as "12"
            CellValue::Number(number) => write!(f, "{number}"),
            CellValue::Date(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Missing => Ok(()),
        }
    }
}
