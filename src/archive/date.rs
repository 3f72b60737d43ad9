//! Readable dates for the date column: day offsets become `DD/MM/YYYY`.

use crate::spreadsheet::CellValue;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;

const DISPLAY_FORMAT: &str = "%d/%m/%Y";

/// Renders a date cell for display.
///
/// Numbers are day offsets from 1899-12-30 and may carry a fraction of a day.
/// Any other value, including cells typed as dates, keeps its string form.
/// Missing cells give `""`.
pub fn format_date(value: &CellValue) -> String {
    match value {
        CellValue::Missing => String::new(),
        CellValue::Number(days) => format_serial(*days).unwrap_or_else(|| value.to_string()),
        CellValue::Date(_) | CellValue::Text(_) => value.to_string(),
    }
}

/// Formats a day offset from 1899-12-30, or `None` when it falls outside the calendar.
pub fn format_serial(days: f64) -> Option<String> {
    if !days.is_finite() {
        return None;
    }
    let milliseconds = (days * 86_400_000f64).round();
    if milliseconds.abs() >= i64::MAX as f64 {
        return None;
    }
    epoch()
        .checked_add_signed(Duration::try_milliseconds(milliseconds as i64)?)
        .map(|datetime| datetime.format(DISPLAY_FORMAT).to_string())
}

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .expect("NaiveDate Literal")
        .and_hms_opt(0, 0, 0)
        .expect("NaiveTime Literal")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_day_offsets() {
        assert_eq!(format_date(&CellValue::Number(0.0)), "30/12/1899");
        assert_eq!(format_date(&CellValue::Number(1.0)), "31/12/1899");
        assert_eq!(format_date(&CellValue::Number(36000.0)), "24/07/1998");
        assert_eq!(format_date(&CellValue::Number(36000.75)), "24/07/1998");
        assert_eq!(format_date(&CellValue::Number(-1.0)), "29/12/1899");
    }

    #[test]
    fn passes_text_through() {
        assert_eq!(format_date(&CellValue::from("March 2020")), "March 2020");
        assert_eq!(format_date(&CellValue::from("")), "");
        assert_eq!(format_date(&CellValue::Missing), "");
    }

    #[test]
    fn typed_dates_keep_their_string_form() {
        let datetime = NaiveDate::from_ymd_opt(1985, 5, 3).unwrap().and_hms_opt(10, 30, 0).unwrap();
        assert_eq!(format_date(&CellValue::Date(datetime)), "1985-05-03 10:30:00");
    }

    #[test]
    fn out_of_range_offsets_fall_back_to_the_number() {
        assert_eq!(format_date(&CellValue::Number(1e15)), "1000000000000000");
        assert_eq!(format_serial(f64::INFINITY), None);
    }
}
