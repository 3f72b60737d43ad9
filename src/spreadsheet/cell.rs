use crate::spreadsheet::CellValue;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;

/// Storage types of raw cell values.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    Boolean,
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    NumberDate1900,
    NumberTime1900,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    NumberDate1904,
    NumberTime1904,
    /// ISO 8601 date/time strings (`t="d"`)
    IsoDateTime,
    InlineString,
    SharedString,
    Error,
}

impl CellType {
    /// Classifies the built-in number format ids that denote dates or times.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }),
            _ => None,
        }
    }

    /// Classifies a custom format code by the date and time tokens outside
    /// quoted literals, escapes and bracketed sections.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }
}

/// One non-empty cell as stored in the workbook.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    pub(crate) row: usize,
    pub(crate) col: usize,
    pub(crate) kind: CellType,
    /// Raw value: number text, string, shared string index or `0`/`1` for booleans
    pub(crate) value: String,
}

impl Cell {
    /// Resolves the raw value into a [`CellValue`]. Values that do not parse
    /// under their declared type fall back to text.
    pub(crate) fn to_value(&self, shared_strings: &[String]) -> CellValue {
        let text = || CellValue::Text(self.value.to_owned());
        match self.kind {
            CellType::Empty | CellType::Error => CellValue::Missing,
            _ if self.value.is_empty() => CellValue::Missing,
            CellType::Boolean => CellValue::Text(if self.value == "1" { "True" } else { "False" }.to_owned()),
            CellType::InlineString => text(),
            CellType::SharedString => self
                .value
                .parse::<usize>()
                .ok()
                .and_then(|index| shared_strings.get(index))
                .map(|string| CellValue::Text(string.to_owned()))
                .unwrap_or(CellValue::Missing),
            CellType::Number => self.value.parse::<f64>().map(CellValue::Number).unwrap_or_else(|_| text()),
            CellType::NumberDateTime1900 | CellType::NumberDate1900 => self.to_date_value(false).unwrap_or_else(text),
            CellType::NumberDateTime1904 | CellType::NumberDate1904 => self.to_date_value(true).unwrap_or_else(text),
            CellType::NumberTime1900 | CellType::NumberTime1904 => self
                .value
                .parse::<f64>()
                .ok()
                .and_then(to_time_string)
                .map(CellValue::Text)
                .unwrap_or_else(text),
            CellType::IsoDateTime => parse_iso_datetime(&self.value).map(CellValue::Date).unwrap_or_else(text),
        }
    }

    fn to_date_value(&self, is_1904: bool) -> Option<CellValue> {
        let serial = self.value.parse::<f64>().ok()?;
        serial_to_datetime(serial, is_1904).map(CellValue::Date)
    }
}

/// Converts a workbook date serial into a timestamp, with millisecond precision.
/// The 1900 system counts the nonexistent 1900-02-29, so serials below 60 are shifted by a day.
pub(crate) fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.trunc();
    let shift = if is_1904 {
        1462
    } else if days < 60.0 {
        1
    } else {
        0
    };
    let milliseconds = (serial * 86_400_000f64).round();
    if milliseconds.abs() > i64::MAX as f64 / 2.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .expect("NaiveDate Literal")
        .and_hms_opt(0, 0, 0)
        .expect("NaiveTime Literal");
    epoch
        .checked_add_signed(Duration::try_days(shift)?)?
        .checked_add_signed(Duration::try_milliseconds(milliseconds as i64)?)
}

/// Renders a day fraction as `HH:MM:SS`, adding `.mmm` when milliseconds are present.
fn to_time_string(fraction: f64) -> Option<String> {
    if !fraction.is_finite() || fraction < 0.0 {
        return None;
    }
    let mut time = (fraction.fract() * 86_400_000f64).round() as i64;
    let milliseconds = time % 1_000; time /= 1_000;
    let seconds = time % 60; time /= 60;
    let minutes = time % 60; time /= 60;
    let hours = time;
    Some(if milliseconds > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    })
}

fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    if value.contains('T') {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok()
    } else {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    }
}

/// Maps number format ids (one per cell style) to cell types, preferring
/// custom formats over built-in ones.
pub(crate) fn resolve_number_formats<F>(format_ids: &[String], custom_formats: F, is_1904: bool) -> Vec<CellType>
where
    F: Fn(&str) -> Option<CellType>,
{
    format_ids
        .iter()
        .map(|id| {
            custom_formats(id)
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect()
}
