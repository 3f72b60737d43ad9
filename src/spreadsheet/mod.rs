//! # Spreadsheet Reader
//!
//! Reads the first worksheet of an Excel workbook into typed cells and turns it
//! into a header-named [`Table`]. Two container formats are supported:
//! Office Open XML (`.xlsx`, `.xlsm`) and BIFF8 inside an OLE compound file
//! (`.xls`).

mod cell;
mod excel;
mod reference;
mod sheet;
mod table;
mod value;
mod xlsx;
pub(crate) mod xls;

use crate::error::ClippingsError;
use crate::error::ResultMessage;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::xls::XlsSpreadsheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
pub use reference::index_to_reference;
pub use reference::reference_to_index;
pub use table::Table;
pub use value::CellValue;

/// Format-level failures. Lower level container errors are reported through
/// their own helper error types.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Cannot detect file format for '{0}'")]
    UnsupportedFormat(String),

    #[error("Workbook '{0}' is password protected")]
    PasswordProtected(String),

    #[error("Workbook '{0}' has no worksheet")]
    NoWorksheet(String),

    #[error("Missing workbook part '{0}'")]
    MissingPart(String),

    #[error("Sheet '{0}' is empty")]
    EmptySheet(String),

    #[error("Sheet '{0}' has no header at row {1}")]
    MissingHeaderRow(String, usize),
}

pub(crate) type FileReader = BufReader<File>;

/// Common interface of the workbook readers.
pub(crate) trait Spreadsheet {
    fn name(&self) -> String;

    /// Reads every cell of the first worksheet.
    fn read_first_sheet(&mut self) -> Result<Sheet, ClippingsError>;
}

/// Opens a workbook, choosing the reader by file extension.
pub(crate) fn open_spreadsheet(path: &Path) -> Result<Box<dyn Spreadsheet>, ClippingsError> {
    let name = path.to_string_lossy().to_string();
    let extension = path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase);
    let spreadsheet: Box<dyn Spreadsheet> = match extension.as_deref() {
        Some("xlsx") | Some("xlsm") => Box::new(XlsxSpreadsheet::open(path)?),
        Some("xls") => Box::new(XlsSpreadsheet::open(path)?),
        _ => Err(SpreadsheetError::UnsupportedFormat(name))?,
    };
    Ok(spreadsheet)
}

/// Reads the first worksheet of `path` as a table whose header is the
/// 0-based physical row `header_row`.
pub fn read_table(path: &Path, header_row: usize) -> Result<Table, ClippingsError> {
    let file_name = path.to_string_lossy().to_string();
    let read = || -> Result<Table, ClippingsError> {
        let mut spreadsheet = open_spreadsheet(path)?;
        debug!(workbook = %spreadsheet.name(), header_row, "Reading first worksheet");
        spreadsheet.read_first_sheet()?.to_table(header_row)
    };
    read().with_prefix(&file_name)
}
