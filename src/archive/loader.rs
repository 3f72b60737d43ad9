//! Directory scan, per-file reading under two header conventions, and merge.

use crate::archive::options::ArchiveOptions;
use crate::archive::Archive;
use crate::archive::FileDiagnostic;
use crate::archive::FileOutcome;
use crate::error::ClippingsError;
use crate::spreadsheet;
use crate::spreadsheet::CellValue;
use crate::spreadsheet::Table;
use glob::Pattern;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Prefix of the lock files the spreadsheet editor leaves next to open workbooks.
pub const LOCK_FILE_PREFIX: &str = "~$";

/// Column holding the source file name when provenance is on.
pub const PROVENANCE_COLUMN: &str = "Origen";

/// Candidate extensions, in discovery order.
const EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

/// Physical row holding the column names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderRow {
    /// Row 2, below a cosmetic title row. Tried first.
    Second,
    /// Row 1. Tried when the second row fails.
    First,
}

impl HeaderRow {
    pub fn offset(self) -> usize {
        match self {
            HeaderRow::Second => 1,
            HeaderRow::First => 0,
        }
    }
}

/// Reads one workbook as a table whose header is the 0-based row `header_row`.
pub trait TableReader {
    fn read_table(&self, path: &Path, header_row: usize) -> Result<Table, ClippingsError>;
}

/// Reads `.xlsx` and `.xls` workbooks from disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct WorkbookReader;

impl TableReader for WorkbookReader {
    fn read_table(&self, path: &Path, header_row: usize) -> Result<Table, ClippingsError> {
        spreadsheet::read_table(path, header_row)
    }
}

/// Lists the workbooks of `directory`: every `*.xlsx` then every `*.xls`,
/// alphabetically within each extension, without editor lock files.
pub fn discover_files(directory: &Path) -> Result<Vec<PathBuf>, ClippingsError> {
    let prefix = Pattern::escape(&directory.to_string_lossy());
    let mut files = Vec::new();
    for extension in EXTENSIONS {
        for entry in glob::glob(&format!("{prefix}/*.{extension}"))? {
            match entry {
                Ok(path) if is_lock_file(&path) => debug!(path = %path.display(), "Skip lock file"),
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => (),
                Err(error) => warn!(%error, "Unreadable directory entry"),
            }
        }
    }
    Ok(files)
}

fn is_lock_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with(LOCK_FILE_PREFIX))
        .unwrap_or(false)
}

/// Reads a workbook with the header on the second row, then on the first.
/// When both fail, both errors are returned.
pub fn read_with_fallback<R: TableReader + ?Sized>(
    reader: &R,
    path: &Path,
) -> Result<(HeaderRow, Table), (ClippingsError, ClippingsError)> {
    let primary = match reader.read_table(path, HeaderRow::Second.offset()) {
        Ok(table) => return Ok((HeaderRow::Second, table)),
        Err(error) => error,
    };
    debug!(path = %path.display(), error = %primary, "Header on row 2 failed, trying row 1");
    match reader.read_table(path, HeaderRow::First.offset()) {
        Ok(table) => Ok((HeaderRow::First, table)),
        Err(fallback) => Err((primary, fallback)),
    }
}

/// Loads every workbook of `directory` with the default reader.
pub fn load_archive(directory: &Path, options: ArchiveOptions) -> Result<Archive, ClippingsError> {
    load_archive_with(&WorkbookReader, directory, options)
}

/// Loads every workbook of `directory` through `reader` and merges them.
///
/// Files that cannot be read under either header convention are skipped and
/// reported in the diagnostics. The file count covers every candidate file,
/// unless none of them could be read.
pub fn load_archive_with<R: TableReader + ?Sized>(
    reader: &R,
    directory: &Path,
    options: ArchiveOptions,
) -> Result<Archive, ClippingsError> {
    let files = discover_files(directory)?;
    if files.is_empty() {
        info!(directory = %directory.display(), "No workbooks found");
        return Ok(Archive::empty(options));
    }

    let mut tables: Vec<Table> = Vec::new();
    let mut diagnostics: Vec<FileDiagnostic> = Vec::new();
    for path in files.iter() {
        debug!(path = %path.display(), "Reading workbook");
        let outcome = match read_with_fallback(reader, path) {
            Ok((convention, mut table)) => {
                if options.provenance {
                    attach_provenance(&mut table, path);
                }
                let rows = table.len();
                tables.push(table);
                FileOutcome::Parsed { convention, rows }
            }
            Err((primary, fallback)) => {
                warn!(path = %path.display(), %primary, %fallback, "Skipping unreadable workbook");
                FileOutcome::Skipped { primary, fallback }
            }
        };
        diagnostics.push(FileDiagnostic { path: path.to_owned(), outcome });
    }

    let file_count = if tables.is_empty() { 0 } else { files.len() };
    let (columns, rows) = merge(tables);
    info!(files = file_count, clippings = rows.len(), "Archive loaded");
    Ok(Archive::new(columns, rows, file_count, diagnostics, options))
}

/// Sets the provenance column of every row to the file base name.
fn attach_provenance(table: &mut Table, path: &Path) {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let index = match table.columns.iter().position(|column| column == PROVENANCE_COLUMN) {
        Some(index) => index,
        None => {
            table.columns.push(PROVENANCE_COLUMN.to_owned());
            table.rows.iter_mut().for_each(|row| row.push(CellValue::Missing));
            table.columns.len() - 1
        }
    };
    for row in table.rows.iter_mut() {
        row[index] = CellValue::Text(name.to_owned());
    }
}

/// Concatenates tables under the union of their columns, in first-seen order.
fn merge(tables: Vec<Table>) -> (Vec<String>, Vec<Vec<CellValue>>) {
    let mut columns: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for table in tables.iter() {
        for column in table.columns.iter() {
            if !positions.contains_key(column) {
                positions.insert(column.to_owned(), columns.len());
                columns.push(column.to_owned());
            }
        }
    }

    let mut rows: Vec<Vec<CellValue>> = Vec::with_capacity(tables.iter().map(Table::len).sum());
    for table in tables {
        let targets: Vec<usize> = table.columns.iter().map(|column| positions[column]).collect();
        for row in table.rows {
            let mut merged = vec![CellValue::Missing; columns.len()];
            for (target, value) in targets.iter().zip(row) {
                merged[*target] = value;
            }
            rows.push(merged);
        }
    }
    (columns, rows)
}
