//! # Clipping Archive
//!
//! Loads every workbook of a directory into one ordered table of clippings,
//! derives a readable date, a location and a normalized search key for each
//! record, and filters records by free-text queries.

pub mod cache;
pub mod date;
pub mod index;
pub mod loader;
pub mod normalize;
pub mod options;
pub mod query;
pub mod roles;
pub mod view;

use crate::archive::index::build_index;
use crate::archive::loader::HeaderRow;
use crate::archive::roles::infer_roles;
use crate::archive::roles::RoleMapping;
use crate::error::ClippingsError;
use crate::spreadsheet::CellValue;
use options::ArchiveOptions;
use std::path::PathBuf;
use std::sync::Arc;

/// Value of every column a record does not have.
pub(crate) static MISSING: CellValue = CellValue::Missing;

/// One row of the merged table with its derived fields.
#[derive(Clone, Debug)]
pub struct ClippingRecord {
    columns: Arc<[String]>,
    values: Vec<CellValue>,
    display_date: String,
    display_location: String,
    search_key: String,
}

impl ClippingRecord {
    /// Value of `column`, `Missing` when the archive has no such column.
    pub fn get(&self, column: &str) -> &CellValue {
        self.columns
            .iter()
            .position(|name| name == column)
            .and_then(|index| self.values.get(index))
            .unwrap_or(&MISSING)
    }

    /// Original columns and values in archive column order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    pub fn display_date(&self) -> &str {
        &self.display_date
    }

    pub fn display_location(&self) -> &str {
        &self.display_location
    }

    pub fn search_key(&self) -> &str {
        &self.search_key
    }
}

/// How a candidate file was read.
#[derive(Debug)]
pub enum FileOutcome {
    Parsed { convention: HeaderRow, rows: usize },
    /// Both header conventions failed
    Skipped { primary: ClippingsError, fallback: ClippingsError },
}

#[derive(Debug)]
pub struct FileDiagnostic {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

impl FileDiagnostic {
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, FileOutcome::Skipped { .. })
    }
}

/// The merged, indexed result of one directory load.
#[derive(Debug)]
pub struct Archive {
    columns: Arc<[String]>,
    records: Vec<ClippingRecord>,
    file_count: usize,
    diagnostics: Vec<FileDiagnostic>,
    roles: RoleMapping,
    options: ArchiveOptions,
}

impl Archive {
    /// Builds an archive from merged rows, each aligned with `columns`.
    /// Roles are inferred once from the column set and every row is indexed.
    pub fn new(
        columns: Vec<String>,
        rows: Vec<Vec<CellValue>>,
        file_count: usize,
        diagnostics: Vec<FileDiagnostic>,
        options: ArchiveOptions,
    ) -> Archive {
        let roles = infer_roles(&columns);
        let columns: Arc<[String]> = Arc::from(columns);
        let records = rows
            .into_iter()
            .map(|values| {
                let entry = build_index(&columns, &values, &roles);
                ClippingRecord {
                    columns: Arc::clone(&columns),
                    values,
                    display_date: entry.display_date,
                    display_location: entry.display_location,
                    search_key: entry.search_key,
                }
            })
            .collect();
        Archive {
            columns,
            records,
            file_count,
            diagnostics,
            roles,
            options,
        }
    }

    /// An archive without files, as loaded from a directory with no workbooks.
    pub fn empty(options: ArchiveOptions) -> Archive {
        Archive::new(Vec::new(), Vec::new(), 0, Vec::new(), options)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|name| name == column)
    }

    pub fn records(&self) -> &[ClippingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of candidate files found, including the ones that failed to parse.
    pub fn file_count(&self) -> usize {
        self.file_count
    }

    pub fn diagnostics(&self) -> &[FileDiagnostic] {
        &self.diagnostics
    }

    pub fn roles(&self) -> &RoleMapping {
        &self.roles
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive() -> Archive {
        let columns = vec!["Titulo".to_owned(), "Tomo".to_owned(), "Pag".to_owned()];
        let rows = vec![
            vec![CellValue::from("Lluvias"), CellValue::Number(1.0), CellValue::Number(5.0)],
            vec![CellValue::from("Sequía"), CellValue::Missing, CellValue::Number(9.0)],
        ];
        Archive::new(columns, rows, 1, Vec::new(), ArchiveOptions::default())
    }

    #[test]
    fn records_share_the_column_set() {
        let archive = archive();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.roles().volume.as_deref(), Some("Tomo"));

        let record = &archive.records()[1];
        assert_eq!(record.get("Titulo"), &CellValue::from("Sequía"));
        assert_eq!(record.get("Tomo"), &CellValue::Missing);
        assert_eq!(record.get("Autor"), &CellValue::Missing);
        assert_eq!(record.display_location(), "Vol.  | Page 9");
        assert_eq!(record.search_key(), "sequia  9");

        let fields: Vec<&str> = record.fields().map(|(column, _)| column).collect();
        assert_eq!(fields, vec!["Titulo", "Tomo", "Pag"]);
    }

    #[test]
    fn empty_archives_have_no_files() {
        let archive = Archive::empty(ArchiveOptions::default());
        assert!(archive.is_empty());
        assert_eq!(archive.file_count(), 0);
        assert!(archive.columns().is_empty());
        assert!(!archive.has_column("Titulo"));
    }
}
