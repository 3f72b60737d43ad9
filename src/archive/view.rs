//! Projection of records onto the columns shown to the reader.

use crate::archive::loader::PROVENANCE_COLUMN;
use crate::archive::Archive;
use crate::archive::ClippingRecord;
use std::fmt::Display;

/// Header of the readable date column.
pub const DATE_HEADER: &str = "Fecha";

/// Header of the derived location column.
pub const LOCATION_HEADER: &str = "Ubicacion";

/// Widest a rendered cell may get before it is cut.
const MAX_CELL_WIDTH: usize = 48;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Projected {
    Original(&'static str),
    ReadableDate,
    Location,
}

const LAYOUT: [Projected; 6] = [
    Projected::Original("Titulo"),
    Projected::Original("Autor"),
    Projected::ReadableDate,
    Projected::Original("Periodico"),
    Projected::Original("Observaciones"),
    Projected::Location,
];

/// Rows of display strings under their headers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableView {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableView {
    /// Projects `records` onto the display columns the archive actually has.
    /// The readable date and the location are always shown, and the
    /// provenance column is appended when it was loaded.
    pub fn project(archive: &Archive, records: &[&ClippingRecord]) -> TableView {
        let mut layout: Vec<Projected> = LAYOUT
            .iter()
            .copied()
            .filter(|column| match column {
                Projected::Original(name) => archive.has_column(name),
                _ => true,
            })
            .collect();
        if archive.has_column(PROVENANCE_COLUMN) {
            layout.push(Projected::Original(PROVENANCE_COLUMN));
        }

        let headers = layout
            .iter()
            .map(|column| match column {
                Projected::Original(name) => name.to_string(),
                Projected::ReadableDate => DATE_HEADER.to_owned(),
                Projected::Location => LOCATION_HEADER.to_owned(),
            })
            .collect();
        let rows = records
            .iter()
            .map(|record| {
                layout
                    .iter()
                    .map(|column| match column {
                        Projected::Original(name) => record.get(name).to_string(),
                        Projected::ReadableDate => record.display_date().to_owned(),
                        Projected::Location => record.display_location().to_owned(),
                    })
                    .collect()
            })
            .collect();
        TableView { headers, rows }
    }
}

impl Display for TableView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut widths: Vec<usize> = self.headers.iter().map(|header| header.chars().count()).collect();
        for row in self.rows.iter() {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count()).min(MAX_CELL_WIDTH);
            }
        }

        write_line(f, &self.headers, &widths)?;
        let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
        writeln!(f, "{}", rule.join("-+-"))?;
        for row in self.rows.iter() {
            write_line(f, row, &widths)?;
        }
        Ok(())
    }
}

fn write_line(f: &mut std::fmt::Formatter<'_>, cells: &[String], widths: &[usize]) -> std::fmt::Result {
    let cells: Vec<String> = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, &width)| format!("{:<width$}", clip(cell, width)))
        .collect();
    writeln!(f, "{}", cells.join(" | ").trim_end())
}

fn clip(cell: &str, width: usize) -> String {
    if cell.chars().count() <= width {
        return cell.to_owned();
    }
    let mut clipped: String = cell.chars().take(width.saturating_sub(3)).collect();
    clipped.push_str("...");
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::options::ArchiveOptions;
    use crate::archive::query::search;
    use crate::spreadsheet::CellValue;
    use chrono::NaiveDate;

    fn archive(columns: &[&str], rows: Vec<Vec<CellValue>>) -> Archive {
        let columns = columns.iter().map(|column| column.to_string()).collect();
        Archive::new(columns, rows, 1, Vec::new(), ArchiveOptions::default())
    }

    #[test]
    fn projects_existing_display_columns() {
        let archive = archive(
            &["Autor", "Titulo", "Tomo", "Pag", "Fecha", "Notas"],
            vec![vec![
                "Ana".into(),
                "Lluvias".into(),
                CellValue::Number(3.0),
                CellValue::Number(12.0),
                CellValue::Number(36000.0),
                "interno".into(),
            ]],
        );
        let view = TableView::project(&archive, &search(&archive, ""));
        assert_eq!(view.headers, vec!["Titulo", "Autor", "Fecha", "Ubicacion"]);
        assert_eq!(view.rows, vec![vec!["Lluvias", "Ana", "24/07/1998", "Vol. 3 | Page 12"]]);
    }

    #[test]
    fn date_typed_cells_show_their_string_form() {
        let date = NaiveDate::from_ymd_opt(1998, 7, 24).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let archive = archive(&["Titulo", "Fecha"], vec![vec!["Lluvias".into(), CellValue::Date(date)]]);
        let view = TableView::project(&archive, &search(&archive, ""));
        assert_eq!(view.rows, vec![vec!["Lluvias", "1998-07-24 00:00:00", "See original file"]]);
    }

    #[test]
    fn derived_columns_are_always_shown() {
        let archive = archive(&["Resumen", "Origen"], vec![vec!["Sequía".into(), "tomo1.xlsx".into()]]);
        let view = TableView::project(&archive, &search(&archive, ""));
        assert_eq!(view.headers, vec!["Fecha", "Ubicacion", "Origen"]);
        assert_eq!(view.rows, vec![vec!["", "See original file", "tomo1.xlsx"]]);
    }

    #[test]
    fn renders_aligned_columns() {
        let view = TableView {
            headers: vec!["Titulo".to_owned(), "Fecha".to_owned()],
            rows: vec![vec!["Año nuevo".to_owned(), "01/01/1990".to_owned()]],
        };
        let rendered = view.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Titulo    | Fecha");
        assert_eq!(lines[1], "----------+-----------");
        assert_eq!(lines[2], "Año nuevo | 01/01/1990");
    }

    #[test]
    fn long_cells_are_clipped() {
        assert_eq!(clip("abcdef", 6), "abcdef");
        assert_eq!(clip("abcdefgh", 6), "abc...");
    }
}
