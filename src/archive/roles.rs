//! Guesses which columns hold the volume, page and date of a clipping.

/// Column names playing the volume, page and date roles, when found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleMapping {
    pub volume: Option<String>,
    pub page: Option<String>,
    pub date: Option<String>,
}

const VOLUME_MARKER: &str = "tomo";
const PAGE_MARKER: &str = "pag";
const DATE_MARKER: &str = "fecha";
const DATE_COLUMN: &str = "Fecha";

/// Picks, for every role, the first column whose lowercased name contains the
/// role marker. The date role falls back to a column literally named `Fecha`.
pub fn infer_roles<S: AsRef<str>>(columns: &[S]) -> RoleMapping {
    let columns: Vec<&str> = columns.iter().map(|column| column.as_ref()).collect();
    let find = |marker: &str| {
        columns
            .iter()
            .find(|column| column.to_lowercase().contains(marker))
            .map(|column| column.to_string())
    };
    let date = find(DATE_MARKER).or_else(|| {
        columns
            .iter()
            .find(|column| **column == DATE_COLUMN)
            .map(|column| column.to_string())
    });
    RoleMapping {
        volume: find(VOLUME_MARKER),
        page: find(PAGE_MARKER),
        date,
    }
}
