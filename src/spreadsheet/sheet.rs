use crate::error::ClippingsError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::CellValue;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::Table;
use std::collections::BTreeMap;
use std::collections::HashMap;

/// Cells of one worksheet together with the used range.
pub(crate) struct Sheet {
    /// Source file name
    pub(crate) file_name: String,
    pub(crate) name: String,
    pub(crate) cells: Vec<Cell>,
    /// Shared string table the cells refer to
    pub(crate) shared_strings: Vec<String>,
    pub(crate) row_upper_bound: Option<usize>,
    pub(crate) col_lower_bound: Option<usize>,
    pub(crate) col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(super) fn new(file_name: &str, name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            cells: Vec::new(),
            shared_strings: Vec::new(),
            row_upper_bound: None,
            col_lower_bound: None,
            col_upper_bound: None,
        }
    }

    /// Appends a cell and widens the used range. Cells without a raw value are dropped.
    pub(super) fn push(&mut self, cell: Cell) {
        if cell.value.is_empty() {
            return;
        }
        self.row_upper_bound = Some(self.row_upper_bound.map_or(cell.row, |row| row.max(cell.row)));
        self.col_lower_bound = Some(self.col_lower_bound.map_or(cell.col, |col| col.min(cell.col)));
        self.col_upper_bound = Some(self.col_upper_bound.map_or(cell.col, |col| col.max(cell.col)));
        self.cells.push(cell);
    }

    /// Builds a table whose header is the physical row `header_row`.
    ///
    /// Columns span the used column range. Blank header cells are named
    /// `Unnamed: {i}` and repeated names get `.1`, `.2`... suffixes. Rows
    /// after the header become data; rows without any value are dropped.
    pub(crate) fn to_table(&self, header_row: usize) -> Result<Table, ClippingsError> {
        let (Some(row_upper), Some(col_lower), Some(col_upper)) =
            (self.row_upper_bound, self.col_lower_bound, self.col_upper_bound)
        else {
            return Err(SpreadsheetError::EmptySheet(format!("{}!{}", self.file_name, self.name)).into());
        };
        if header_row > row_upper {
            Err(SpreadsheetError::MissingHeaderRow(self.name.to_owned(), header_row + 1))?
        }

        let width = col_upper - col_lower + 1;
        let mut rows: BTreeMap<usize, Vec<CellValue>> = BTreeMap::new();
        for cell in self.cells.iter().filter(|cell| cell.row >= header_row) {
            let value = cell.to_value(&self.shared_strings);
            if !value.is_missing() {
                let row = rows.entry(cell.row).or_insert_with(|| vec![CellValue::Missing; width]);
                row[cell.col - col_lower] = value;
            }
        }

        let header = rows.remove(&header_row).unwrap_or_else(|| vec![CellValue::Missing; width]);
        Ok(Table {
            columns: to_column_names(header),
            rows: rows.into_values().collect(),
        })
    }
}

fn to_column_names(header: Vec<CellValue>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    header
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let mut name = match value.to_string() {
                name if name.trim().is_empty() => format!("Unnamed: {index}"),
                name => name,
            };
            let mut count = counts.get(&name).copied().unwrap_or(0);
            while count > 0 {
                counts.insert(name.to_owned(), count + 1);
                name = format!("{name}.{count}");
                count = counts.get(&name).copied().unwrap_or(0);
            }
            counts.insert(name.to_owned(), count + 1);
            name
        })
        .collect()
}
