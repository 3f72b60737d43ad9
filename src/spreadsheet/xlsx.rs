use crate::error::ClippingsError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::resolve_number_formats;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::FileReader;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use zip::ZipArchive;

const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");
const TAG_FORMAT_INDEX: QName = QName(b"xf");
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");
const TAG_PHONETIC_TEXT: QName = QName(b"rPh"); // Furigana runs are not part of the value
const TAG_TEXT: QName = QName(b"t");
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

/// An Office Open XML workbook.
pub(crate) struct XlsxSpreadsheet {
    pub(crate) name: String,
    zip: ZipArchive<FileReader>,
    number_formats: Vec<CellType>,
    /// Worksheets in workbook order as (name, zip path)
    sheets: Vec<(String, String)>,
}

impl XlsxSpreadsheet {
    pub(crate) fn open(path: &Path) -> Result<XlsxSpreadsheet, ClippingsError> {
        let name = path.to_string_lossy().to_string();
        let mut zip = excel::open(path)?;
        let (sheets, is_1904) = load_workbook(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::NoWorksheet(name.to_owned()))?
        }
        let number_formats = load_number_formats(&mut zip, is_1904)?;
        Ok(XlsxSpreadsheet { name, zip, number_formats, sheets })
    }

    fn load_shared_strings(&mut self) -> Result<Vec<String>, ClippingsError> {
        let mut shared_strings = Vec::<String>::new();
        let Some(mut reader) = self.zip.xml_reader("xl/sharedStrings.xml")? else {
            return Ok(shared_strings);
        };
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
                shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
            }
        });
        Ok(shared_strings)
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn read_first_sheet(&mut self) -> Result<Sheet, ClippingsError> {
        let (sheet_name, zip_path) = self
            .sheets
            .first()
            .cloned()
            .ok_or_else(|| SpreadsheetError::NoWorksheet(self.name.to_owned()))?;
        let mut sheet = Sheet::new(&self.name, &sheet_name);
        sheet.shared_strings = self.load_shared_strings()?;

        let mut reader = self
            .zip
            .xml_reader(&zip_path)?
            .ok_or_else(|| SpreadsheetError::MissingPart(zip_path.to_owned()))?;
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                // Rows without `r` follow the previous one
                row_count = event.get_attribute_value("r")?
                    .and_then(|r| r.parse::<usize>().ok())
                    .map(|r| r.saturating_sub(1))
                    .unwrap_or(row_count);
                col_count = 0;
            }
            Event::End(event) if event.name() == TAG_ROW => {
                row_count += 1;
            }
            Event::Start(event) if event.name() == TAG_CELL => {
                (row, col) = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row_count, col_count));
                col_count = col + 1;
                value.clear();
                kind = event.get_attribute_value("t")?.map(|t| {
                    match t.as_ref() {
                        "inlineStr" | "str" => CellType::InlineString,
                        "s" => CellType::SharedString,
                        "d" => CellType::IsoDateTime,
                        "b" => CellType::Boolean,
                        "e" => CellType::Error,
                        _ => CellType::Number,
                    }
                }).unwrap_or(CellType::Number);
                if kind == CellType::Number {
                    if let Some(style) = event.get_attribute_value("s")? {
                        if let Ok(index) = style.parse::<usize>() {
                            kind = self.number_formats.get(index).copied().unwrap_or(CellType::Number);
                        }
                    }
                }
            }
            Event::Start(event) if event.name() == TAG_INLINE_STRING => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if event.name() == TAG_VALUE => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if event.name() == TAG_CELL => {
                // Error cells read as missing, so they are not kept
                if kind != CellType::Error {
                    sheet.push(Cell { row, col, kind, value: std::mem::take(&mut value) });
                }
            }
        });
        Ok(sheet)
    }
}

/// Reads the worksheet list and the date system from `xl/workbook.xml`.
fn load_workbook(zip: &mut ZipArchive<FileReader>) -> Result<(Vec<(String, String)>, bool), ClippingsError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip
        .xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::MissingPart("xl/workbook.xml".to_owned()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value == "1" || value == "true")
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Reads one cell type per cell style from `xl/styles.xml`.
fn load_number_formats(zip: &mut ZipArchive<FileReader>, is_1904: bool) -> Result<Vec<CellType>, ClippingsError> {
    let Some(mut reader) = zip.xml_reader("xl/styles.xml")? else {
        return Ok(Vec::new());
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id.to_string(), CellType::parse_custom_number_format(&format, is_1904));
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            let id = event.get_attribute_value("numFmtId")?;
            format_indexes.push(id.map(|id| id.to_string()).unwrap_or_else(|| "0".to_owned()));
        }
    });

    Ok(resolve_number_formats(&format_indexes, |id| custom_formats.get(id).copied(), is_1904))
}

/// Collects the text of a string item up to `end_tag`, skipping phonetic runs.
fn read_string_value<R: BufRead>(reader: &mut XmlReader<R>, end_tag: QName, is_text_content: bool) -> Result<String, ClippingsError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::CellValue;
    use crate::testing::WorkbookFixture;
    use chrono::NaiveDate;

    #[test]
    fn reads_the_first_worksheet() {
        let directory = tempfile::tempdir().unwrap();
        let path = WorkbookFixture::new()
            .row(&["Titulo", "Fecha", "Tomo"])
            .row(&["La movida", "d:36000", "n:3"])
            .write(directory.path(), "tomo3.xlsx");

        let mut spreadsheet = XlsxSpreadsheet::open(&path).unwrap();
        let sheet = spreadsheet.read_first_sheet().unwrap();
        assert_eq!(sheet.name, "Hoja1");
        let table = sheet.to_table(0).unwrap();
        assert_eq!(table.columns, vec!["Titulo", "Fecha", "Tomo"]);

        let date = NaiveDate::from_ymd_opt(1998, 7, 24).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(
            table.rows,
            vec![vec![CellValue::from("La movida"), CellValue::Date(date), CellValue::Number(3.0)]]
        );
    }

    #[test]
    fn shared_strings_and_error_cells() {
        let directory = tempfile::tempdir().unwrap();
        let path = WorkbookFixture::new()
            .shared_strings(&["Autor", "Larra"])
            .raw_row(r#"<c r="A1" t="s"><v>0</v></c><c r="B1" t="inlineStr"><is><t>Nota</t></is></c>"#)
            .raw_row(r#"<c r="A2" t="s"><v>1</v></c><c r="B2" t="e"><v>#N/A</v></c>"#)
            .raw_row(r#"<c r="A3" t="b"><v>1</v></c>"#)
            .write(directory.path(), "tomo4.xlsx");

        let table = XlsxSpreadsheet::open(&path).unwrap().read_first_sheet().unwrap().to_table(0).unwrap();
        assert_eq!(table.columns, vec!["Autor", "Nota"]);
        assert_eq!(
            table.rows,
            vec![
                vec![CellValue::from("Larra"), CellValue::Missing],
                vec![CellValue::from("True"), CellValue::Missing],
            ]
        );
    }

    #[test]
    fn missing_workbook_parts_are_errors() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("roto.xlsx");
        std::fs::write(&path, b"not a zip").unwrap();
        assert!(XlsxSpreadsheet::open(&path).is_err());
    }
}
