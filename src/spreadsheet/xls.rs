use crate::error::ClippingsError;
use crate::error::ResultOptionChain;
use crate::helpers::biff8::Biff8Reader;
use crate::helpers::cfb::Cfb;
use crate::match_biff8_record;
use crate::spreadsheet::cell::resolve_number_formats;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use either::Either;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

// BIFF8 record types
const FORMULA: u16 = 6;
const EOF: u16 = 10;
const DATE1904: u16 = 34;
const FILE_PASS: u16 = 47;
const CODE_PAGE: u16 = 66;
const BOUND_SHEET8: u16 = 133;
const MUL_RK: u16 = 189;
const XF: u16 = 224;
const SST: u16 = 252;
const LABEL_SST: u16 = 253;
const NUMBER: u16 = 515;
const LABEL: u16 = 516;
const BOOL_ERR: u16 = 517;
const STRING: u16 = 519;
const ARRAY: u16 = 545;
const TABLE: u16 = 566;
const RK: u16 = 638;
const SHARED_FORMULA: u16 = 1212;
const FORMAT: u16 = 1054;
const BOF: u16 = 2057;

/// BOUNDSHEET8 sheet type of a worksheet (as opposed to charts and macro sheets)
const WORKSHEET: u8 = 0;

#[derive(Error, Debug)]
pub enum XlsError {
    #[error("Invalid Code page '{0}'")]
    CodePageError(u16),

    #[error("Invalid Formula value '{0:#018x}'")]
    FormulaValueError(u64),
}

/// Raw cell content: either a fixed type or a style index to resolve through the number formats.
type CellContent = (Either<CellType, usize>, String);

/// A BIFF8 workbook with its global records already read.
pub(crate) struct XlsSpreadsheet {
    pub(crate) name: String,
    reader: Biff8Reader,
    shared_strings: Vec<String>,
    number_formats: Vec<CellType>,
    /// Worksheets in workbook order as (name, stream position)
    sheets: Vec<(String, usize)>,
}

impl XlsSpreadsheet {
    pub(crate) fn open(path: &Path) -> Result<XlsSpreadsheet, ClippingsError> {
        let name = path.to_string_lossy().to_string();
        let mut buf_reader = BufReader::new(File::open(path)?);
        let cfb = Cfb::new(&mut buf_reader)?;
        let mut reader = cfb
            .read("Workbook")
            .ok_none_else(|| cfb.read("Book"))?
            .map(Biff8Reader::new)
            .ok_or_else(|| SpreadsheetError::MissingPart("Workbook".to_owned()))?;

        let mut is_1904 = false;
        let mut shared_strings = Vec::new();
        let mut custom_formats: Vec<(String, String)> = Vec::new();
        let mut format_indexes: Vec<String> = Vec::new();
        let mut sheets: Vec<(String, usize)> = Vec::new();
        match_biff8_record!(reader => {
            EOF => break,
            FILE_PASS => Err(SpreadsheetError::PasswordProtected(name.to_owned()))?,
            DATE1904 => is_1904 = reader.read_u16()? == 1,
            CODE_PAGE => {
                let code_page = reader.read_u16()?;
                reader.encoding = codepage::to_encoding(code_page).ok_or(XlsError::CodePageError(code_page))?;
            }
            FORMAT => {
                let id = reader.read_u16()?;
                let format = reader.read_xl_unicode_string()?;
                custom_formats.push((id.to_string(), format));
            }
            XF => {
                reader.skip(2)?;
                format_indexes.push(reader.read_u16()?.to_string());
            }
            SST => shared_strings = load_shared_strings(&mut reader)?,
            BOUND_SHEET8 => {
                let pointer = reader.read_usize()?;
                let _visibility = reader.read_u8()?;
                let sheet_type = reader.read_u8()?;
                let sheet_name = reader.read_short_xl_unicode_string()?;
                if sheet_type == WORKSHEET {
                    sheets.push((sheet_name, pointer));
                }
            }
        });
        if sheets.is_empty() {
            Err(SpreadsheetError::NoWorksheet(name.to_owned()))?
        }

        // DATE1904 may follow the FORMAT records, so formats are classified once the globals are read
        let custom_formats: HashMap<String, CellType> = custom_formats
            .into_iter()
            .map(|(id, format)| (id, CellType::parse_custom_number_format(&format, is_1904)))
            .collect();
        let number_formats = resolve_number_formats(&format_indexes, |id| custom_formats.get(id).copied(), is_1904);

        Ok(XlsSpreadsheet {
            name,
            reader,
            shared_strings,
            number_formats,
            sheets,
        })
    }

    fn resolve(&self, content: Either<CellType, usize>) -> CellType {
        match content {
            Either::Left(kind) => kind,
            Either::Right(index) => self.number_formats.get(index).copied().unwrap_or(CellType::Number),
        }
    }
}

impl Spreadsheet for XlsSpreadsheet {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn read_first_sheet(&mut self) -> Result<Sheet, ClippingsError> {
        let (sheet_name, pointer) = self
            .sheets
            .first()
            .cloned()
            .ok_or_else(|| SpreadsheetError::NoWorksheet(self.name.to_owned()))?;
        let mut sheet = Sheet::new(&self.name, &sheet_name);
        sheet.shared_strings = self.shared_strings.clone();

        self.reader.goto(pointer);
        self.reader.next()?; // BOF of the worksheet substream
        while let Some(tag) = self.reader.next()? {
            match tag {
                BOF | EOF => break,
                MUL_RK => {
                    let row = self.reader.read_u16()? as usize;
                    let col_lower_bound = self.reader.read_u16()? as usize;
                    let col_upper_bound = self.reader.get_u16_back(2)? as usize;
                    for col in col_lower_bound..=col_upper_bound {
                        let index = self.reader.read_u16()? as usize;
                        let value = self.reader.read_rk_number()?;
                        let kind = self.resolve(Either::Right(index));
                        sheet.push(Cell { row, col, kind, value });
                    }
                }
                BOOL_ERR | NUMBER | RK | LABEL_SST | LABEL | FORMULA => {
                    let row = self.reader.read_u16()? as usize;
                    let col = self.reader.read_u16()? as usize;
                    let (content, value) = match tag {
                        BOOL_ERR => read_bool_or_error_cell(&mut self.reader)?,
                        NUMBER => read_number_cell(&mut self.reader)?,
                        RK => read_rk_cell(&mut self.reader)?,
                        LABEL_SST => read_label_sst_cell(&mut self.reader)?,
                        LABEL => read_label_cell(&mut self.reader)?,
                        _ => read_formula_cell(&mut self.reader)?,
                    };
                    let kind = self.resolve(content);
                    if kind != CellType::Error {
                        sheet.push(Cell { row, col, kind, value });
                    }
                }
                _ => (),
            }
        }
        Ok(sheet)
    }
}

/// Reads the shared string table; its strings may run across CONTINUE records.
fn load_shared_strings(reader: &mut Biff8Reader) -> Result<Vec<String>, ClippingsError> {
    reader.skip(4)?; // Total references
    let count = reader.read_usize()?;
    let mut shared_strings: Vec<String> = Vec::with_capacity(count.min(65_536));
    for _ in 0..count {
        shared_strings.push(reader.read_xl_unicode_rich_extended_string()?);
    }
    Ok(shared_strings)
}

fn read_bool_or_error_cell(reader: &mut Biff8Reader) -> Result<CellContent, ClippingsError> {
    reader.skip(2)?;
    let value = reader.read_u8()?;
    let is_error = reader.read_u8()? != 0;
    if is_error {
        Ok((Either::Left(CellType::Error), value.to_string()))
    } else {
        Ok((Either::Left(CellType::Boolean), value.to_string()))
    }
}

fn read_number_cell(reader: &mut Biff8Reader) -> Result<CellContent, ClippingsError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_f64()?;
    Ok((Either::Right(index), value.to_string()))
}

fn read_rk_cell(reader: &mut Biff8Reader) -> Result<CellContent, ClippingsError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_rk_number()?;
    Ok((Either::Right(index), value))
}

fn read_label_sst_cell(reader: &mut Biff8Reader) -> Result<CellContent, ClippingsError> {
    reader.skip(2)?;
    let value = reader.read_usize()?;
    Ok((Either::Left(CellType::SharedString), value.to_string()))
}

fn read_label_cell(reader: &mut Biff8Reader) -> Result<CellContent, ClippingsError> {
    reader.skip(2)?;
    let value = reader.read_xl_unicode_string()?;
    Ok((Either::Left(CellType::InlineString), value))
}

/// Reads the cached result of a formula. String results live in the STRING
/// record that follows, possibly after shared formula or array records.
fn read_formula_cell(reader: &mut Biff8Reader) -> Result<CellContent, ClippingsError> {
    let index = reader.read_u16()? as usize;
    let formula = reader.read_u64()?;
    if (formula & 0xFFFF_0000_0000_0000) != 0xFFFF_0000_0000_0000 {
        return Ok((Either::Right(index), f64::from_bits(formula).to_string()));
    }
    match formula & 0xFF {
        0 => {
            while let Some(kind) = reader.peek() {
                match kind {
                    STRING => {
                        reader.next()?;
                        let value = reader.read_xl_unicode_string()?;
                        return Ok((Either::Left(CellType::InlineString), value));
                    }
                    SHARED_FORMULA | ARRAY | TABLE => {
                        reader.next()?;
                    }
                    _ => break,
                }
            }
            Ok((Either::Left(CellType::InlineString), String::new()))
        }
        1 => {
            let value = if (formula & 0xFF_0000) > 0 { "1" } else { "0" };
            Ok((Either::Left(CellType::Boolean), value.to_owned()))
        }
        2 => Ok((Either::Left(CellType::Error), ((formula >> 16) & 0xFF).to_string())),
        3 => Ok((Either::Left(CellType::InlineString), String::new())),
        _ => Err(XlsError::FormulaValueError(formula))?,
    }
}
