//! Workbook builders for tests. Fixtures are generated on the fly instead of
//! being checked in as binary files.

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<workbookPr/>
<sheets><sheet name="Hoja1" sheetId="1" r:id="rId1"/><sheet name="Hoja2" sheetId="2" r:id="rId2"/></sheets>
</workbook>"#;

const WORKBOOK_RELATIONSHIPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

/// Style 0 is General, style 1 is the built-in short date, style 2 a custom date.
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<numFmts count="1"><numFmt numFmtId="164" formatCode="dd/mm/yyyy"/></numFmts>
<cellStyleXfs count="1"><xf numFmtId="0"/></cellStyleXfs>
<cellXfs count="3"><xf numFmtId="0" xfId="0"/><xf numFmtId="14" xfId="0"/><xf numFmtId="164" xfId="0"/></cellXfs>
</styleSheet>"#;

const SECOND_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Otra hoja</t></is></c></row></sheetData></worksheet>"#;

/// Builds a two-sheet `.xlsx` package; only the first sheet carries the rows.
///
/// Row cells use a small notation: plain text becomes an inline string,
/// `n:12` a number, `d:36000` a date-formatted serial and `""` an empty cell.
#[derive(Default)]
pub(crate) struct WorkbookFixture {
    rows: Vec<String>,
    shared_strings: Option<Vec<String>>,
}

impl WorkbookFixture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn row(mut self, cells: &[&str]) -> Self {
        let row = self.rows.len();
        let xml: String = cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(col, cell)| {
                let reference = crate::spreadsheet::index_to_reference(row, col);
                if let Some(number) = cell.strip_prefix("n:") {
                    format!(r#"<c r="{reference}"><v>{number}</v></c>"#)
                } else if let Some(serial) = cell.strip_prefix("d:") {
                    format!(r#"<c r="{reference}" s="1"><v>{serial}</v></c>"#)
                } else {
                    format!(r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#, escape(cell))
                }
            })
            .collect();
        self.rows.push(xml);
        self
    }

    /// Adds a row of hand-written `<c>` elements.
    pub(crate) fn raw_row(mut self, xml: &str) -> Self {
        self.rows.push(xml.to_owned());
        self
    }

    pub(crate) fn shared_strings(mut self, strings: &[&str]) -> Self {
        self.shared_strings = Some(strings.iter().map(|string| string.to_string()).collect());
        self
    }

    pub(crate) fn write(&self, directory: &Path, name: &str) -> PathBuf {
        let path = directory.join(name);
        let mut zip = ZipWriter::new(std::fs::File::create(&path).unwrap());
        let options = SimpleFileOptions::default();
        let mut part = |name: &str, content: &str| {
            zip.start_file(name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        };

        part("[Content_Types].xml", CONTENT_TYPES);
        part("xl/workbook.xml", WORKBOOK);
        part("xl/_rels/workbook.xml.rels", WORKBOOK_RELATIONSHIPS);
        part("xl/styles.xml", STYLES);
        let rows: String = self
            .rows
            .iter()
            .enumerate()
            .map(|(index, cells)| format!(r#"<row r="{}">{cells}</row>"#, index + 1))
            .collect();
        part(
            "xl/worksheets/sheet1.xml",
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{rows}</sheetData></worksheet>"#
            ),
        );
        part("xl/worksheets/sheet2.xml", SECOND_SHEET);
        if let Some(strings) = &self.shared_strings {
            let items: String = strings.iter().map(|string| format!("<si><t>{}</t></si>", escape(string))).collect();
            part(
                "xl/sharedStrings.xml",
                &format!(r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">{items}</sst>"#),
            );
        }
        zip.finish().unwrap();
        path
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Builds a single-sheet BIFF8 `.xls` workbook inside a minimal compound file.
#[derive(Default)]
pub(crate) struct XlsFixture {
    cells: Vec<Vec<u8>>,
    shared_strings: Vec<String>,
    is_password_protected: bool,
}

const SECTOR_SIZE: usize = 512;
const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
const FREE_SECTOR: u32 = 0xFFFF_FFFF;
const FAT_SECTOR: u32 = 0xFFFF_FFFD;

impl XlsFixture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// LABEL record with an uncompressed UTF-16 string.
    pub(crate) fn label(mut self, row: u16, col: u16, text: &str) -> Self {
        let mut payload = cell_header(row, col, 0);
        payload.extend(xl_unicode_string(text));
        self.cells.push(record(0x0204, &payload));
        self
    }

    /// LABELSST record pointing at a new compressed shared string.
    pub(crate) fn shared(mut self, row: u16, col: u16, text: &str) -> Self {
        let mut payload = cell_header(row, col, 0);
        payload.extend((self.shared_strings.len() as u32).to_le_bytes());
        self.shared_strings.push(text.to_owned());
        self.cells.push(record(0x00FD, &payload));
        self
    }

    pub(crate) fn number(mut self, row: u16, col: u16, value: f64) -> Self {
        let mut payload = cell_header(row, col, 0);
        payload.extend(value.to_le_bytes());
        self.cells.push(record(0x0203, &payload));
        self
    }

    /// NUMBER record styled with the built-in short date format.
    pub(crate) fn date(mut self, row: u16, col: u16, serial: f64) -> Self {
        let mut payload = cell_header(row, col, 1);
        payload.extend(serial.to_le_bytes());
        self.cells.push(record(0x0203, &payload));
        self
    }

    pub(crate) fn password_protected(mut self) -> Self {
        self.is_password_protected = true;
        self
    }

    pub(crate) fn write(&self, directory: &Path, name: &str) -> PathBuf {
        let path = directory.join(name);
        std::fs::write(&path, compound_file(&self.workbook_stream())).unwrap();
        path
    }

    fn workbook_stream(&self) -> Vec<u8> {
        let bof = |kind: u16| {
            let mut payload = vec![0u8; 16];
            payload[0..2].copy_from_slice(&0x0600u16.to_le_bytes());
            payload[2..4].copy_from_slice(&kind.to_le_bytes());
            record(0x0809, &payload)
        };
        let xf = |format: u16| {
            let mut payload = vec![0u8; 20];
            payload[2..4].copy_from_slice(&format.to_le_bytes());
            record(0x00E0, &payload)
        };

        let mut globals = bof(0x0005);
        if self.is_password_protected {
            globals.extend(record(0x002F, &[0, 0, 0, 0]));
        }
        globals.extend(record(0x0042, &1252u16.to_le_bytes()));
        globals.extend(xf(0));
        globals.extend(xf(14));
        if !self.shared_strings.is_empty() {
            let mut payload = Vec::new();
            payload.extend((self.shared_strings.len() as u32).to_le_bytes());
            payload.extend((self.shared_strings.len() as u32).to_le_bytes());
            for string in &self.shared_strings {
                let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(string);
                payload.extend((string.chars().count() as u16).to_le_bytes());
                payload.push(0x00);
                payload.extend(bytes.iter());
            }
            globals.extend(record(0x00FC, &payload));
        }

        let mut sheet_name = vec![5u8, 0x00];
        sheet_name.extend(b"Hoja1");
        let bound_sheet_size = 4 + 4 + 2 + sheet_name.len();
        let eof_size = 4;
        let sheet_position = (globals.len() + bound_sheet_size + eof_size) as u32;
        let mut payload = sheet_position.to_le_bytes().to_vec();
        payload.extend([0u8, 0u8]);
        payload.extend(sheet_name);
        globals.extend(record(0x0085, &payload));
        globals.extend(record(0x000A, &[]));

        let mut stream = globals;
        stream.extend(bof(0x0010));
        self.cells.iter().for_each(|cell| stream.extend(cell));
        stream.extend(record(0x000A, &[]));
        // Streams under 4096 bytes would live in the mini stream
        stream.resize(stream.len().max(4096).next_multiple_of(SECTOR_SIZE), 0);
        stream
    }
}

fn record(kind: u16, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(payload.len() + 4);
    bytes.extend(kind.to_le_bytes());
    bytes.extend((payload.len() as u16).to_le_bytes());
    bytes.extend(payload);
    bytes
}

fn cell_header(row: u16, col: u16, style: u16) -> Vec<u8> {
    [row, col, style].iter().flat_map(|value| value.to_le_bytes()).collect()
}

fn xl_unicode_string(text: &str) -> Vec<u8> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let mut bytes = (units.len() as u16).to_le_bytes().to_vec();
    bytes.push(0x01);
    bytes.extend(units.iter().flat_map(|unit| unit.to_le_bytes()));
    bytes
}

/// Lays out a version 3 compound file: FAT in sector 0, directory in sector 1,
/// the `Workbook` stream from sector 2 on.
fn compound_file(stream: &[u8]) -> Vec<u8> {
    let stream_sectors = stream.len().div_ceil(SECTOR_SIZE);

    let mut header = vec![0u8; SECTOR_SIZE];
    header[0..8].copy_from_slice(&0xE11A_B1A1_E011_CFD0u64.to_le_bytes());
    header[24..26].copy_from_slice(&0x003Eu16.to_le_bytes());
    header[26..28].copy_from_slice(&3u16.to_le_bytes());
    header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
    header[30..32].copy_from_slice(&9u16.to_le_bytes());
    header[32..34].copy_from_slice(&6u16.to_le_bytes());
    header[44..48].copy_from_slice(&1u32.to_le_bytes());
    header[48..52].copy_from_slice(&1u32.to_le_bytes());
    header[56..60].copy_from_slice(&4096u32.to_le_bytes());
    header[60..64].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    header[68..72].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    for slot in header[76..SECTOR_SIZE].chunks_exact_mut(4) {
        slot.copy_from_slice(&FREE_SECTOR.to_le_bytes());
    }
    header[76..80].copy_from_slice(&0u32.to_le_bytes());

    let mut fat = vec![FAT_SECTOR, END_OF_CHAIN];
    fat.extend((3..stream_sectors as u32 + 2).chain([END_OF_CHAIN]));
    fat.resize(SECTOR_SIZE / 4, FREE_SECTOR);
    let fat: Vec<u8> = fat.iter().flat_map(|entry| entry.to_le_bytes()).collect();

    let mut directory = vec![0u8; SECTOR_SIZE];
    let mut entry = |index: usize, name: &str, kind: u8, start: u32, size: u64| {
        let entry = &mut directory[index * 128..(index + 1) * 128];
        let name: Vec<u8> = name.encode_utf16().chain([0]).flat_map(|unit| unit.to_le_bytes()).collect();
        entry[..name.len()].copy_from_slice(&name);
        entry[64..66].copy_from_slice(&(name.len() as u16).to_le_bytes());
        entry[66] = kind;
        entry[116..120].copy_from_slice(&start.to_le_bytes());
        entry[120..128].copy_from_slice(&size.to_le_bytes());
    };
    entry(0, "Root Entry", 5, END_OF_CHAIN, 0);
    entry(1, "Workbook", 2, 2, stream.len() as u64);

    let mut bytes = header;
    bytes.extend(fat);
    bytes.extend(directory);
    bytes.extend(stream);
    bytes
}
