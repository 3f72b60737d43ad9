//! Office Open XML package helpers
use crate::error::ClippingsError;
use crate::helpers::cfb::Cfb;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::FileReader;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use zip::ZipArchive;

const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Opens an `.xlsx` package after making sure it is not an encrypted container.
pub(super) fn open(path: &Path) -> Result<ZipArchive<FileReader>, ClippingsError> {
    let mut reader = BufReader::new(File::open(path)?);
    if is_password_protected(&mut reader) {
        Err(SpreadsheetError::PasswordProtected(path.to_string_lossy().to_string()))?;
    }
    reader.seek(SeekFrom::Start(0))?;
    Ok(ZipArchive::new(reader)?)
}

/// Maps relationship ids to worksheet part paths.
pub(super) fn load_relationships(zip: &mut ZipArchive<FileReader>, path: &str) -> Result<HashMap<String, String>, ClippingsError> {
    let mut reader = zip
        .xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::MissingPart(path.to_owned()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Resolves a relationship target against the `xl/` folder.
pub(super) fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(absolute) = path.strip_prefix('/') {
        absolute.to_owned()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Encrypted workbooks are OLE containers holding an `EncryptedPackage` stream.
fn is_password_protected(reader: &mut FileReader) -> bool {
    Cfb::new(reader)
        .map(|cfb| cfb.exists("EncryptedPackage"))
        .unwrap_or(false)
}
