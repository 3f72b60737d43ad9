//! Derived display fields and the normalized search key of a record.

use crate::archive::date::format_date;
use crate::archive::normalize::normalize;
use crate::archive::roles::RoleMapping;
use crate::archive::MISSING;
use crate::spreadsheet::CellValue;

/// Location shown when the volume or the page column is unknown.
pub const FALLBACK_LOCATION: &str = "See original file";

/// Fields derived from one row of original values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexEntry {
    pub display_date: String,
    pub display_location: String,
    pub search_key: String,
}

/// Derives the display fields and the search key of a row.
///
/// `values` is aligned with `columns`. The search key covers the original
/// columns only: the derived date and location never feed back into it.
pub fn build_index(columns: &[String], values: &[CellValue], roles: &RoleMapping) -> IndexEntry {
    let lookup = |role: &Option<String>| {
        role.as_ref().map(|name| {
            columns
                .iter()
                .position(|column| column == name)
                .and_then(|index| values.get(index))
                .unwrap_or(&MISSING)
        })
    };

    let display_date = lookup(&roles.date).map(format_date).unwrap_or_default();
    let display_location = match (lookup(&roles.volume), lookup(&roles.page)) {
        (Some(volume), Some(page)) => format!("Vol. {volume} | Page {page}"),
        _ => FALLBACK_LOCATION.to_owned(),
    };
    let joined = values.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ");

    IndexEntry {
        display_date,
        display_location,
        search_key: normalize(&joined),
    }
}
