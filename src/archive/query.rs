//! Free-text filtering over the normalized search keys.

use crate::archive::normalize::normalize;
use crate::archive::Archive;
use crate::archive::ClippingRecord;

/// Records matching `query`, in archive order.
///
/// A blank query returns the first `preview_size` records. Any other query is
/// normalized and matched by substring containment against every search key.
pub fn search<'a>(archive: &'a Archive, query: &str) -> Vec<&'a ClippingRecord> {
    if query.trim().is_empty() {
        return archive.records().iter().take(archive.options().preview_size).collect();
    }
    let needle = normalize(query);
    archive
        .records()
        .iter()
        .filter(|record| record.search_key().contains(&needle))
        .collect()
}

/// What a query produced, as the presentation layer reports it.
#[derive(Debug)]
pub enum SearchOutcome<'a> {
    /// The archive holds no records at all
    NoArchive,
    /// Preview of the archive for a blank query
    Browse(Vec<&'a ClippingRecord>),
    Found(Vec<&'a ClippingRecord>),
    NoResults,
}

impl<'a> SearchOutcome<'a> {
    pub fn records(&self) -> &[&'a ClippingRecord] {
        match self {
            SearchOutcome::Browse(records) | SearchOutcome::Found(records) => records,
            SearchOutcome::NoArchive | SearchOutcome::NoResults => &[],
        }
    }
}

/// Runs `query` and classifies its result.
pub fn run_query<'a>(archive: &'a Archive, query: &str) -> SearchOutcome<'a> {
    if archive.is_empty() {
        return SearchOutcome::NoArchive;
    }
    let records = search(archive, query);
    if query.trim().is_empty() {
        SearchOutcome::Browse(records)
    } else if records.is_empty() {
        SearchOutcome::NoResults
    } else {
        SearchOutcome::Found(records)
    }
}
