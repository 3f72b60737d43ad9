//! # Rusty Clippings
//!
//! Free-text search over a personal archive of newspaper clippings kept in
//! Excel workbooks. Every workbook of a directory is read, the rows are merged
//! into one table, and each clipping gets a readable date, a volume/page
//! location and an accent-insensitive search key.
//!
//! ## Features
//!
//! - **Both Excel formats**: `.xlsx` (Office Open XML) and legacy `.xls`
//!   (BIFF8), read without external tools
//! - **Header tolerance**: the header is expected on the second row, below a
//!   title row, and the first row is tried when that fails
//! - **Loose schemas**: the volume, page and date columns are guessed from
//!   their names, and workbooks with different columns are merged
//! - **Accent-insensitive search**: `"cafe"` finds `"CAFÉ"`
//! - **Diagnostics**: unreadable workbooks are skipped and reported, never fatal
//!
//! ## Example
//!
//! ```no_run
//! use rusty_clippings::archive::cache::ArchiveCache;
//! use rusty_clippings::archive::options::ArchiveOptions;
//! use rusty_clippings::archive::query::search;
//!
//! let mut cache = ArchiveCache::new("hemeroteca", ArchiveOptions::default());
//! let archive = cache.get()?;
//! for record in search(&archive, "sequia") {
//!     println!("{} {}", record.display_date(), record.display_location());
//! }
//! # Ok::<(), rusty_clippings::error::ClippingsError>(())
//! ```

pub mod archive;
pub mod error;
mod helpers;
pub mod spreadsheet;

#[cfg(test)]
mod testing;

pub use archive::Archive;
pub use archive::ClippingRecord;
pub use error::ClippingsError;
