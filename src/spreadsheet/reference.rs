//! A1-style cell references.

use regex::Regex;
use std::sync::LazyLock;

static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$?([A-Za-z]{1,3})\$?([0-9]+)$").expect("Cell reference pattern"));

/// Converts `"AB12"` into the 0-based `(row, col)` pair `(11, 27)`.
pub fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let captures = REFERENCE.captures(reference)?;
    let col = captures[1]
        .bytes()
        .fold(0usize, |col, letter| col * 26 + (letter.to_ascii_uppercase() - b'A' + 1) as usize);
    let row = captures[2].parse::<usize>().ok()?;
    (row > 0).then(|| (row - 1, col - 1))
}

/// Converts a 0-based `(row, col)` pair into an A1-style reference.
#[cfg(test)]
pub fn index_to_reference(row: usize, col: usize) -> String {
    let mut letters = Vec::new();
    let mut col = col + 1;
    while col > 0 {
        col -= 1;
        letters.push(b'A' + (col % 26) as u8);
        col /= 26;
    }
    letters.reverse();
    format!("{}{}", String::from_utf8_lossy(&letters), row + 1)
}
