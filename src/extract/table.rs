// SPDX-License-Identifier: MIT

//! Markdown table extraction
//!
//! Scans the report for maximal substrings matching the pipe-delimited
//! table grammar (header row, separator row, one or more data rows) and
//! parses the last one in document order: earlier tables may be
//! illustrative, the final table is the authoritative output.

use super::clean::clean_cell;
use crate::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Header line, separator line of dashes/colons, one or more data lines
static TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\|[^\n]+\|\n\|[-:\s|]+\|\n(?:\|[^\n]+\|\n?)+").expect("valid regex")
});

/// A parsed table: header cells plus data rows, all cleaned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Find the last table-grammar match in document order
pub fn find_last_table(markdown: &str) -> Option<&str> {
    TABLE_RE.find_iter(markdown).last().map(|m| m.as_str())
}

/// Parse a matched table. Short rows are padded with empty cells to the
/// header width, long rows truncated; row and column order is preserved.
/// Cell-level problems accumulate as diagnostics and never abort.
pub fn parse_table(table_str: &str) -> Result<(ExtractedTable, Vec<String>), ExtractError> {
    let lines: Vec<&str> = table_str
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    if lines.len() < 3 {
        return Err(ExtractError::MalformedTable(format!(
            "expected header, separator and data rows, got {} lines",
            lines.len()
        )));
    }

    let mut diagnostics = Vec::new();

    let headers: Vec<String> = split_row(lines[0])
        .into_iter()
        .map(|cell| clean_cell(cell, &mut diagnostics))
        .collect();

    if headers.is_empty() {
        return Err(ExtractError::MalformedTable("empty header row".to_string()));
    }

    // lines[1] is the separator row
    let mut rows = Vec::new();
    for line in &lines[2..] {
        let mut cells: Vec<String> = split_row(line)
            .into_iter()
            .map(|cell| clean_cell(cell, &mut diagnostics))
            .collect();

        if cells.is_empty() {
            continue;
        }

        if cells.len() > headers.len() {
            diagnostics.push(format!(
                "row truncated from {} to {} columns",
                cells.len(),
                headers.len()
            ));
        }
        cells.resize(headers.len(), String::new());
        rows.push(cells);
    }

    Ok((ExtractedTable { headers, rows }, diagnostics))
}

/// Split a table line on `|`, trimming each cell and dropping only the
/// leading/trailing empties produced by the outer pipes. Interior empty
/// cells are kept.
fn split_row(line: &str) -> Vec<&str> {
    let mut cells: Vec<&str> = line.split('|').map(|c| c.trim()).collect();

    if cells.first().is_some_and(|c| c.is_empty()) {
        cells.remove(0);
    }
    if cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }

    cells
}
