// SPDX-License-Identifier: MIT

//! Result extraction - turns the final markdown report into artifacts
//!
//! Three files per task: the raw report (audit trail, never parsed), a
//! spreadsheet built from the last markdown table, and a narrative
//! summary. Table absence is fatal; summary extraction always degrades to
//! some excerpt.

pub mod clean;
pub mod summary;
pub mod table;

use crate::error::ExtractError;
use rust_xlsxwriter::Workbook;
use std::fs;
use std::path::{Path, PathBuf};

/// Paths of the artifacts written for one task
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub spreadsheet: PathBuf,
    pub summary: PathBuf,
    pub full_output: PathBuf,
}

/// Extracts artifacts from markdown reports into an output directory
pub struct ResultExtractor {
    output_dir: PathBuf,
}

impl ResultExtractor {
    pub fn new(output_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    /// Extract the table and summary from a report and persist all three
    /// artifacts. The raw report is always written first so extraction
    /// failures can be debugged from disk.
    pub fn extract_and_save(
        &self,
        report_markdown: &str,
        task_id: i64,
        filename: &str,
    ) -> Result<Artifacts, ExtractError> {
        let full_output = self.save_full_output(report_markdown, task_id)?;
        let spreadsheet = self.extract_table_to_xlsx(report_markdown, task_id, filename)?;
        let summary = self.save_summary(report_markdown, task_id)?;

        Ok(Artifacts {
            spreadsheet,
            summary,
            full_output,
        })
    }

    /// Read a previously written summary artifact
    pub fn read_summary(&self, path: impl AsRef<Path>) -> Option<String> {
        fs::read_to_string(path).ok()
    }

    fn save_full_output(&self, markdown: &str, task_id: i64) -> Result<PathBuf, ExtractError> {
        let path = self.output_dir.join(format!("{}_full_output.md", task_id));
        fs::write(&path, markdown)?;
        Ok(path)
    }

    fn extract_table_to_xlsx(
        &self,
        markdown: &str,
        task_id: i64,
        filename: &str,
    ) -> Result<PathBuf, ExtractError> {
        let last_table = table::find_last_table(markdown).ok_or(ExtractError::NoTableFound)?;
        let (parsed, diagnostics) = table::parse_table(last_table)?;

        for diag in &diagnostics {
            log::warn!("Task {} table cell issue: {}", task_id, diag);
        }

        let safe_name = sanitize_filename(filename);
        let path = self
            .output_dir
            .join(format!("{}_{}.xlsx", task_id, safe_name));

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        for (col, header) in parsed.headers.iter().enumerate() {
            worksheet.write_string(0, col as u16, header)?;
        }
        for (row_idx, row) in parsed.rows.iter().enumerate() {
            for (col, cell) in row.iter().enumerate() {
                worksheet.write_string((row_idx + 1) as u32, col as u16, cell)?;
            }
        }

        workbook.save(&path)?;
        Ok(path)
    }

    fn save_summary(&self, markdown: &str, task_id: i64) -> Result<PathBuf, ExtractError> {
        let content = summary::extract_summary(markdown);
        let path = self.output_dir.join(format!("{}_summary.md", task_id));
        fs::write(&path, content)?;
        Ok(path)
    }
}

/// Derive a safe artifact filename from a display name: extension
/// stripped, unsafe characters replaced, truncated to 50 characters. The
/// numeric task id prefix added by the caller keeps names unique.
pub fn sanitize_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);

    stem.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .take(50)
        .collect()
}
