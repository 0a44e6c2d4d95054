//! Shared spreadsheet helpers (calamine)
//!
//! Loaders consume plain row tables so unit tests can drive them with
//! in-memory rows instead of files.

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

/// All rows of one worksheet, by sheet index.
pub fn read_sheet_rows(path: &Path, sheet_index: usize) -> Result<Vec<Vec<Data>>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook {}", path.display()))?;
    let sheet_names = workbook.sheet_names().to_vec();
    let sheet_name = sheet_names
        .get(sheet_index)
        .with_context(|| format!("Workbook {} has no sheet {}", path.display(), sheet_index))?
        .clone();
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Failed to read sheet '{}'", sheet_name))?;
    Ok(range.rows().map(|row| row.to_vec()).collect())
}

/// All worksheets of one workbook as (name, rows), in workbook order.
pub fn read_all_sheets(path: &Path) -> Result<Vec<(String, Vec<Vec<Data>>)>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook {}", path.display()))?;
    let sheet_names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(sheet_names.len());
    for name in sheet_names {
        let range = workbook
            .worksheet_range(&name)
            .with_context(|| format!("Failed to read sheet '{}'", name))?;
        sheets.push((name, range.rows().map(|row| row.to_vec()).collect()));
    }
    Ok(sheets)
}

/// Trimmed string content of a cell, None when empty/blank.
pub fn cell_text(row: &[Data], col: usize) -> Option<String> {
    match row.get(col) {
        Some(Data::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(Data::Empty) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

/// Find the first column whose trimmed header matches any candidate,
/// case-insensitively. Exact matches win over containing matches so
/// that e.g. "Indicator" never lands on an "Indicator Type" column.
pub fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    for candidate in candidates {
        let needle = candidate.to_lowercase();
        if let Some(idx) = normalized.iter().position(|h| *h == needle) {
            return Some(idx);
        }
    }
    for candidate in candidates {
        let needle = candidate.to_lowercase();
        if let Some(idx) = normalized.iter().position(|h| h.contains(&needle)) {
            return Some(idx);
        }
    }
    None
}

/// Header row as trimmed strings (empty cells become empty strings).
pub fn header_strings(row: &[Data]) -> Vec<String> {
    row.iter()
        .map(|cell| match cell {
            Data::String(s) => s.trim().to_string(),
            Data::Empty => String::new(),
            other => other.to_string(),
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_text_trims_and_blanks() {
        let row = vec![
            Data::String("  Kerala ".into()),
            Data::String("   ".into()),
            Data::Empty,
            Data::Int(3),
        ];
        assert_eq!(cell_text(&row, 0), Some("Kerala".into()));
        assert_eq!(cell_text(&row, 1), None);
        assert_eq!(cell_text(&row, 2), None);
        assert_eq!(cell_text(&row, 3), Some("3".into()));
        assert_eq!(cell_text(&row, 9), None);
    }

    #[test]
    fn test_find_column_case_insensitive_contains() {
        let headers = vec![
            "Sl.No".to_string(),
            "Indicator".to_string(),
            "Survey round".to_string(),
        ];
        assert_eq!(find_column(&headers, &["indicator"]), Some(1));
        assert_eq!(find_column(&headers, &["round"]), Some(2));
        assert_eq!(find_column(&headers, &["gender"]), None);
    }
}
