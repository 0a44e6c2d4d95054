//! Data quality reporting
//!
//! Stateless checks plus an ordered, append-only report. Loaders record
//! every detected anomaly BEFORE applying any remediation, so the report
//! is a faithful pre-image of the defects in the source files.

use calamine::Data;
use chrono::Utc;

// ============================================================================
// Cell classification
// ============================================================================

/// Outcome of checking one declared-numeric cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellCheck {
    /// Empty cell or blank string.
    Missing,
    /// Non-null content that does not parse as a number.
    NonNumeric(String),
    /// Parsed, but negative in a declared-non-negative column.
    Negative(f64),
    /// Parsed, non-negative.
    Value(f64),
}

/// Classify a cell from a declared-numeric, declared-non-negative column.
/// The three defect outcomes are disjoint: a cell is missing, or
/// non-numeric, or negative, never more than one.
pub fn check_numeric_cell(cell: &Data) -> CellCheck {
    let parsed = match cell {
        Data::Empty => return CellCheck::Missing,
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return CellCheck::Missing;
            }
            trimmed.parse::<f64>().ok()
        }
        _ => None,
    };
    match parsed {
        Some(v) if v < 0.0 => CellCheck::Negative(v),
        Some(v) => CellCheck::Value(v),
        None => CellCheck::NonNumeric(cell.to_string()),
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefectKind {
    NonNumeric,
    Missing,
    Negative,
    Duplicate,
    Unmatched,
}

impl DefectKind {
    fn heading(&self) -> &'static str {
        match self {
            DefectKind::NonNumeric => "non-numerics detected",
            DefectKind::Missing => "missing values detected",
            DefectKind::Negative => "negatives detected",
            DefectKind::Duplicate => "duplicate keys detected",
            DefectKind::Unmatched => "unmatched names detected",
        }
    }
}

#[derive(Debug)]
struct ReportSection {
    table: String,
    kind: DefectKind,
    lines: Vec<String>,
}

/// Ordered collection of defect lines, one section per (table, kind),
/// sections in first-record order. `record` is the only append path, so
/// the per-section line count always equals the number of flagged rows.
#[derive(Debug, Default)]
pub struct QualityReport {
    sections: Vec<ReportSection>,
}

impl QualityReport {
    pub fn new() -> Self {
        QualityReport::default()
    }

    /// Append one offending-row line under (table, kind).
    pub fn record(&mut self, table: &str, kind: DefectKind, detail: String) {
        match self
            .sections
            .iter_mut()
            .find(|s| s.table == table && s.kind == kind)
        {
            Some(section) => section.lines.push(detail),
            None => self.sections.push(ReportSection {
                table: table.to_string(),
                kind,
                lines: vec![detail],
            }),
        }
    }

    /// Number of rows flagged under (table, kind).
    pub fn count(&self, table: &str, kind: DefectKind) -> usize {
        self.sections
            .iter()
            .filter(|s| s.table == table && s.kind == kind)
            .map(|s| s.lines.len())
            .sum()
    }

    pub fn total_defects(&self) -> usize {
        self.sections.iter().map(|s| s.lines.len()).sum()
    }

    /// Render the full report as the text artifact written next to the
    /// model. Section order is detection order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("=== NFHS Data Quality Report ===\n");
        out.push_str(&format!("Generated: {}\n", Utc::now().to_rfc3339()));
        out.push_str(&format!("Total defects: {}\n", self.total_defects()));
        for section in &self.sections {
            out.push('\n');
            out.push_str(&format!(
                "[{}] {} ({} rows)\n",
                section.table,
                section.kind.heading(),
                section.lines.len()
            ));
            for line in &section.lines {
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

// ============================================================================
// TESTS
// ============================================================================
