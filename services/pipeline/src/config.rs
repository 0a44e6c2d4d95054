//! Versioned pipeline configuration
//!
//! Every behavioral difference between pipeline versions (drop vs. coerce,
//! synthetic NFHS-4 rows on or off) is a named policy here, not a code
//! branch duplicated across near-identical variants.

use clap::ValueEnum;
use std::path::PathBuf;

/// Source file names, resolved against `PipelineConfig::data_dir`.
pub const GEO_BOUNDARY_FILE: &str = "districts_707_india.json";
pub const DISTRICT_WORKBOOK: &str = "NFHS4-5 District compiled file.xlsx";
pub const INDIA_FACTSHEET: &str = "NFHS- 5 compiled factsheet for INDIA.xlsx";
pub const STATES_WORKBOOK: &str = "NFHS345.xlsx";
pub const EQUITY_WORKBOOK: &str = "Equity_Analysis.xlsx";
pub const ASPIRATIONAL_REGISTRY: &str = "Aspirational Districts.xlsx";

/// What to do with a declared-numeric cell that fails coercion.
/// The defect is always reported before the policy is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NonNumericPolicy {
    /// Remove the whole row from the table.
    DropRow,
    /// Keep the row, store the value as missing.
    CoerceMissing,
}

/// What to do with a negative value in a declared-non-negative column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NegativePolicy {
    /// Remove the whole row from the table.
    DropRow,
    /// Keep the row with the absolute value.
    AbsoluteValue,
}

/// Equity workbook remediation. Some pipeline versions only report
/// defects in the equity tables without touching the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EquityRemediation {
    /// Report defects, keep rows (failed coercions become missing).
    Report,
    /// Report, then drop offending rows.
    Drop,
    /// Report, then take absolute values of negatives.
    Absolute,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding the six source files.
    pub data_dir: PathBuf,
    pub non_numeric: NonNumericPolicy,
    pub negatives: NegativePolicy,
    pub equity_remediation: EquityRemediation,
    /// Derive a Total-only NFHS-4 slice from the national factsheet's
    /// combined column. Disabled by default per the data owner's later
    /// instruction; earlier pipeline versions set this to true.
    pub synthesize_nfhs4: bool,
    /// Similarity cutoffs per entity class. State names diverge more
    /// across sources than indicator names, so their cutoff is looser.
    pub state_cutoff: f64,
    pub district_cutoff: f64,
    pub indicator_cutoff: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            data_dir: PathBuf::from("./datasets"),
            non_numeric: NonNumericPolicy::DropRow,
            negatives: NegativePolicy::DropRow,
            equity_remediation: EquityRemediation::Report,
            synthesize_nfhs4: false,
            state_cutoff: 0.8,
            district_cutoff: 0.8,
            indicator_cutoff: 0.85,
        }
    }
}

impl PipelineConfig {
    pub fn source_path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }
}
