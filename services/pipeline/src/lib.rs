//! NFHS Data Pipeline - Reconciles raw survey workbooks into one model
//!
//! Responsibilities:
//! - Parse the district boundary GeoJSON and enforce ring winding
//! - Load the district / state / national compiled workbooks
//! - Fuzzy-match names across independently authored sources
//! - Detect and report data-quality defects before remediation
//! - Materialize a read-only NormalizedDataModel for the dashboard
//!
//! CRITICAL: This pipeline must be DETERMINISTIC
//! Same source files + same configuration = same model + same report

pub mod aspirational;
pub mod config;
pub mod district;
pub mod equity;
pub mod geo;
pub mod matching;
pub mod model;
pub mod report;
pub mod state;
pub mod taxonomy;
pub mod workbook;

pub use config::{EquityRemediation, NegativePolicy, NonNumericPolicy, PipelineConfig};
pub use model::{build_data_model, NormalizedDataModel};
pub use report::QualityReport;
