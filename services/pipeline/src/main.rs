//! Pipeline CLI - Builds the normalized model and writes the quality report
//!
//! Responsibilities:
//! - Parse policy flags into a PipelineConfig
//! - Run the full load in dependency order
//! - Print a summary of what was materialized
//! - Write the data-quality report as a text artifact

use anyhow::{Context, Result};
use clap::Parser;
use pipeline::config::{EquityRemediation, NegativePolicy, NonNumericPolicy, PipelineConfig};
use pipeline::model::build_data_model;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pipeline", about = "Builds the normalized NFHS data model")]
struct Args {
    /// Directory holding the source workbooks and boundary file
    #[arg(long, default_value = "./datasets")]
    data_dir: PathBuf,

    /// Where to write the data-quality report
    #[arg(long, default_value = "./quality_report.txt")]
    report_path: PathBuf,

    /// Non-numeric cell policy
    #[arg(long, value_enum, default_value = "drop-row")]
    non_numeric: NonNumericPolicy,

    /// Negative value policy
    #[arg(long, value_enum, default_value = "drop-row")]
    negatives: NegativePolicy,

    /// Equity workbook remediation
    #[arg(long, value_enum, default_value = "report")]
    equity_remediation: EquityRemediation,

    /// Derive the Total-only NFHS-4 slice from the national factsheet
    #[arg(long)]
    synthesize_nfhs4: bool,

    /// Dry run - build the model but skip writing the report
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    println!("=== NFHS Data Pipeline ===");
    println!("Data dir: {}", args.data_dir.display());
    println!(
        "Policies: non-numeric={:?}, negatives={:?}, equity={:?}",
        args.non_numeric, args.negatives, args.equity_remediation
    );
    println!("Mode: {}", if args.dry_run { "dry-run" } else { "live" });

    let cfg = PipelineConfig {
        data_dir: args.data_dir,
        non_numeric: args.non_numeric,
        negatives: args.negatives,
        equity_remediation: args.equity_remediation,
        synthesize_nfhs4: args.synthesize_nfhs4,
        ..PipelineConfig::default()
    };

    println!("\nBuilding model...");
    let model = build_data_model(&cfg)?;

    println!("\n=== Model Summary ===");
    println!("Boundary features: {}", model.geo.collection.features.len());
    println!("Boundary districts: {}", model.geo.districts.len());
    println!("District records: {}", model.district.records.len());
    println!("District indicators: {}", model.district.indicators.len());
    println!("State records: {}", model.state.records.len());
    println!("Indicator types: {}", model.state.taxonomy.len());
    println!("Taxonomy correspondences: {}", model.taxonomy.len());
    println!("Equity records: {}", model.equity.records.len());
    println!("Aspirational entries: {}", model.aspirational.entries.len());
    println!("Inverse-scale indicators: {}", model.inverse_scale.len());
    println!("Quality defects: {}", model.quality.total_defects());

    if args.dry_run {
        println!("\nDry run - report not written");
        return Ok(());
    }

    fs::write(&args.report_path, model.quality.render()).with_context(|| {
        format!("Failed to write quality report to {}", args.report_path.display())
    })?;
    println!("\nQuality report written: {}", args.report_path.display());

    Ok(())
}
