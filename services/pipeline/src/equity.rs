//! Equity workbook loader
//!
//! The equity workbook mixes two sheet layouts. "Single-ingestion"
//! sheets carry one indicator with fixed columns (two title rows, then
//! an unnamed State column, an unnamed Total column, and one column per
//! disaggregation category). "Multi-ingestion" sheets pack several
//! indicators side by side: one row names each indicator at the first
//! column of its block, the next row carries the category headers, and a
//! block runs until the next named block or the Year column.
//!
//! A `Template` configuration sheet declares, per indicator, the source
//! sheet, ingestion mode, indicator type, default-selected flag, and
//! permitted disaggregation groups.

use crate::config::{EquityRemediation, PipelineConfig};
use crate::report::{check_numeric_cell, CellCheck, DefectKind, QualityReport};
use crate::workbook::{cell_text, find_column, header_strings};
use anyhow::{Context, Result};
use calamine::Data;
use regex::Regex;
use std::collections::BTreeMap;

const TABLE: &str = "equity workbook";

pub const EQUITY_CONFIG_SHEET: &str = "Template";

/// The canonical disaggregation value columns, in display order.
pub const EQUITY_CATEGORIES: &[&str] = &[
    "Total",
    "Rural",
    "Urban",
    "Poorest",
    "Poor",
    "Middle",
    "Rich",
    "Richest",
    "No education",
    "Primary education",
    "Secondary education",
    "Higher education",
    "SC",
    "ST",
    "OBC",
    "Others",
    "Hindu",
    "Muslim",
    "Other",
];

/// Indicator-type display colours cycle over this palette in
/// configuration order.
const TYPE_PALETTE: &[&str] = &[
    "#636efa", "#ef553b", "#00cc96", "#ab63fa", "#ffa15a", "#19d3f3",
];

// ============================================================================
// Disaggregation groups
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Disaggregation {
    Residence,
    Wealth,
    Education,
    Caste,
    Religion,
}

impl Disaggregation {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "residence" => Some(Disaggregation::Residence),
            "wealth" => Some(Disaggregation::Wealth),
            "education" => Some(Disaggregation::Education),
            "caste" => Some(Disaggregation::Caste),
            "religion" => Some(Disaggregation::Religion),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Disaggregation::Residence => "Residence",
            Disaggregation::Wealth => "Wealth",
            Disaggregation::Education => "Education",
            Disaggregation::Caste => "Caste",
            Disaggregation::Religion => "Religion",
        }
    }

    /// Canonical value columns belonging to this group.
    pub fn categories(&self) -> &'static [&'static str] {
        match self {
            Disaggregation::Residence => &["Rural", "Urban"],
            Disaggregation::Wealth => &["Poorest", "Poor", "Middle", "Rich", "Richest"],
            Disaggregation::Education => &[
                "No education",
                "Primary education",
                "Secondary education",
                "Higher education",
            ],
            Disaggregation::Caste => &["SC", "ST", "OBC", "Others"],
            Disaggregation::Religion => &["Hindu", "Muslim", "Other"],
        }
    }
}

// ============================================================================
// Configuration sheet
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionMode {
    Single,
    Multi,
}

#[derive(Debug, Clone)]
pub struct EquityIndicatorConfig {
    pub indicator: String,
    pub sheet: String,
    pub mode: IngestionMode,
    pub indicator_type: String,
    pub default_selected: bool,
    pub disaggregations: Vec<Disaggregation>,
    pub color: &'static str,
}

pub fn load_equity_config(
    rows: &[Vec<Data>],
    report: &mut QualityReport,
) -> Result<Vec<EquityIndicatorConfig>> {
    if rows.is_empty() {
        anyhow::bail!("AMBIGUITY: equity configuration sheet is empty");
    }
    let headers = header_strings(&rows[0]);
    let col = |candidates: &[&str]| -> Result<usize> {
        find_column(&headers, candidates).ok_or_else(|| {
            anyhow::anyhow!(
                "AMBIGUITY: equity configuration is missing a '{}' column",
                candidates[0]
            )
        })
    };
    let indicator_col = col(&["Indicator"])?;
    let sheet_col = col(&["Sheet"])?;
    let mode_col = col(&["Ingestion"])?;
    let type_col = col(&["Indicator Type", "Type"])?;
    let default_col = col(&["Default"])?;
    let groups_col = col(&["Disaggregation"])?;

    let mut configs: Vec<EquityIndicatorConfig> = Vec::new();
    let mut type_order: Vec<String> = Vec::new();
    for row in rows.iter().skip(1) {
        let Some(indicator) = cell_text(row, indicator_col) else {
            continue;
        };
        let sheet = cell_text(row, sheet_col)
            .with_context(|| format!("AMBIGUITY: equity indicator '{}' has no sheet", indicator))?;
        let mode_text = cell_text(row, mode_col).unwrap_or_default();
        let mode = match mode_text.to_lowercase().as_str() {
            "single" => IngestionMode::Single,
            "multi" => IngestionMode::Multi,
            other => anyhow::bail!(
                "AMBIGUITY: equity indicator '{}' has unknown ingestion mode '{}'",
                indicator,
                other
            ),
        };
        let indicator_type = cell_text(row, type_col).unwrap_or_default();
        let default_selected = cell_text(row, default_col)
            .map(|t| t.eq_ignore_ascii_case("yes"))
            .unwrap_or(false);

        let mut disaggregations = Vec::new();
        for label in cell_text(row, groups_col)
            .unwrap_or_default()
            .split([',', ';'])
            .filter(|l| !l.trim().is_empty())
        {
            match Disaggregation::parse(label) {
                Some(group) => disaggregations.push(group),
                None => report.record(
                    TABLE,
                    DefectKind::Unmatched,
                    format!(
                        "indicator '{}': unknown disaggregation group '{}'",
                        indicator,
                        label.trim()
                    ),
                ),
            }
        }

        if !type_order.iter().any(|t| t == &indicator_type) {
            type_order.push(indicator_type.clone());
        }
        let type_idx = type_order.iter().position(|t| t == &indicator_type).unwrap_or(0);
        configs.push(EquityIndicatorConfig {
            indicator,
            sheet,
            mode,
            indicator_type,
            default_selected,
            disaggregations,
            color: TYPE_PALETTE[type_idx % TYPE_PALETTE.len()],
        });
    }
    Ok(configs)
}

// ============================================================================
// Name normalization tables
// ============================================================================

/// Sheet-derived indicator names that need renaming (source typos).
const INDICATOR_RENAMES: &[(&str, &str)] = &[
    ("Protected against neonatTetnus", "Neonatal Protection"),
];

/// Raw year labels -> canonical round labels.
const YEAR_RENAMES: &[(&str, &str)] = &[
    ("2015-16", "NFHS-4 (2015-16)"),
    ("2019-21", "NFHS-5 (2019-21)"),
    ("2019-2021", "NFHS-5 (2019-21)"),
];

struct StateNormalizer {
    rules: Vec<(Regex, &'static str)>,
}

impl StateNormalizer {
    /// Anchored patterns so that e.g. the Delhi rule cannot fire inside a
    /// longer composite name.
    fn new() -> Result<Self> {
        let table: &[(&str, &str)] = &[
            (r"(?i)^india$", "All India"),
            (r"(?i)^jammu and kashmir$", "Jammu and Kashmir"),
            (
                r"(?i)^andaman (and|&) nicobar (islands|isl)$",
                "Andaman and Nicobar Islands",
            ),
            (r"(?i)^dadra & nagar haveli$", "Dadra and Nagar Haveli"),
            (r"(?i)^(nct of )?delhi$", "Nct of Delhi"),
        ];
        let mut rules = Vec::with_capacity(table.len());
        for (pattern, target) in table {
            rules.push((Regex::new(pattern)?, *target));
        }
        Ok(StateNormalizer { rules })
    }

    fn normalize(&self, raw: &str) -> String {
        let raw = raw.trim();
        for (re, target) in &self.rules {
            if re.is_match(raw) {
                return (*target).to_string();
            }
        }
        raw.to_string()
    }
}

fn rename_indicator(raw: &str) -> String {
    let raw = raw.trim();
    for (from, to) in INDICATOR_RENAMES {
        if raw == *from {
            return (*to).to_string();
        }
    }
    raw.to_string()
}

fn rename_year(raw: &str) -> String {
    let raw = raw.trim();
    for (from, to) in YEAR_RENAMES {
        if raw == *from {
            return (*to).to_string();
        }
    }
    raw.to_string()
}

fn canonical_category(header: &str) -> Option<&'static str> {
    EQUITY_CATEGORIES
        .iter()
        .find(|c| c.eq_ignore_ascii_case(header.trim()))
        .copied()
}

// ============================================================================
// Records
// ============================================================================

/// One state/indicator/round slice of disaggregated values.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityRecord {
    pub state: String,
    pub indicator: String,
    /// Canonical round label ("NFHS-4 (2015-16)", "NFHS-5 (2019-21)").
    pub year: String,
    pub values: BTreeMap<&'static str, Option<f64>>,
}

#[derive(Debug)]
pub struct EquityData {
    pub configs: Vec<EquityIndicatorConfig>,
    pub records: Vec<EquityRecord>,
}

impl EquityData {
    pub fn config_for(&self, indicator: &str) -> Option<&EquityIndicatorConfig> {
        self.configs.iter().find(|c| c.indicator == indicator)
    }
}

// ============================================================================
// Loader
// ============================================================================

pub fn load_equity(
    sheets: &[(String, Vec<Vec<Data>>)],
    cfg: &PipelineConfig,
    report: &mut QualityReport,
) -> Result<EquityData> {
    let config_rows = sheets
        .iter()
        .find(|(name, _)| name == EQUITY_CONFIG_SHEET)
        .map(|(_, rows)| rows)
        .ok_or_else(|| {
            anyhow::anyhow!("AMBIGUITY: equity workbook has no '{}' sheet", EQUITY_CONFIG_SHEET)
        })?;
    let configs = load_equity_config(config_rows, report)?;
    let normalizer = StateNormalizer::new()?;

    let mut records: Vec<EquityRecord> = Vec::new();
    for config in &configs {
        let rows = sheets
            .iter()
            .find(|(name, _)| name == &config.sheet)
            .map(|(_, rows)| rows)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "AMBIGUITY: equity sheet '{}' (indicator '{}') not found",
                    config.sheet,
                    config.indicator
                )
            })?;
        match config.mode {
            IngestionMode::Single => {
                ingest_single(config, rows, &normalizer, cfg, report, &mut records)?
            }
            IngestionMode::Multi => {
                ingest_multi(config, rows, &normalizer, cfg, report, &mut records)?
            }
        }
    }

    Ok(EquityData { configs, records })
}

/// Single-ingestion layout: two title rows, then the header with an
/// unnamed State column at 0 and an unnamed Total column at 1.
fn ingest_single(
    config: &EquityIndicatorConfig,
    rows: &[Vec<Data>],
    normalizer: &StateNormalizer,
    cfg: &PipelineConfig,
    report: &mut QualityReport,
    records: &mut Vec<EquityRecord>,
) -> Result<()> {
    if rows.len() < 3 {
        anyhow::bail!(
            "AMBIGUITY: equity sheet '{}' has no header row at index 2",
            config.sheet
        );
    }
    let headers = header_strings(&rows[2]);
    let year_col = headers
        .iter()
        .position(|h| h == "Year")
        .ok_or_else(|| {
            anyhow::anyhow!("AMBIGUITY: equity sheet '{}' has no 'Year' column", config.sheet)
        })?;

    // column -> canonical category; 1 is the unnamed Total
    let mut category_cols: Vec<(usize, &'static str)> = vec![(1, "Total")];
    for (idx, header) in headers.iter().enumerate().skip(2) {
        if idx == year_col {
            continue;
        }
        if let Some(category) = canonical_category(header) {
            category_cols.push((idx, category));
        }
    }

    for row in rows.iter().skip(3) {
        // dropna on State and Year
        let Some(state_raw) = cell_text(row, 0) else {
            continue;
        };
        let Some(year_raw) = cell_text(row, year_col) else {
            continue;
        };
        if let Some(record) = build_record(
            config,
            &normalizer.normalize(&state_raw),
            &rename_year(&year_raw),
            row,
            &category_cols,
            cfg,
            report,
        ) {
            records.push(record);
        }
    }
    Ok(())
}

/// Multi-ingestion layout: row 1 names each indicator at the first
/// column of its block, row 2 carries category headers, data starts at
/// row 3. A block runs to the next named block or the Year column.
fn ingest_multi(
    config: &EquityIndicatorConfig,
    rows: &[Vec<Data>],
    normalizer: &StateNormalizer,
    cfg: &PipelineConfig,
    report: &mut QualityReport,
    records: &mut Vec<EquityRecord>,
) -> Result<()> {
    if rows.len() < 3 {
        anyhow::bail!(
            "AMBIGUITY: equity sheet '{}' is too short for the multi-indicator layout",
            config.sheet
        );
    }
    let name_row = header_strings(&rows[1]);
    let headers = header_strings(&rows[2]);
    let year_col = headers
        .iter()
        .position(|h| h == "Year")
        .ok_or_else(|| {
            anyhow::anyhow!("AMBIGUITY: equity sheet '{}' has no 'Year' column", config.sheet)
        })?;

    let block_start = name_row
        .iter()
        .position(|n| rename_indicator(n) == config.indicator)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "AMBIGUITY: indicator '{}' not named on sheet '{}'",
                config.indicator,
                config.sheet
            )
        })?;
    let block_end = name_row
        .iter()
        .enumerate()
        .skip(block_start + 1)
        .find(|(_, n)| !n.is_empty())
        .map(|(idx, _)| idx)
        .unwrap_or(year_col)
        .min(year_col);

    let mut category_cols: Vec<(usize, &'static str)> = Vec::new();
    for idx in block_start..block_end {
        if let Some(header) = headers.get(idx) {
            if let Some(category) = canonical_category(header) {
                category_cols.push((idx, category));
            }
        }
    }
    if category_cols.is_empty() {
        anyhow::bail!(
            "AMBIGUITY: indicator '{}' block on sheet '{}' has no recognized categories",
            config.indicator,
            config.sheet
        );
    }

    for row in rows.iter().skip(3) {
        let Some(state_raw) = cell_text(row, 0) else {
            continue;
        };
        let Some(year_raw) = cell_text(row, year_col) else {
            continue;
        };
        if let Some(record) = build_record(
            config,
            &normalizer.normalize(&state_raw),
            &rename_year(&year_raw),
            row,
            &category_cols,
            cfg,
            report,
        ) {
            records.push(record);
        }
    }
    Ok(())
}

/// Clean one row's category cells. Defects are counted per kind; the
/// remediation policy decides what survives. Returns None when the
/// policy drops the row.
fn build_record(
    config: &EquityIndicatorConfig,
    state: &str,
    year: &str,
    row: &[Data],
    category_cols: &[(usize, &'static str)],
    cfg: &PipelineConfig,
    report: &mut QualityReport,
) -> Option<EquityRecord> {
    let mut values: BTreeMap<&'static str, Option<f64>> = BTreeMap::new();
    for (idx, category) in category_cols {
        let cell = row.get(*idx).unwrap_or(&Data::Empty);
        let context = format!("{} / {} / {} [{}]", config.indicator, state, year, category);
        let value = match check_numeric_cell(cell) {
            CellCheck::Value(v) => Some(v),
            CellCheck::Missing => {
                report.record(TABLE, DefectKind::Missing, context);
                None
            }
            CellCheck::NonNumeric(text) => {
                report.record(
                    TABLE,
                    DefectKind::NonNumeric,
                    format!("{}: '{}'", context, text),
                );
                match cfg.equity_remediation {
                    EquityRemediation::Drop => return None,
                    EquityRemediation::Report | EquityRemediation::Absolute => None,
                }
            }
            CellCheck::Negative(v) => {
                report.record(TABLE, DefectKind::Negative, format!("{}: {}", context, v));
                match cfg.equity_remediation {
                    EquityRemediation::Drop => return None,
                    // counted but served as reported
                    EquityRemediation::Report => Some(v),
                    EquityRemediation::Absolute => Some(v.abs()),
                }
            }
        };
        values.insert(category, value);
    }
    Some(EquityRecord {
        state: state.to_string(),
        indicator: config.indicator.clone(),
        year: year.to_string(),
        values,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Data {
        Data::String(text.into())
    }

    fn config_sheet(rows: Vec<Vec<Data>>) -> (String, Vec<Vec<Data>>) {
        let mut all = vec![vec![
            s("Indicator"),
            s("Sheet"),
            s("Ingestion"),
            s("Indicator Type"),
            s("Default"),
            s("Disaggregation"),
        ]];
        all.extend(rows);
        (EQUITY_CONFIG_SHEET.to_string(), all)
    }

    fn config_row(
        indicator: &str,
        sheet: &str,
        mode: &str,
        indicator_type: &str,
        default: &str,
        groups: &str,
    ) -> Vec<Data> {
        vec![s(indicator), s(sheet), s(mode), s(indicator_type), s(default), s(groups)]
    }

    /// Title rows + header (State and Total columns unnamed) + data.
    fn single_sheet(name: &str, data_rows: Vec<Vec<Data>>) -> (String, Vec<Vec<Data>>) {
        let mut rows = vec![
            vec![s("Equity analysis")],
            vec![Data::Empty],
            vec![
                Data::Empty,
                Data::Empty,
                s("Rural"),
                s("Urban"),
                s("Year"),
            ],
        ];
        rows.extend(data_rows);
        (name.to_string(), rows)
    }

    fn single_row(state: &str, total: &str, rural: &str, urban: &str, year: &str) -> Vec<Data> {
        vec![s(state), s(total), s(rural), s(urban), s(year)]
    }

    // -------------------------------------------------------------------------
    // CONFIGURATION SHEET TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_config_parse() {
        let (_, rows) = config_sheet(vec![
            config_row("ANC 4+ visits", "ANC", "single", "Maternal Health", "Yes", "Residence, Wealth"),
            config_row("Skilled birth attendant", "SBA", "multi", "Maternal Health", "", "Wealth"),
        ]);
        let mut report = QualityReport::new();
        let configs = load_equity_config(&rows, &mut report).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].mode, IngestionMode::Single);
        assert!(configs[0].default_selected);
        assert_eq!(
            configs[0].disaggregations,
            vec![Disaggregation::Residence, Disaggregation::Wealth]
        );
        assert_eq!(configs[1].mode, IngestionMode::Multi);
        assert!(!configs[1].default_selected);
    }

    #[test]
    fn test_config_unknown_mode_fails() {
        let (_, rows) = config_sheet(vec![config_row("X", "S", "both", "T", "", "")]);
        let mut report = QualityReport::new();
        let result = load_equity_config(&rows, &mut report);
        assert!(result.unwrap_err().to_string().contains("AMBIGUITY"));
    }

    #[test]
    fn test_config_colors_cycle_per_type() {
        let rows_vec: Vec<Vec<Data>> = (0..8)
            .map(|i| {
                config_row(
                    &format!("Indicator {}", i),
                    "S",
                    "single",
                    &format!("Type {}", i),
                    "",
                    "Wealth",
                )
            })
            .collect();
        let (_, rows) = config_sheet(rows_vec);
        let mut report = QualityReport::new();
        let configs = load_equity_config(&rows, &mut report).unwrap();
        // palette wraps after six types
        assert_eq!(configs[0].color, configs[6].color);
        assert_ne!(configs[0].color, configs[1].color);
    }

    #[test]
    fn test_config_unknown_group_reported() {
        let (_, rows) = config_sheet(vec![config_row("X", "S", "single", "T", "", "Wealth, Zodiac")]);
        let mut report = QualityReport::new();
        let configs = load_equity_config(&rows, &mut report).unwrap();
        assert_eq!(configs[0].disaggregations, vec![Disaggregation::Wealth]);
        assert_eq!(report.count(TABLE, DefectKind::Unmatched), 1);
    }

    // -------------------------------------------------------------------------
    // SINGLE-INGESTION TESTS
    // -------------------------------------------------------------------------

    fn single_workbook(data_rows: Vec<Vec<Data>>) -> Vec<(String, Vec<Vec<Data>>)> {
        vec![
            config_sheet(vec![config_row(
                "ANC 4+ visits",
                "ANC",
                "single",
                "Maternal Health",
                "Yes",
                "Residence",
            )]),
            single_sheet("ANC", data_rows),
        ]
    }

    #[test]
    fn test_single_sheet_parsed() {
        let sheets = single_workbook(vec![
            single_row("Kerala", "80.0", "78.0", "82.0", "2019-21"),
            // missing Year dropped
            single_row("Goa", "70.0", "69.0", "71.0", ""),
        ]);
        let mut report = QualityReport::new();
        let data = load_equity(&sheets, &PipelineConfig::default(), &mut report).unwrap();
        assert_eq!(data.records.len(), 1);
        let record = &data.records[0];
        assert_eq!(record.state, "Kerala");
        assert_eq!(record.year, "NFHS-5 (2019-21)");
        assert_eq!(record.values.get("Total"), Some(&Some(80.0)));
        assert_eq!(record.values.get("Rural"), Some(&Some(78.0)));
        assert_eq!(record.values.get("Urban"), Some(&Some(82.0)));
    }

    #[test]
    fn test_state_normalization_anchored() {
        let sheets = single_workbook(vec![
            single_row("India", "50.0", "49.0", "51.0", "2015-16"),
            single_row("Delhi", "60.0", "59.0", "61.0", "2015-16"),
            single_row("Nct Of Delhi", "60.0", "59.0", "61.0", "2019-21"),
            single_row("New Delhi Municipal Council", "1.0", "1.0", "1.0", "2019-21"),
        ]);
        let mut report = QualityReport::new();
        let data = load_equity(&sheets, &PipelineConfig::default(), &mut report).unwrap();
        let states: Vec<&str> = data.records.iter().map(|r| r.state.as_str()).collect();
        assert_eq!(
            states,
            vec![
                "All India",
                "Nct of Delhi",
                "Nct of Delhi",
                // anchoring keeps composites untouched
                "New Delhi Municipal Council"
            ]
        );
        assert_eq!(data.records[0].year, "NFHS-4 (2015-16)");
    }

    #[test]
    fn test_remediation_policies() {
        let negative = vec![single_row("Kerala", "-3.0", "78.0", "82.0", "2019-21")];

        // Report: counted, served as reported
        let mut report = QualityReport::new();
        let cfg = PipelineConfig::default();
        let data = load_equity(&single_workbook(negative.clone()), &cfg, &mut report).unwrap();
        assert_eq!(data.records[0].values.get("Total"), Some(&Some(-3.0)));
        assert_eq!(report.count(TABLE, DefectKind::Negative), 1);

        // Absolute
        let cfg = PipelineConfig {
            equity_remediation: EquityRemediation::Absolute,
            ..PipelineConfig::default()
        };
        let mut report = QualityReport::new();
        let data = load_equity(&single_workbook(negative.clone()), &cfg, &mut report).unwrap();
        assert_eq!(data.records[0].values.get("Total"), Some(&Some(3.0)));

        // Drop
        let cfg = PipelineConfig {
            equity_remediation: EquityRemediation::Drop,
            ..PipelineConfig::default()
        };
        let mut report = QualityReport::new();
        let data = load_equity(&single_workbook(negative), &cfg, &mut report).unwrap();
        assert!(data.records.is_empty());
    }

    #[test]
    fn test_missing_and_non_numeric_counted_separately() {
        let mut row = single_row("Kerala", "80.0", "", "82.0", "2019-21");
        row[3] = s("n/a");
        let sheets = single_workbook(vec![row]);
        let mut report = QualityReport::new();
        let data = load_equity(&sheets, &PipelineConfig::default(), &mut report).unwrap();
        assert_eq!(report.count(TABLE, DefectKind::Missing), 1);
        assert_eq!(report.count(TABLE, DefectKind::NonNumeric), 1);
        assert_eq!(data.records[0].values.get("Rural"), Some(&None));
        assert_eq!(data.records[0].values.get("Urban"), Some(&None));
    }

    // -------------------------------------------------------------------------
    // MULTI-INGESTION TESTS
    // -------------------------------------------------------------------------

    fn multi_workbook() -> Vec<(String, Vec<Vec<Data>>)> {
        vec![
            config_sheet(vec![
                config_row("Neonatal Protection", "Multi", "multi", "Child Health", "", "Wealth"),
                config_row("Full immunization", "Multi", "multi", "Child Health", "", "Wealth"),
            ]),
            (
                "Multi".to_string(),
                vec![
                    vec![s("Equity analysis - multiple indicators")],
                    // indicator names at block starts
                    vec![
                        Data::Empty,
                        s("Protected against neonatTetnus "),
                        Data::Empty,
                        s("Full immunization"),
                        Data::Empty,
                        Data::Empty,
                    ],
                    // category headers + Year
                    vec![
                        s("State"),
                        s("Poorest"),
                        s("Richest"),
                        s("Poorest"),
                        s("Richest"),
                        s("Year"),
                    ],
                    vec![
                        s("Kerala"),
                        s("71.0"),
                        s("91.0"),
                        s("62.0"),
                        s("88.0"),
                        s("2019-21"),
                    ],
                ],
            ),
        ]
    }

    #[test]
    fn test_multi_blocks_extracted_and_renamed() {
        let mut report = QualityReport::new();
        let data = load_equity(&multi_workbook(), &PipelineConfig::default(), &mut report).unwrap();
        assert_eq!(data.records.len(), 2);

        let neonatal = &data.records[0];
        assert_eq!(neonatal.indicator, "Neonatal Protection");
        assert_eq!(neonatal.values.get("Poorest"), Some(&Some(71.0)));
        assert_eq!(neonatal.values.get("Richest"), Some(&Some(91.0)));

        let immunization = &data.records[1];
        assert_eq!(immunization.indicator, "Full immunization");
        assert_eq!(immunization.values.get("Poorest"), Some(&Some(62.0)));
        assert_eq!(immunization.values.get("Richest"), Some(&Some(88.0)));
    }

    #[test]
    fn test_multi_missing_year_column_fails() {
        let mut sheets = multi_workbook();
        sheets[1].1[2][5] = s("Period");
        let mut report = QualityReport::new();
        let result = load_equity(&sheets, &PipelineConfig::default(), &mut report);
        assert!(result.unwrap_err().to_string().contains("Year"));
    }

    #[test]
    fn test_multi_unnamed_indicator_fails() {
        let mut sheets = multi_workbook();
        sheets[1].1[1][3] = s("Some other indicator");
        let mut report = QualityReport::new();
        let result = load_equity(&sheets, &PipelineConfig::default(), &mut report);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Full immunization"));
    }
}
