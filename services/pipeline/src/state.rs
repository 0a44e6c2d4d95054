//! State and national survey loader
//!
//! Unifies two structurally different workbooks into one long table:
//! the national factsheet (wide, positional header with unnamed columns)
//! and the states compiled workbook (long, three survey rounds). After
//! unification the gender dimension is normalized and folded into the
//! indicator vocabulary so cross-gender name collisions cannot occur.

use crate::config::{NegativePolicy, NonNumericPolicy, PipelineConfig};
use crate::report::{check_numeric_cell, CellCheck, DefectKind, QualityReport};
use crate::workbook::{cell_text, find_column, header_strings};
use anyhow::Result;
use calamine::Data;
use regex::Regex;
use std::collections::BTreeSet;

const NATIONAL_TABLE: &str = "national factsheet";
const STATES_TABLE: &str = "states survey";
const TABLE: &str = "state survey (unified)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    pub fn label(&self) -> &'static str {
        match self {
            Gender::Female => "Female",
            Gender::Male => "Male",
        }
    }
}

/// One state/indicator/round observation after unification and cleaning.
/// `indicator_type` and `indicator` carry the gender suffix when gender
/// is present.
#[derive(Debug, Clone, PartialEq)]
pub struct StateIndicatorRecord {
    pub state: String,
    pub indicator_type: String,
    pub indicator: String,
    pub gender: Option<Gender>,
    /// Round label as reported ("NFHS 3", "NFHS 4", "NFHS 5").
    pub round: String,
    pub year: Option<String>,
    pub urban: Option<f64>,
    pub rural: Option<f64>,
    pub total: Option<f64>,
}

/// Pre-unification row, numeric cells still raw.
#[derive(Debug, Clone)]
pub struct RawStateRow {
    pub state: String,
    pub indicator_type: String,
    pub indicator: String,
    pub gender: Option<String>,
    pub round: String,
    pub year: Option<String>,
    pub urban: Data,
    pub rural: Data,
    pub total: Data,
}

impl RawStateRow {
    fn dedup_key(&self) -> (String, String, String, Option<String>, String) {
        (
            self.indicator_type.clone(),
            self.indicator.clone(),
            self.state.clone(),
            self.gender.clone(),
            self.round.clone(),
        )
    }
}

#[derive(Debug)]
pub struct StateSurvey {
    pub records: Vec<StateIndicatorRecord>,
    /// (indicator type, indicators) in first-seen order, post gender
    /// folding. Feeds hierarchical selection menus.
    pub taxonomy: Vec<(String, Vec<String>)>,
    /// Case-insensitively sorted state vocabulary.
    pub states: Vec<String>,
}

impl StateSurvey {
    pub fn indicator_types(&self) -> Vec<&str> {
        self.taxonomy.iter().map(|(t, _)| t.as_str()).collect()
    }

    pub fn indicators_of_type(&self, indicator_type: &str) -> &[String] {
        self.taxonomy
            .iter()
            .find(|(t, _)| t == indicator_type)
            .map(|(_, inds)| inds.as_slice())
            .unwrap_or(&[])
    }

    /// Two-level selection lookup: (type index, indicator index within
    /// type) -> (indicator type, indicator).
    pub fn selection(&self, type_idx: usize, ind_idx: usize) -> Option<(&str, &str)> {
        let (indicator_type, indicators) = self.taxonomy.get(type_idx)?;
        let indicator = indicators.get(ind_idx)?;
        Some((indicator_type.as_str(), indicator.as_str()))
    }
}

// ============================================================================
// Hand-verified source corrections (one-off exceptions, not a rule)
// ============================================================================

/// Indicators the source workbook mis-tags: (indicator, forced type,
/// forced gender). The cancer-screening rows arrive tagged with the
/// wrong gender for sex-specific examinations.
const INDICATOR_TAG_FIXES: &[(&str, Option<&str>, Option<Gender>)] = &[
    (
        "Women age 30-49 years who have ever undergone a screening test for cervical cancer (%)",
        None,
        Some(Gender::Female),
    ),
    (
        "Women age 30-49 years who have ever undergone a breast examination for breast cancer (%)",
        None,
        Some(Gender::Female),
    ),
    (
        "Men age 30-49 years who have ever undergone an oral cavity examination for oral cancer (%)",
        None,
        Some(Gender::Male),
    ),
];

// ============================================================================
// National factsheet
// ============================================================================

/// Column positions of the national factsheet. Only the named leading
/// columns can be validated; the rest of the layout is positional
/// because the source leaves those header cells blank.
const NATIONAL_URBAN: usize = 3;
const NATIONAL_RURAL: usize = 4;
const NATIONAL_TOTAL: usize = 5;
const NATIONAL_TYPE: usize = 7;
const NATIONAL_GENDER: usize = 8;
const NATIONAL_ROUND: usize = 9;
const NATIONAL_YEAR: usize = 10;

pub fn load_national_factsheet(
    rows: &[Vec<Data>],
    synthesize_nfhs4: bool,
    report: &mut QualityReport,
) -> Result<Vec<RawStateRow>> {
    if rows.len() < 2 {
        anyhow::bail!("AMBIGUITY: national factsheet needs a header and data rows");
    }
    let headers = header_strings(&rows[0]);
    let named = [(0, "Sl.No"), (1, "Indicator"), (2, "NFHS-4 (2015-16)"), (3, "NFHS-5 (2019-21)")];
    for (idx, want) in named {
        let found = headers.get(idx).map(String::as_str).unwrap_or("");
        if !found.eq_ignore_ascii_case(want) {
            anyhow::bail!(
                "AMBIGUITY: national factsheet column {} is '{}', expected '{}'",
                idx,
                found,
                want
            );
        }
    }

    let mut out = Vec::new();
    // rows[1] repeats header text inside the data area, skip it
    for row in rows.iter().skip(2) {
        let Some(indicator) = cell_text(row, 1) else {
            continue;
        };
        let indicator_type = cell_text(row, NATIONAL_TYPE).unwrap_or_default();
        let gender = cell_text(row, NATIONAL_GENDER);
        let round = cell_text(row, NATIONAL_ROUND).unwrap_or_else(|| "NFHS 5".into());
        let year = cell_text(row, NATIONAL_YEAR);

        if synthesize_nfhs4 {
            // NFHS-4 arrives as one extra column on the NFHS-5 row;
            // surface it as its own row with a Total value only.
            let nfhs4_total = row.get(2).cloned().unwrap_or(Data::Empty);
            out.push(RawStateRow {
                state: "India".into(),
                indicator_type: indicator_type.clone(),
                indicator: indicator.clone(),
                gender: gender.clone(),
                round: "NFHS 4".into(),
                year: Some("2016".into()),
                urban: Data::Empty,
                rural: Data::Empty,
                total: nfhs4_total,
            });
        }

        out.push(RawStateRow {
            state: "India".into(),
            indicator_type,
            indicator,
            gender,
            round,
            year,
            urban: row.get(NATIONAL_URBAN).cloned().unwrap_or(Data::Empty),
            rural: row.get(NATIONAL_RURAL).cloned().unwrap_or(Data::Empty),
            total: row.get(NATIONAL_TOTAL).cloned().unwrap_or(Data::Empty),
        });
    }

    drop_ambiguous_gender_rows(out, NATIONAL_TABLE, report)
}

// ============================================================================
// States compiled workbook
// ============================================================================

pub fn load_states_workbook(
    rows: &[Vec<Data>],
    report: &mut QualityReport,
) -> Result<Vec<RawStateRow>> {
    if rows.is_empty() {
        anyhow::bail!("AMBIGUITY: states workbook is empty");
    }
    let headers = header_strings(&rows[0]);
    let col = |candidates: &[&str]| -> Result<usize> {
        find_column(&headers, candidates).ok_or_else(|| {
            anyhow::anyhow!(
                "AMBIGUITY: states workbook is missing a '{}' column",
                candidates[0]
            )
        })
    };
    let state_col = col(&["State"])?;
    let type_col = col(&["Indicator Type"])?;
    let indicator_col = col(&["Indicator"])?;
    let gender_col = col(&["Gender"])?;
    let round_col = col(&["NFHS"])?;
    let year_col = col(&["Year (give as a period)", "Year"])?;
    let urban_col = col(&["Urban"])?;
    let rural_col = col(&["Rural"])?;
    let total_col = col(&["Total"])?;

    let mut out = Vec::new();
    for row in rows.iter().skip(1) {
        let Some(state) = cell_text(row, state_col) else {
            continue;
        };
        let Some(indicator) = cell_text(row, indicator_col) else {
            continue;
        };
        out.push(RawStateRow {
            state,
            indicator_type: cell_text(row, type_col).unwrap_or_default(),
            indicator,
            gender: cell_text(row, gender_col),
            round: cell_text(row, round_col).unwrap_or_default(),
            year: cell_text(row, year_col),
            urban: row.get(urban_col).cloned().unwrap_or(Data::Empty),
            rural: row.get(rural_col).cloned().unwrap_or(Data::Empty),
            total: row.get(total_col).cloned().unwrap_or(Data::Empty),
        });
    }

    drop_ambiguous_gender_rows(out, STATES_TABLE, report)
}

/// Rows whose full key collides (which in practice means the gender
/// annotation was left blank on sex-specific indicators) are dropped
/// entirely, never merged. Every dropped row is reported.
fn drop_ambiguous_gender_rows(
    rows: Vec<RawStateRow>,
    table: &str,
    report: &mut QualityReport,
) -> Result<Vec<RawStateRow>> {
    let mut counts: std::collections::BTreeMap<_, usize> = std::collections::BTreeMap::new();
    for row in &rows {
        *counts.entry(row.dedup_key()).or_insert(0) += 1;
    }
    let mut kept = Vec::with_capacity(rows.len());
    for row in rows {
        if counts.get(&row.dedup_key()).copied().unwrap_or(0) > 1 {
            report.record(
                table,
                DefectKind::Duplicate,
                format!(
                    "{} / {} / {} / {} (gender: {})",
                    row.indicator_type,
                    row.indicator,
                    row.state,
                    row.round,
                    row.gender.as_deref().unwrap_or("missing")
                ),
            );
        } else {
            kept.push(row);
        }
    }
    Ok(kept)
}

// ============================================================================
// Unification
// ============================================================================

pub fn unify_state_surveys(
    states_rows: Vec<RawStateRow>,
    national_rows: Vec<RawStateRow>,
    cfg: &PipelineConfig,
    report: &mut QualityReport,
) -> Result<StateSurvey> {
    let female_re = Regex::new(r"(?i)female")?;
    let male_re = Regex::new(r"(?i)\bmale\b")?;
    let india_re = Regex::new(r"(?i)\bindia\b")?;

    // States rows first so they win keep-first dedup when India appears
    // in both workbooks.
    let mut combined = states_rows;
    combined.extend(national_rows);

    let mut seen: BTreeSet<(String, String, String, Option<String>, String)> = BTreeSet::new();
    let mut records: Vec<StateIndicatorRecord> = Vec::new();

    'rows: for raw in combined {
        let state = india_re.replace_all(&raw.state, "All India").into_owned();

        let mut gender = match raw.gender.as_deref() {
            None => None,
            Some(text) if female_re.is_match(text) => Some(Gender::Female),
            Some(text) if male_re.is_match(text) => Some(Gender::Male),
            Some(text) => {
                report.record(
                    TABLE,
                    DefectKind::Unmatched,
                    format!("{} / {}: unrecognized gender '{}'", raw.indicator, state, text),
                );
                None
            }
        };
        let mut indicator_type = raw.indicator_type.clone();
        for (indicator, fixed_type, fixed_gender) in INDICATOR_TAG_FIXES {
            if raw.indicator == *indicator {
                if let Some(t) = fixed_type {
                    indicator_type = (*t).to_string();
                }
                if let Some(g) = fixed_gender {
                    gender = Some(*g);
                }
            }
        }

        // Dedup on the normalized key; a row from the national workbook
        // repeating a states-workbook row is dropped keep-first.
        let key = (
            indicator_type.clone(),
            raw.indicator.clone(),
            state.clone(),
            gender.map(|g| g.label().to_string()),
            raw.round.clone(),
        );
        if !seen.insert(key) {
            report.record(
                TABLE,
                DefectKind::Duplicate,
                format!("{} / {} / {} / {}", indicator_type, raw.indicator, state, raw.round),
            );
            continue;
        }

        // Clean the three numeric columns, reporting before remediation.
        let mut cleaned = [None, None, None];
        for (slot, (name, cell)) in [
            ("Urban", &raw.urban),
            ("Rural", &raw.rural),
            ("Total", &raw.total),
        ]
        .iter()
        .enumerate()
        {
            let context = format!("{} / {} / {} [{}]", raw.indicator, state, raw.round, name);
            cleaned[slot] = match check_numeric_cell(cell) {
                CellCheck::Value(v) => Some(v),
                CellCheck::Missing => None,
                CellCheck::NonNumeric(text) => {
                    report.record(
                        TABLE,
                        DefectKind::NonNumeric,
                        format!("{}: '{}'", context, text),
                    );
                    match cfg.non_numeric {
                        NonNumericPolicy::DropRow => continue 'rows,
                        NonNumericPolicy::CoerceMissing => None,
                    }
                }
                CellCheck::Negative(v) => {
                    report.record(TABLE, DefectKind::Negative, format!("{}: {}", context, v));
                    match cfg.negatives {
                        NegativePolicy::DropRow => continue 'rows,
                        NegativePolicy::AbsoluteValue => Some(v.abs()),
                    }
                }
            };
        }

        // Fold gender into the indicator vocabulary.
        let (indicator_type, indicator) = match gender {
            Some(g) => (
                format!("{} - {}", indicator_type, g.label()),
                format!("{} - {}", raw.indicator, g.label()),
            ),
            None => (indicator_type, raw.indicator.clone()),
        };

        records.push(StateIndicatorRecord {
            state,
            indicator_type,
            indicator,
            gender,
            round: raw.round,
            year: raw.year,
            urban: cleaned[0],
            rural: cleaned[1],
            total: cleaned[2],
        });
    }

    // Taxonomy index, first-seen order.
    let mut taxonomy: Vec<(String, Vec<String>)> = Vec::new();
    for record in &records {
        match taxonomy.iter_mut().find(|(t, _)| t == &record.indicator_type) {
            Some((_, indicators)) => {
                if !indicators.iter().any(|i| i == &record.indicator) {
                    indicators.push(record.indicator.clone());
                }
            }
            None => taxonomy.push((
                record.indicator_type.clone(),
                vec![record.indicator.clone()],
            )),
        }
    }

    let mut states: Vec<String> = Vec::new();
    for record in &records {
        if !states.iter().any(|s| s == &record.state) {
            states.push(record.state.clone());
        }
    }
    states.sort_by_key(|s| s.to_lowercase());

    Ok(StateSurvey {
        records,
        taxonomy,
        states,
    })
}

// ============================================================================
// TESTS
// ============================================================================
