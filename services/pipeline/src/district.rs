//! District survey loader
//!
//! Loads the NFHS-4/5 district compiled workbook (wide: one row per
//! district x round, indicators as columns), applies the naming
//! corrections agreed with the data owner, reshapes to long form, and
//! joins every record against the boundary vocabulary so the map layer
//! can filter by geo label.
//!
//! Workbook layout: row 0 annotates each indicator column with its
//! domain (text before the first '.' or ':'), row 1 is the real header
//! (State, Districts, Survey round, year, then indicators).

use crate::config::{NegativePolicy, NonNumericPolicy, PipelineConfig};
use crate::geo::GeoBoundarySource;
use crate::matching::{NameMatch, NameMatcher};
use crate::report::{check_numeric_cell, CellCheck, DefectKind, QualityReport};
use crate::workbook::{cell_text, header_strings};
use anyhow::Result;
use calamine::Data;
use std::collections::{BTreeMap, BTreeSet};

const TABLE: &str = "district survey";

/// Survey round of the district compiled workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SurveyRound {
    Nfhs4,
    Nfhs5,
}

impl SurveyRound {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim() {
            "NFHS-4" => Some(SurveyRound::Nfhs4),
            "NFHS-5" => Some(SurveyRound::Nfhs5),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SurveyRound::Nfhs4 => "NFHS-4",
            SurveyRound::Nfhs5 => "NFHS-5",
        }
    }
}

/// One district/indicator/round observation after cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictSurveyRecord {
    pub state: String,
    pub district: String,
    pub round: SurveyRound,
    pub indicator: String,
    pub value: Option<f64>,
    /// Boundary join key; None keeps the record out of map rendering but
    /// in tabular display.
    pub geo_label: Option<String>,
}

/// District name with its resolved boundary key, in data order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoKey {
    pub district: String,
    pub geo_label: Option<String>,
}

#[derive(Debug)]
pub struct DistrictSurvey {
    pub records: Vec<DistrictSurveyRecord>,
    /// Indicator column names in workbook order.
    pub indicators: Vec<String>,
    /// (indicator, domain) per indicator column.
    pub indicator_domains: Vec<(String, String)>,
    /// Data states, first-seen order.
    pub states: Vec<String>,
    /// Data state -> matched geo state.
    pub state_geo: BTreeMap<String, Option<String>>,
    /// Data state -> its districts with boundary keys.
    pub district_geo: BTreeMap<String, Vec<GeoKey>>,
}

impl DistrictSurvey {
    /// Unique domains in column order.
    pub fn domains(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for (_, domain) in &self.indicator_domains {
            if !out.iter().any(|d| d == domain) {
                out.push(domain.clone());
            }
        }
        out
    }

    pub fn indicators_in_domain(&self, domain: &str) -> Vec<&str> {
        self.indicator_domains
            .iter()
            .filter(|(_, d)| d == domain)
            .map(|(indicator, _)| indicator.as_str())
            .collect()
    }
}

// ============================================================================
// Manual correction tables (agreed with the data owner; do not extend)
// ============================================================================

/// Raw state spellings in the workbook that are fixed before matching.
const STATE_NAME_FIXES: &[(&str, &str)] = &[
    ("WB", "West Bengal"),
    ("TR", "Tripura"),
    ("UTTAR PRADESH", "Uttar Pradesh"),
    ("UTTARAKHAND", "Uttarakhand"),
];

/// "Tue" in Nagaland is Tuensang shorthand colliding with Mon; the data
/// owner confirmed it reads as Mon.
const DISTRICT_NAME_FIXES: &[(&str, &str)] = &[("Tue", "Mon")];

/// State abbreviations the boundary vocabulary cannot fuzzy-match.
const STATE_GEO_OVERRIDES: &[(&str, &str)] = &[
    ("D & D", "Daman and Diu"),
    ("DNH", "Dadra and Nagar Haveli"),
];

/// District overrides: one abbreviation fix plus pinned identities for
/// names that fuzzy matching double-assigns to a neighbouring
/// East/West-style district.
const DISTRICT_GEO_OVERRIDES: &[(&str, &str)] = &[
    ("D & DNH", "Dadra & Nagar Haveli"),
    ("East Godavari", "East Godavari"),
    ("East Khasi Hills", "East Khasi Hills"),
    ("East Garo Hills", "East Garo Hills"),
    ("Imphal East", "Imphal East"),
    ("East District", "East District"),
    ("Ranga Reddy", "Ranga Reddy"),
    ("East Kameng", "East Kameng"),
    ("East Siang", "East Siang"),
    ("East", "East"),
    ("North East", "North East"),
    ("South East", "South East"),
];

fn apply_fixes(name: &str, fixes: &[(&str, &str)]) -> String {
    for (raw, fixed) in fixes {
        if name == *raw {
            return fixed.to_string();
        }
    }
    name.to_string()
}

/// Domain is the column annotation's text before the first '.' or ':'.
fn domain_of(annotation: &str) -> String {
    annotation
        .split(['.', ':'])
        .next()
        .unwrap_or(annotation)
        .trim()
        .to_string()
}

// ============================================================================
// Loader
// ============================================================================

pub fn load_district_survey(
    rows: &[Vec<Data>],
    geo: &GeoBoundarySource,
    cfg: &PipelineConfig,
    report: &mut QualityReport,
) -> Result<DistrictSurvey> {
    if rows.len() < 2 {
        anyhow::bail!("AMBIGUITY: district workbook needs a domain row and a header row");
    }
    let domain_row = header_strings(&rows[0]);
    let headers = header_strings(&rows[1]);

    // Fixed leading columns, exact semantics assumed downstream.
    let expected = ["State", "Districts", "Survey round", "year"];
    for (idx, want) in expected.iter().enumerate() {
        let found = headers.get(idx).map(String::as_str).unwrap_or("");
        let matches = found.eq_ignore_ascii_case(want)
            || (idx == 1 && found.eq_ignore_ascii_case("District name"))
            || (idx == 2 && found.eq_ignore_ascii_case("Round"));
        if !matches {
            anyhow::bail!(
                "AMBIGUITY: district workbook column {} is '{}', expected '{}'",
                idx,
                found,
                want
            );
        }
    }

    // Keep each indicator's column position; a blank header cell inside
    // the range must not shift later columns.
    let indicator_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .skip(4)
        .filter(|(_, h)| !h.is_empty())
        .map(|(col, h)| (col, h.clone()))
        .collect();
    let indicators: Vec<String> = indicator_columns
        .iter()
        .map(|(_, indicator)| indicator.clone())
        .collect();
    let mut indicator_domains = Vec::with_capacity(indicator_columns.len());
    for (col, indicator) in &indicator_columns {
        let annotation = domain_row.get(*col).map(String::as_str).unwrap_or("");
        if annotation.is_empty() {
            anyhow::bail!(
                "AMBIGUITY: indicator column '{}' has no domain annotation",
                indicator
            );
        }
        indicator_domains.push((indicator.clone(), domain_of(annotation)));
    }

    // Pass 1: parse rows, fix names, collect the (state, district) vocabulary.
    struct RawRow {
        state: String,
        district: String,
        round: SurveyRound,
        values: Vec<Data>,
    }
    let mut raw_rows: Vec<RawRow> = Vec::new();
    let mut states: Vec<String> = Vec::new();
    let mut state_districts: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (row_idx, row) in rows.iter().enumerate().skip(2) {
        let Some(state_raw) = cell_text(row, 0) else {
            continue;
        };
        let Some(district_raw) = cell_text(row, 1) else {
            continue;
        };
        let state = apply_fixes(&state_raw, STATE_NAME_FIXES);
        let district = apply_fixes(&district_raw, DISTRICT_NAME_FIXES);
        let round_label = cell_text(row, 2).unwrap_or_default();
        let Some(round) = SurveyRound::parse(&round_label) else {
            report.record(
                TABLE,
                DefectKind::Unmatched,
                format!("row {}: unknown survey round '{}'", row_idx + 1, round_label),
            );
            continue;
        };
        if !states.iter().any(|s| s == &state) {
            states.push(state.clone());
        }
        let districts = state_districts.entry(state.clone()).or_default();
        if !districts.iter().any(|d| d == &district) {
            districts.push(district.clone());
        }
        raw_rows.push(RawRow {
            state,
            district,
            round,
            values: indicator_columns
                .iter()
                .map(|(col, _)| row.get(*col).cloned().unwrap_or(Data::Empty))
                .collect(),
        });
    }

    // Pass 2: resolve geo keys for every (state, district).
    let geo_states = geo.state_names();
    let state_matcher = NameMatcher::with_overrides(cfg.state_cutoff, STATE_GEO_OVERRIDES);
    let district_matcher =
        NameMatcher::with_overrides(cfg.district_cutoff, DISTRICT_GEO_OVERRIDES);

    // Override entries whose target no longer exists in the boundary
    // vocabulary are stale; flag the ones this dataset actually uses.
    for (raw, target) in state_matcher.stale_overrides(&geo_states) {
        if states.iter().any(|s| s == &raw) {
            report.record(
                TABLE,
                DefectKind::Unmatched,
                format!("stale state override '{}' -> '{}'", raw, target),
            );
        }
    }

    let mut state_geo: BTreeMap<String, Option<String>> = BTreeMap::new();
    let mut district_geo: BTreeMap<String, Vec<GeoKey>> = BTreeMap::new();
    for state in &states {
        let matched_state = match state_matcher.resolve(state, &geo_states) {
            NameMatch::Matched(name) => Some(name),
            NameMatch::Unmatched => {
                report.record(
                    TABLE,
                    DefectKind::Unmatched,
                    format!("state '{}' has no boundary counterpart", state),
                );
                None
            }
        };

        let geo_districts: Vec<String> = matched_state
            .as_deref()
            .map(|gs| {
                geo.districts_in_state(gs)
                    .iter()
                    .map(|d| d.district.clone())
                    .collect()
            })
            .unwrap_or_default();

        let mut keys = Vec::new();
        for district in state_districts.get(state).into_iter().flatten() {
            let geo_label = match district_matcher.resolve(district, &geo_districts) {
                NameMatch::Matched(geo_district) => {
                    let label = matched_state.as_deref().and_then(|gs| {
                        geo.districts_in_state(gs)
                            .iter()
                            .find(|d| d.district == geo_district)
                            .map(|d| d.label.clone())
                    });
                    if label.is_none() {
                        report.record(
                            TABLE,
                            DefectKind::Unmatched,
                            format!(
                                "district '{}' ({}): override target '{}' absent from boundaries",
                                district, state, geo_district
                            ),
                        );
                    }
                    label
                }
                NameMatch::Unmatched => {
                    report.record(
                        TABLE,
                        DefectKind::Unmatched,
                        format!("district '{}' ({}) has no boundary counterpart", district, state),
                    );
                    None
                }
            };
            keys.push(GeoKey {
                district: district.clone(),
                geo_label,
            });
        }
        state_geo.insert(state.clone(), matched_state);
        district_geo.insert(state.clone(), keys);
    }

    // Pass 3: melt to long form, report defects, then remediate per policy.
    let mut records: Vec<DistrictSurveyRecord> = Vec::new();
    let mut seen: BTreeSet<(String, String, SurveyRound, String)> = BTreeSet::new();
    for raw in &raw_rows {
        let geo_label = district_geo
            .get(&raw.state)
            .and_then(|keys| keys.iter().find(|k| k.district == raw.district))
            .and_then(|k| k.geo_label.clone());
        for (idx, indicator) in indicators.iter().enumerate() {
            let cell = raw.values.get(idx).unwrap_or(&Data::Empty);
            let context = format!(
                "{} / {} / {} / {}",
                raw.state,
                raw.district,
                raw.round.label(),
                indicator
            );
            let value = match check_numeric_cell(cell) {
                CellCheck::Value(v) => Some(v),
                CellCheck::Missing => None,
                CellCheck::NonNumeric(text) => {
                    report.record(
                        TABLE,
                        DefectKind::NonNumeric,
                        format!("{}: '{}'", context, text),
                    );
                    match cfg.non_numeric {
                        NonNumericPolicy::DropRow => continue,
                        NonNumericPolicy::CoerceMissing => None,
                    }
                }
                CellCheck::Negative(v) => {
                    report.record(TABLE, DefectKind::Negative, format!("{}: {}", context, v));
                    match cfg.negatives {
                        NegativePolicy::DropRow => continue,
                        NegativePolicy::AbsoluteValue => Some(v.abs()),
                    }
                }
            };

            let key = (
                raw.state.clone(),
                raw.district.clone(),
                raw.round,
                indicator.clone(),
            );
            if !seen.insert(key) {
                report.record(TABLE, DefectKind::Duplicate, context);
                continue;
            }
            records.push(DistrictSurveyRecord {
                state: raw.state.clone(),
                district: raw.district.clone(),
                round: raw.round,
                indicator: indicator.clone(),
                value,
                geo_label: geo_label.clone(),
            });
        }
    }

    Ok(DistrictSurvey {
        records,
        indicators,
        indicator_domains,
        states,
        state_geo,
        district_geo,
    })
}

// ============================================================================
// TESTS
// ============================================================================
