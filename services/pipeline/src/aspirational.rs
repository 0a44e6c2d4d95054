//! Aspirational district registry
//!
//! Loads the district cohort workbook (development-priority programmes)
//! and reconciles its naming against the survey vocabulary. The registry
//! is hand-maintained upstream: names drift from the survey spellings
//! and a handful of districts appear twice. Duplicates resolve
//! keep-first, then a short hand-verified patch table restores flags the
//! keep-first rule lost.

use crate::config::PipelineConfig;
use crate::matching::{NameMatch, NameMatcher};
use crate::report::{DefectKind, QualityReport};
use crate::workbook::{cell_text, find_column, header_strings};
use anyhow::Result;
use calamine::Data;
use std::collections::BTreeMap;

const TABLE: &str = "aspirational registry";

/// Cohort memberships of one district.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CohortFlags {
    pub aspirational: bool,
    pub high_priority: bool,
    pub lwe_affected: bool,
}

impl CohortFlags {
    pub fn as_pairs(&self) -> [(&'static str, bool); 3] {
        [
            ("Aspirational District Programme", self.aspirational),
            ("High Priority District", self.high_priority),
            ("LWE-affected", self.lwe_affected),
        ]
    }
}

#[derive(Debug, Default)]
pub struct AspirationalRegistry {
    /// (state, district) -> cohort flags, keyed by survey spellings
    /// where reconciliation succeeded.
    pub entries: BTreeMap<(String, String), CohortFlags>,
}

impl AspirationalRegistry {
    pub fn flags(&self, state: &str, district: &str) -> Option<&CohortFlags> {
        self.entries
            .get(&(state.to_string(), district.to_string()))
    }
}

// ============================================================================
// Hand-verified correction tables
// ============================================================================

/// Registry state spellings that differ from the survey vocabulary.
const STATE_FIXES: &[(&str, &str)] = &[
    ("Andaman & Nicobar", "Andaman & Nicobar Islands"),
    ("DNH", "Dadra & Nagar Haveli"),
    ("Maharastra", "Maharashtra"),
    ("NCT of Delhi", "Delhi"),
];

/// (state, registry district) -> survey district.
const DISTRICT_FIXES: &[((&str, &str), &str)] = &[
    (("Uttar Pradesh", "Shrawasti"), "Shravasti"),
    (("Maharashtra", "Ahmadnagar"), "Ahmednagar"),
    (("Karnataka", "Chikballapura"), "Chikkaballapura"),
    (("Chhattisgarh", "Dakshin Bastar Dantewada"), "Dantewada"),
    (("Odisha", "Anugul"), "Angul"),
];

/// Flags restored after keep-first duplicate resolution, verified
/// against the programme notifications. `None` leaves a flag as the
/// kept row had it.
const FLAG_PATCHES: &[((&str, &str), Option<bool>, Option<bool>, Option<bool>)] = &[
    (("Chhattisgarh", "Dantewada"), None, None, Some(true)),
    (("Jharkhand", "West Singhbhum"), None, Some(true), None),
];

fn fixed_state(raw: &str) -> String {
    for (from, to) in STATE_FIXES {
        if raw == *from {
            return (*to).to_string();
        }
    }
    raw.to_string()
}

fn fixed_district(state: &str, raw: &str) -> String {
    for ((s, from), to) in DISTRICT_FIXES {
        if state == *s && raw == *from {
            return (*to).to_string();
        }
    }
    raw.to_string()
}

// ============================================================================
// Loader
// ============================================================================

/// `survey_districts` is the (state -> districts) vocabulary from the
/// district survey; registry names are reconciled against it so flags
/// can be joined by survey spellings.
pub fn load_aspirational_registry(
    rows: &[Vec<Data>],
    survey_districts: &BTreeMap<String, Vec<String>>,
    cfg: &PipelineConfig,
    report: &mut QualityReport,
) -> Result<AspirationalRegistry> {
    if rows.is_empty() {
        anyhow::bail!("AMBIGUITY: aspirational registry workbook is empty");
    }
    let headers = header_strings(&rows[0]);
    let col = |candidates: &[&str]| -> Result<usize> {
        find_column(&headers, candidates).ok_or_else(|| {
            anyhow::anyhow!(
                "AMBIGUITY: aspirational registry is missing a '{}' column",
                candidates[0]
            )
        })
    };
    let state_col = col(&["State"])?;
    let district_col = col(&["District"])?;
    let aspirational_col = col(&["Aspirational District Programme", "Aspirational"])?;
    let high_priority_col = col(&["High Priority District", "High Priority"])?;
    let lwe_col = col(&["LWE-affected", "LWE"])?;

    let survey_states: Vec<String> = survey_districts.keys().cloned().collect();
    let state_matcher = NameMatcher::new(cfg.state_cutoff);
    let district_matcher = NameMatcher::new(cfg.district_cutoff);

    let mut entries: BTreeMap<(String, String), CohortFlags> = BTreeMap::new();
    for row in rows.iter().skip(1) {
        let Some(state_raw) = cell_text(row, state_col) else {
            continue;
        };
        let Some(district_raw) = cell_text(row, district_col) else {
            continue;
        };
        let flags = CohortFlags {
            aspirational: cell_text(row, aspirational_col).is_some(),
            high_priority: cell_text(row, high_priority_col).is_some(),
            lwe_affected: cell_text(row, lwe_col).is_some(),
        };

        // Manual fixes first, fuzzy fallback against the survey
        // vocabulary for the rest.
        let state_fixed = fixed_state(&state_raw);
        let state = if survey_states.iter().any(|s| s == &state_fixed) {
            state_fixed
        } else {
            match state_matcher.resolve(&state_fixed, &survey_states) {
                NameMatch::Matched(name) => name,
                NameMatch::Unmatched => {
                    report.record(
                        TABLE,
                        DefectKind::Unmatched,
                        format!("state '{}' absent from survey vocabulary", state_raw),
                    );
                    state_fixed
                }
            }
        };

        let district_fixed = fixed_district(&state, &district_raw);
        let empty = Vec::new();
        let vocabulary = survey_districts.get(&state).unwrap_or(&empty);
        let district = if vocabulary.iter().any(|d| d == &district_fixed) {
            district_fixed
        } else {
            match district_matcher.resolve(&district_fixed, vocabulary) {
                NameMatch::Matched(name) => name,
                NameMatch::Unmatched => {
                    report.record(
                        TABLE,
                        DefectKind::Unmatched,
                        format!(
                            "district '{}' ({}) absent from survey vocabulary",
                            district_raw, state
                        ),
                    );
                    district_fixed
                }
            }
        };

        // keep-first; the registry is known to repeat a few districts
        let key = (state, district);
        if entries.contains_key(&key) {
            report.record(
                TABLE,
                DefectKind::Duplicate,
                format!("{} / {}", key.0, key.1),
            );
            continue;
        }
        entries.insert(key, flags);
    }

    // Restore flags lost to keep-first resolution.
    for ((state, district), aspirational, high_priority, lwe) in FLAG_PATCHES {
        if let Some(flags) = entries.get_mut(&((*state).to_string(), (*district).to_string())) {
            if let Some(v) = aspirational {
                flags.aspirational = *v;
            }
            if let Some(v) = high_priority {
                flags.high_priority = *v;
            }
            if let Some(v) = lwe {
                flags.lwe_affected = *v;
            }
        }
    }

    Ok(AspirationalRegistry { entries })
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

    fn sheet(data_rows: Vec<Vec<Data>>) -> Vec<Vec<Data>> {
        let mut rows = vec![vec![
            s("State"),
            s("District"),
            s("Aspirational District Programme"),
            s("High Priority District"),
            s("LWE-affected"),
        ]];
        rows.extend(data_rows);
        rows
    }

    fn row(state: &str, district: &str, adp: &str, hpd: &str, lwe: &str) -> Vec<Data> {
        let mark = |text: &str| {
            if text.is_empty() {
                Data::Empty
            } else {
                s(text)
            }
        };
        vec![s(state), s(district), mark(adp), mark(hpd), mark(lwe)]
    }

    fn vocab(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(state, districts)| {
                (
                    state.to_string(),
                    districts.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_flags_from_column_presence() {
        let rows = sheet(vec![row("Kerala", "Wayanad", "Yes", "", "Yes")]);
        let vocab = vocab(&[("Kerala", &["Wayanad"])]);
        let mut report = QualityReport::new();
        let registry =
            load_aspirational_registry(&rows, &vocab, &PipelineConfig::default(), &mut report)
                .unwrap();
        let flags = registry.flags("Kerala", "Wayanad").unwrap();
        assert!(flags.aspirational);
        assert!(!flags.high_priority);
        assert!(flags.lwe_affected);
    }

    #[test]
    fn test_state_and_district_fixes_applied() {
        let rows = sheet(vec![row("Maharastra", "Ahmadnagar", "Yes", "", "")]);
        let vocab = vocab(&[("Maharashtra", &["Ahmednagar", "Pune"])]);
        let mut report = QualityReport::new();
        let registry =
            load_aspirational_registry(&rows, &vocab, &PipelineConfig::default(), &mut report)
                .unwrap();
        assert!(registry.flags("Maharashtra", "Ahmednagar").is_some());
        assert_eq!(report.count(TABLE, DefectKind::Unmatched), 0);
    }

    #[test]
    fn test_fuzzy_fallback_for_unlisted_spelling() {
        let rows = sheet(vec![row("Chattisgarh", "Korba", "Yes", "", "Yes")]);
        let vocab = vocab(&[("Chhattisgarh", &["Korba", "Raipur"])]);
        let mut report = QualityReport::new();
        let registry =
            load_aspirational_registry(&rows, &vocab, &PipelineConfig::default(), &mut report)
                .unwrap();
        assert!(registry.flags("Chhattisgarh", "Korba").is_some());
    }

    #[test]
    fn test_unmatched_kept_under_raw_name_and_reported() {
        let rows = sheet(vec![row("Atlantis", "Poseidonia", "Yes", "", "")]);
        let vocab = vocab(&[("Kerala", &["Wayanad"])]);
        let cfg = PipelineConfig {
            state_cutoff: 0.95,
            district_cutoff: 0.95,
            ..PipelineConfig::default()
        };
        let mut report = QualityReport::new();
        let registry = load_aspirational_registry(&rows, &vocab, &cfg, &mut report).unwrap();
        assert!(registry.flags("Atlantis", "Poseidonia").is_some());
        assert_eq!(report.count(TABLE, DefectKind::Unmatched), 2);
    }

    #[test]
    fn test_duplicate_keys_keep_first() {
        let rows = sheet(vec![
            row("Kerala", "Wayanad", "Yes", "", ""),
            row("Kerala", "Wayanad", "", "Yes", "Yes"),
        ]);
        let vocab = vocab(&[("Kerala", &["Wayanad"])]);
        let mut report = QualityReport::new();
        let registry =
            load_aspirational_registry(&rows, &vocab, &PipelineConfig::default(), &mut report)
                .unwrap();
        assert_eq!(registry.entries.len(), 1);
        let flags = registry.flags("Kerala", "Wayanad").unwrap();
        // first row wins entirely
        assert!(flags.aspirational);
        assert!(!flags.high_priority);
        assert!(!flags.lwe_affected);
        assert_eq!(report.count(TABLE, DefectKind::Duplicate), 1);
    }

    #[test]
    fn test_flag_patch_overrides_kept_row() {
        let rows = sheet(vec![
            row("Chhattisgarh", "Dantewada", "Yes", "", ""),
            row("Chhattisgarh", "Dantewada", "", "", "Yes"),
        ]);
        let vocab = vocab(&[("Chhattisgarh", &["Dantewada"])]);
        let mut report = QualityReport::new();
        let registry =
            load_aspirational_registry(&rows, &vocab, &PipelineConfig::default(), &mut report)
                .unwrap();
        let flags = registry.flags("Chhattisgarh", "Dantewada").unwrap();
        assert!(flags.aspirational);
        // lost to keep-first, restored by the patch table
        assert!(flags.lwe_affected);
    }
}
