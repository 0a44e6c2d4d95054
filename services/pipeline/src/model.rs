//! Normalized data model
//!
//! The aggregate output of the pipeline: harmonized tables plus the
//! derived indexes every chart reads. Built once at startup (or on
//! refresh) by `build_data_model`; read-only afterwards, so concurrent
//! readers need no locking. A refresh builds a fresh instance and swaps
//! it whole.

use crate::aspirational::{load_aspirational_registry, AspirationalRegistry, CohortFlags};
use crate::config::{
    PipelineConfig, ASPIRATIONAL_REGISTRY, DISTRICT_WORKBOOK, EQUITY_WORKBOOK, GEO_BOUNDARY_FILE,
    INDIA_FACTSHEET, STATES_WORKBOOK,
};
use crate::district::{load_district_survey, DistrictSurvey, SurveyRound};
use crate::equity::{load_equity, Disaggregation, EquityData};
use crate::geo::{FeatureCollection, GeoBoundarySource};
use crate::report::{DefectKind, QualityReport};
use crate::state::{Gender, StateSurvey};
use crate::taxonomy::{match_indicator_taxonomies, IndicatorCorrespondence};
use crate::workbook::{read_all_sheets, read_sheet_rows};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};

/// Indicators where a higher value is worse; the map layer inverts the
/// colour scale for these.
const INVERSE_SCALE_KEYWORDS: &[&str] = &[
    "mortality",
    "anaemia",
    "anaemic",
    "stunted",
    "wasted",
    "underweight",
    "overweight",
    "obese",
    "blood sugar level - high",
    "hypertension",
    "elevated blood pressure",
    "tobacco",
    "alcohol",
    "unmet need",
    "diarrhoea",
    "fever",
    "symptoms of acute respiratory infection",
];

#[derive(Debug, Clone, PartialEq)]
pub struct DistrictValue {
    pub state: String,
    pub district: String,
    pub value: Option<f64>,
    pub geo_label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateValues {
    pub urban: Option<f64>,
    pub rural: Option<f64>,
    pub total: Option<f64>,
}

#[derive(Debug)]
pub struct NormalizedDataModel {
    pub geo: GeoBoundarySource,
    pub district: DistrictSurvey,
    pub state: StateSurvey,
    pub taxonomy: Vec<IndicatorCorrespondence>,
    pub equity: EquityData,
    pub aspirational: AspirationalRegistry,
    /// District indicators rendered with an inverted colour scale.
    pub inverse_scale: BTreeSet<String>,
    /// Everything flagged while loading, pre-remediation.
    pub quality: QualityReport,
    /// Feature subsets keyed by data state name, precomputed for map
    /// redraws.
    state_features: BTreeMap<String, FeatureCollection>,
}

// ============================================================================
// Construction
// ============================================================================

/// Run the whole pipeline against the source files in
/// `cfg.data_dir`. Fail-fast: any structural mismatch aborts, no
/// partial model is returned.
pub fn build_data_model(cfg: &PipelineConfig) -> Result<NormalizedDataModel> {
    let mut report = QualityReport::new();

    let geo = GeoBoundarySource::load(&cfg.source_path(GEO_BOUNDARY_FILE), &mut report)?;

    let district_rows = read_sheet_rows(&cfg.source_path(DISTRICT_WORKBOOK), 0)?;
    let district = load_district_survey(&district_rows, &geo, cfg, &mut report)?;

    let national_rows = read_sheet_rows(&cfg.source_path(INDIA_FACTSHEET), 0)?;
    let national =
        crate::state::load_national_factsheet(&national_rows, cfg.synthesize_nfhs4, &mut report)?;
    let states_rows = read_sheet_rows(&cfg.source_path(STATES_WORKBOOK), 0)?;
    let states = crate::state::load_states_workbook(&states_rows, &mut report)?;
    let state = crate::state::unify_state_surveys(states, national, cfg, &mut report)?;

    let taxonomy = match_indicator_taxonomies(&district, &state, cfg, &mut report)?;

    let equity_sheets = read_all_sheets(&cfg.source_path(EQUITY_WORKBOOK))?;
    let equity = load_equity(&equity_sheets, cfg, &mut report)?;

    let survey_districts: BTreeMap<String, Vec<String>> = district
        .district_geo
        .iter()
        .map(|(state, keys)| {
            (
                state.clone(),
                keys.iter().map(|k| k.district.clone()).collect(),
            )
        })
        .collect();
    let registry_rows = read_sheet_rows(&cfg.source_path(ASPIRATIONAL_REGISTRY), 0)?;
    let aspirational =
        load_aspirational_registry(&registry_rows, &survey_districts, cfg, &mut report)?;

    Ok(assemble(
        geo,
        district,
        state,
        taxonomy,
        equity,
        aspirational,
        report,
    ))
}

/// Precompute the derived indexes. Split from `build_data_model` so
/// tests can assemble a model from in-memory tables.
pub fn assemble(
    geo: GeoBoundarySource,
    district: DistrictSurvey,
    state: StateSurvey,
    taxonomy: Vec<IndicatorCorrespondence>,
    equity: EquityData,
    aspirational: AspirationalRegistry,
    mut report: QualityReport,
) -> NormalizedDataModel {
    // Per-state subsets are keyed by the DATA state name, the same
    // vocabulary the dropdowns and series queries speak; the resolved
    // geo state only selects which features go into the subset.
    let geo_states: BTreeSet<String> = geo.state_names().into_iter().collect();
    let mut state_features = BTreeMap::new();
    for (data_state, geo_state) in &district.state_geo {
        let Some(geo_state) = geo_state else {
            continue;
        };
        if geo_states.contains(geo_state) {
            state_features.insert(data_state.clone(), geo.features_for_state(geo_state));
        } else {
            // A matched geo state absent from the boundary file means a
            // stale override or a boundary revision; surface it.
            report.record(
                "model indexes",
                DefectKind::Unmatched,
                format!("'{}' resolved to unknown boundary state '{}'", data_state, geo_state),
            );
        }
    }

    let mut inverse_scale = BTreeSet::new();
    for indicator in &district.indicators {
        let lowered = indicator.to_lowercase();
        if INVERSE_SCALE_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            inverse_scale.insert(indicator.clone());
        }
    }

    NormalizedDataModel {
        geo,
        district,
        state,
        taxonomy,
        equity,
        aspirational,
        inverse_scale,
        quality: report,
        state_features,
    }
}

// ============================================================================
// Query surface
// ============================================================================

impl NormalizedDataModel {
    /// Dropdown vocabulary: All India plus every data state,
    /// case-insensitively sorted.
    pub fn state_options(&self) -> Vec<String> {
        let mut options: Vec<String> = self.district.states.clone();
        if !options.iter().any(|s| s == "All India") {
            options.push("All India".to_string());
        }
        for state in &self.state.states {
            if !options.iter().any(|s| s == state) {
                options.push(state.clone());
            }
        }
        options.sort_by_key(|s| s.to_lowercase());
        options
    }

    /// One row per district for a given indicator and round. `state`
    /// None (or All India) spans every state.
    pub fn district_series(
        &self,
        state: Option<&str>,
        indicator: &str,
        round: SurveyRound,
    ) -> Vec<DistrictValue> {
        self.district
            .records
            .iter()
            .filter(|r| r.indicator == indicator && r.round == round)
            .filter(|r| match state {
                None | Some("All India") => true,
                Some(s) => r.state == s,
            })
            .map(|r| DistrictValue {
                state: r.state.clone(),
                district: r.district.clone(),
                value: r.value,
                geo_label: r.geo_label.clone(),
            })
            .collect()
    }

    /// Urban/rural/total for one state indicator. The indicator name
    /// carries its gender suffix, so `gender` is an extra guard for
    /// callers that track it separately.
    pub fn state_series(
        &self,
        state: &str,
        indicator: &str,
        round: &str,
        gender: Option<Gender>,
    ) -> Option<StateValues> {
        self.state
            .records
            .iter()
            .find(|r| {
                r.state == state
                    && r.indicator == indicator
                    && r.round == round
                    && (gender.is_none() || r.gender == gender)
            })
            .map(|r| StateValues {
                urban: r.urban,
                rural: r.rural,
                total: r.total,
            })
    }

    /// Full boundary collection, or the precomputed per-state subset.
    pub fn geometry(&self, state: Option<&str>) -> Option<&FeatureCollection> {
        match state {
            None | Some("All India") => Some(&self.geo.collection),
            Some(s) => self.state_features.get(s),
        }
    }

    pub fn indicator_options(&self, domain: &str) -> Vec<&str> {
        self.district.indicators_in_domain(domain)
    }

    /// State counterpart of a district indicator, if the taxonomy
    /// matcher found (or was told) one.
    pub fn matched_state_indicator(
        &self,
        domain: &str,
        district_indicator: &str,
    ) -> Option<&str> {
        self.taxonomy
            .iter()
            .find(|c| c.domain == domain && c.district_indicator == district_indicator)
            .and_then(|c| c.state_indicator.as_deref())
    }

    /// Category -> value slice for one equity record, restricted to the
    /// requested disaggregation group. None when the record is absent or
    /// the group is not configured for the indicator.
    pub fn equity_series(
        &self,
        state: &str,
        indicator: &str,
        year: &str,
        disaggregation: Disaggregation,
    ) -> Option<BTreeMap<&'static str, Option<f64>>> {
        let config = self.equity.config_for(indicator)?;
        if !config.disaggregations.contains(&disaggregation) {
            return None;
        }
        let record = self
            .equity
            .records
            .iter()
            .find(|r| r.state == state && r.indicator == indicator && r.year == year)?;
        Some(
            disaggregation
                .categories()
                .iter()
                .map(|category| (*category, record.values.get(category).copied().flatten()))
                .collect(),
        )
    }

    pub fn aspirational_flags(&self, state: &str, district: &str) -> Option<&CohortFlags> {
        self.aspirational.flags(state, district)
    }

    pub fn uses_inverse_scale(&self, indicator: &str) -> bool {
        self.inverse_scale.contains(indicator)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::district::load_district_survey;
    use crate::equity::{EquityIndicatorConfig, EquityRecord, IngestionMode};
    use crate::geo::{Feature, Geometry, GEO_LABEL_PROPERTY};
    use crate::state::{unify_state_surveys, RawStateRow};
    use calamine::Data;
    use serde_json::Value;

    fn s(text: &str) -> Data {
        Data::String(text.into())
    }

    fn boundary(labels: &[&str]) -> GeoBoundarySource {
        let features = labels
            .iter()
            .map(|label| {
                let mut properties = serde_json::Map::new();
                properties.insert(GEO_LABEL_PROPERTY.into(), Value::String((*label).into()));
                Feature {
                    kind: "Feature".into(),
                    properties,
                    geometry: Geometry::Polygon(vec![vec![
                        vec![0.0, 0.0],
                        vec![1.0, 0.0],
                        vec![1.0, 1.0],
                        vec![0.0, 0.0],
                    ]]),
                }
            })
            .collect();
        let mut report = QualityReport::new();
        GeoBoundarySource::from_collection(
            FeatureCollection {
                kind: "FeatureCollection".into(),
                features,
            },
            &mut report,
        )
        .unwrap()
    }

    fn model() -> NormalizedDataModel {
        let geo = boundary(&["Kollam, Kerala", "Wayanad, Kerala", "Kamrup, Assam"]);

        let district_rows = vec![
            vec![
                Data::Empty,
                Data::Empty,
                Data::Empty,
                Data::Empty,
                s("Population and Household Profile: 1"),
                s("Anaemia among Children and Adults: 2"),
            ],
            vec![
                s("State"),
                s("Districts"),
                s("Survey round"),
                s("year"),
                s("6. Population living in households with electricity (%)"),
                s("75. All women age 15-49 years who are anaemic (%)"),
            ],
            vec![s("Kerala"), s("Kollam"), s("NFHS-5"), s("2020"), s("99.0"), s("31.0")],
            vec![s("Kerala"), s("Wayanad"), s("NFHS-5"), s("2020"), s("97.0"), s("29.0")],
            vec![s("Assam"), s("Kamrup"), s("NFHS-5"), s("2020"), s("92.0"), s("41.0")],
        ];
        let mut report = QualityReport::new();
        let cfg = PipelineConfig::default();
        let district = load_district_survey(&district_rows, &geo, &cfg, &mut report).unwrap();

        let raw = |state: &str, indicator: &str, round: &str, total: f64| RawStateRow {
            state: state.into(),
            indicator_type: "Population and Household Profile".into(),
            indicator: indicator.into(),
            gender: None,
            round: round.into(),
            year: None,
            urban: Data::Float(total),
            rural: Data::Float(total),
            total: Data::Float(total),
        };
        let state = unify_state_surveys(
            vec![
                raw("Kerala", "Population living in households with electricity (%)", "NFHS 5", 99.0),
                raw("India", "Population living in households with electricity (%)", "NFHS 5", 96.8),
            ],
            vec![],
            &cfg,
            &mut report,
        )
        .unwrap();

        let taxonomy = vec![IndicatorCorrespondence {
            domain: "Population and Household Profile".into(),
            indicator_type: "Population and Household Profile".into(),
            district_indicator: "6. Population living in households with electricity (%)".into(),
            state_indicator: Some("Population living in households with electricity (%)".into()),
        }];

        let equity = EquityData {
            configs: vec![EquityIndicatorConfig {
                indicator: "ANC 4+ visits".into(),
                sheet: "ANC".into(),
                mode: IngestionMode::Single,
                indicator_type: "Maternal Health".into(),
                default_selected: true,
                disaggregations: vec![Disaggregation::Wealth],
                color: "#636efa",
            }],
            records: vec![EquityRecord {
                state: "Kerala".into(),
                indicator: "ANC 4+ visits".into(),
                year: "NFHS-5 (2019-21)".into(),
                values: [
                    ("Total", Some(80.0)),
                    ("Poorest", Some(71.0)),
                    ("Richest", Some(92.0)),
                ]
                .into_iter()
                .collect(),
            }],
        };

        let mut aspirational = AspirationalRegistry::default();
        aspirational.entries.insert(
            ("Kerala".into(), "Wayanad".into()),
            CohortFlags {
                aspirational: true,
                high_priority: false,
                lwe_affected: false,
            },
        );

        assemble(geo, district, state, taxonomy, equity, aspirational, report)
    }

    // -------------------------------------------------------------------------
    // QUERY TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_district_series_filters_by_state() {
        let model = model();
        let indicator = "6. Population living in households with electricity (%)";
        let kerala = model.district_series(Some("Kerala"), indicator, SurveyRound::Nfhs5);
        assert_eq!(kerala.len(), 2);
        assert!(kerala.iter().all(|r| r.state == "Kerala"));
        assert!(kerala.iter().all(|r| r.geo_label.is_some()));

        let all = model.district_series(Some("All India"), indicator, SurveyRound::Nfhs5);
        assert_eq!(all.len(), 3);
        assert_eq!(all, model.district_series(None, indicator, SurveyRound::Nfhs5));
    }

    #[test]
    fn test_state_series_lookup() {
        let model = model();
        let values = model
            .state_series(
                "Kerala",
                "Population living in households with electricity (%)",
                "NFHS 5",
                None,
            )
            .unwrap();
        assert_eq!(values.total, Some(99.0));
        assert!(model
            .state_series("Kerala", "No such indicator", "NFHS 5", None)
            .is_none());
    }

    #[test]
    fn test_geometry_subsets_precomputed() {
        let model = model();
        assert_eq!(model.geometry(None).unwrap().features.len(), 3);
        assert_eq!(model.geometry(Some("All India")).unwrap().features.len(), 3);
        assert_eq!(model.geometry(Some("Kerala")).unwrap().features.len(), 2);
        assert!(model.geometry(Some("Atlantis")).is_none());
    }

    #[test]
    fn test_geometry_keyed_by_data_state_name() {
        // The workbook says "DNH"; the boundary file says "Dadra and
        // Nagar Haveli". The map endpoint receives the data name.
        let geo = boundary(&[
            "Dadra & Nagar Haveli, Dadra and Nagar Haveli",
            "Kollam, Kerala",
        ]);
        let district_rows = vec![
            vec![
                Data::Empty,
                Data::Empty,
                Data::Empty,
                Data::Empty,
                s("Population and Household Profile: 1"),
            ],
            vec![
                s("State"),
                s("Districts"),
                s("Survey round"),
                s("year"),
                s("6. Population living in households with electricity (%)"),
            ],
            vec![s("DNH"), s("D & DNH"), s("NFHS-5"), s("2020"), s("95.0")],
            vec![s("Kerala"), s("Kollam"), s("NFHS-5"), s("2020"), s("99.0")],
        ];
        let mut report = QualityReport::new();
        let cfg = PipelineConfig::default();
        let district = load_district_survey(&district_rows, &geo, &cfg, &mut report).unwrap();
        assert_eq!(
            district.state_geo.get("DNH"),
            Some(&Some("Dadra and Nagar Haveli".to_string()))
        );

        let state = unify_state_surveys(vec![], vec![], &cfg, &mut report).unwrap();
        let model = assemble(
            geo,
            district,
            state,
            vec![],
            EquityData {
                configs: vec![],
                records: vec![],
            },
            AspirationalRegistry::default(),
            report,
        );

        assert!(model.state_options().contains(&"DNH".to_string()));
        let features = model.geometry(Some("DNH")).unwrap();
        assert_eq!(features.features.len(), 1);
        assert_eq!(model.geometry(Some("Kerala")).unwrap().features.len(), 1);
    }

    #[test]
    fn test_indicator_matching_queries() {
        let model = model();
        assert_eq!(
            model.indicator_options("Population and Household Profile"),
            vec!["6. Population living in households with electricity (%)"]
        );
        assert_eq!(
            model.matched_state_indicator(
                "Population and Household Profile",
                "6. Population living in households with electricity (%)"
            ),
            Some("Population living in households with electricity (%)")
        );
        assert_eq!(
            model.matched_state_indicator("Population and Household Profile", "unknown"),
            None
        );
    }

    #[test]
    fn test_equity_series_respects_configured_groups() {
        let model = model();
        let slice = model
            .equity_series(
                "Kerala",
                "ANC 4+ visits",
                "NFHS-5 (2019-21)",
                Disaggregation::Wealth,
            )
            .unwrap();
        assert_eq!(slice.get("Poorest"), Some(&Some(71.0)));
        assert_eq!(slice.get("Richest"), Some(&Some(92.0)));
        // configured but absent category comes back missing, not absent
        assert_eq!(slice.get("Middle"), Some(&None));

        // Residence was not configured for this indicator
        assert!(model
            .equity_series(
                "Kerala",
                "ANC 4+ visits",
                "NFHS-5 (2019-21)",
                Disaggregation::Residence
            )
            .is_none());
    }

    #[test]
    fn test_aspirational_flags_query() {
        let model = model();
        assert!(model.aspirational_flags("Kerala", "Wayanad").unwrap().aspirational);
        assert!(model.aspirational_flags("Kerala", "Kollam").is_none());
    }

    // -------------------------------------------------------------------------
    // DERIVED INDEX TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_inverse_scale_classification() {
        let model = model();
        assert!(model.uses_inverse_scale("75. All women age 15-49 years who are anaemic (%)"));
        assert!(!model.uses_inverse_scale(
            "6. Population living in households with electricity (%)"
        ));
    }

    #[test]
    fn test_state_options_include_all_india() {
        let model = model();
        let options = model.state_options();
        assert!(options.contains(&"All India".to_string()));
        // case-insensitive sort
        let mut sorted = options.clone();
        sorted.sort_by_key(|s| s.to_lowercase());
        assert_eq!(options, sorted);
    }
}
