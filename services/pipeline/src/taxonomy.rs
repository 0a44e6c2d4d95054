//! Indicator taxonomy matcher
//!
//! The district workbook groups indicators into "domains"; the state
//! workbooks group them into "indicator types". The two grouping systems
//! were authored independently, so the correspondence is a curated table
//! keyed by domain name, with per-indicator fuzzy matching inside each
//! domain/type pair. Scatter and map views use the output to fetch the
//! comparable state aggregate for a district indicator.

use crate::config::PipelineConfig;
use crate::district::DistrictSurvey;
use crate::matching::{NameMatch, NameMatcher};
use crate::report::{DefectKind, QualityReport};
use crate::state::StateSurvey;
use anyhow::Result;

const TABLE: &str = "indicator taxonomy";

/// One district indicator with its matched state counterpart, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorCorrespondence {
    pub domain: String,
    pub indicator_type: String,
    pub district_indicator: String,
    pub state_indicator: Option<String>,
}

// ============================================================================
// Curated correspondence (keyed by domain name, asserted complete at load)
// ============================================================================

/// District domain -> state indicator type. The district side genders
/// its adult-health domains as Women/Men; the state side folds the
/// reported gender as Female/Male.
const DOMAIN_TYPE_MAP: &[(&str, &str)] = &[
    (
        "Population and Household Profile",
        "Population and Household Profile",
    ),
    (
        "Characteristics of Adults (age 15-49 years)",
        "Characteristics of Adults (age 15-49 years)",
    ),
    ("Marriage and Fertility", "Marriage and Fertility"),
    (
        "Current Use of Family Planning Methods (currently married women age 15–49 years)",
        "Current Use of Family Planning Methods (currently married women age 15–49 years)",
    ),
    (
        "Unmet Need for Family Planning (currently married women age 15–49 years)",
        "Unmet Need for Family Planning (currently married women age 15–49 years)",
    ),
    (
        "Quality of Family Planning Services",
        "Quality of Family Planning Services",
    ),
    (
        "Maternity Care (for last birth in the 5 years before the survey)",
        "Maternity Care (for last birth in the 5 years before the survey)",
    ),
    (
        "Delivery Care (for births in the 5 years before the survey)",
        "Delivery Care (for births in the 5 years before the survey)",
    ),
    (
        "Child Vaccinations and Vitamin A Supplementation",
        "Child Vaccinations and Vitamin A Supplementation",
    ),
    (
        "Treatment of Childhood Diseases (children under age 5 years)",
        "Treatment of Childhood Diseases (children under age 5 years)",
    ),
    (
        "Child Feeding Practices and Nutritional Status of Children",
        "Child Feeding Practices and Nutritional Status of Children",
    ),
    (
        "Nutritional Status of Adults (age 15-49 years)",
        "Nutritional Status of Adults (age 15-49 years)",
    ),
    (
        "Anaemia among Children and Adults",
        "Anaemia among Children and Adults",
    ),
    (
        "Blood Sugar Level among Adults (age 15-49 years) - Women",
        "Blood Sugar Level among Adults (age 15-49 years) - Female",
    ),
    (
        "Blood Sugar Level among Adults (age 15-49 years) - Men",
        "Blood Sugar Level among Adults (age 15-49 years) - Male",
    ),
    (
        "Hypertension among Adults (age 15 years and above) - Women",
        "Hypertension among Adults (age 15 years and above) - Female",
    ),
    (
        "Hypertension among Adults (age 15 years and above) - Men",
        "Hypertension among Adults (age 15 years and above) - Male",
    ),
    (
        "Screening for Cancer among Adults (age 30-49 years) - Women",
        "Screening for Cancer among Adults (age 30-49 years) - Female",
    ),
    (
        "Tobacco Use and Alcohol Consumption among Adults (age 15 years and above)",
        "Tobacco Use and Alcohol Consumption among Adults (age 15 years and above)",
    ),
];

/// District indicators verified to have no state counterpart; fuzzy
/// matching would otherwise latch onto a near-neighbour.
const FORCED_UNMATCHED: &[&str] = &[
    "Households surveyed",
    "49. Children age 12-23 months fully vaccinated based on information from either vaccination card or mother's recall11 (%)",
    "58. Children age 9-35 months who received a vitamin A dose in the last 6 months (%)",
];

/// District indicators whose correct counterpart fuzzy matching cannot
/// find; verified by inspection.
const FORCED_TARGETS: &[(&str, &str)] = &[
    (
        "88. Blood sugar level - high or very high (>140 mg/dl) or taking medicine to control blood sugar level23 (%)",
        "Blood sugar level - high (>140 mg/dl) (%) - Female",
    ),
    (
        "91. Blood sugar level - high or very high (>140 mg/dl) or taking medicine to control blood sugar level23 (%)",
        "Blood sugar level - high (>140 mg/dl) (%) - Male",
    ),
    (
        "101. Women age 15 years and above who use any kind of tobacco (%)",
        "Women who use any kind of tobacco (%)",
    ),
];

fn mapped_type(domain: &str) -> Option<&'static str> {
    DOMAIN_TYPE_MAP
        .iter()
        .find(|(d, _)| *d == domain)
        .map(|(_, t)| *t)
}

// ============================================================================
// Matcher
// ============================================================================

pub fn match_indicator_taxonomies(
    district: &DistrictSurvey,
    state: &StateSurvey,
    cfg: &PipelineConfig,
    report: &mut QualityReport,
) -> Result<Vec<IndicatorCorrespondence>> {
    // Every district domain must be in the curated table; a new domain
    // in the source data means the table needs a verified entry, not a
    // guess.
    for domain in district.domains() {
        if mapped_type(&domain).is_none() {
            anyhow::bail!(
                "AMBIGUITY: district domain '{}' has no curated indicator-type counterpart",
                domain
            );
        }
    }
    // Stale table entries are survivable but worth surfacing.
    let domains = district.domains();
    for (domain, _) in DOMAIN_TYPE_MAP {
        if !domains.iter().any(|d| d == domain) {
            report.record(
                TABLE,
                DefectKind::Unmatched,
                format!("curated domain '{}' absent from district data", domain),
            );
        }
    }

    let matcher = NameMatcher::new(cfg.indicator_cutoff);
    let all_state_indicators: Vec<String> = state
        .taxonomy
        .iter()
        .flat_map(|(_, inds)| inds.iter().cloned())
        .collect();

    let mut out = Vec::new();
    for domain in &domains {
        let indicator_type = match mapped_type(domain) {
            Some(t) => t,
            None => continue, // unreachable after the assertion above
        };
        let vocabulary: Vec<String> = state.indicators_of_type(indicator_type).to_vec();
        if vocabulary.is_empty() {
            report.record(
                TABLE,
                DefectKind::Unmatched,
                format!(
                    "indicator type '{}' (for domain '{}') has no state indicators",
                    indicator_type, domain
                ),
            );
        }

        for district_indicator in district.indicators_in_domain(domain) {
            let fuzzy = match matcher.resolve(district_indicator, &vocabulary) {
                NameMatch::Matched(name) => Some(name),
                NameMatch::Unmatched => None,
            };

            // Manual adjustments take precedence over the fuzzy result.
            let state_indicator = if FORCED_UNMATCHED.contains(&district_indicator) {
                None
            } else if let Some((_, target)) = FORCED_TARGETS
                .iter()
                .find(|(d, _)| *d == district_indicator)
            {
                if !all_state_indicators.iter().any(|i| i == target) {
                    report.record(
                        TABLE,
                        DefectKind::Unmatched,
                        format!(
                            "forced target '{}' absent from state vocabulary",
                            target
                        ),
                    );
                }
                Some((*target).to_string())
            } else {
                if fuzzy.is_none() {
                    report.record(
                        TABLE,
                        DefectKind::Unmatched,
                        format!("'{}' ({}) has no state counterpart", district_indicator, domain),
                    );
                }
                fuzzy
            };

            out.push(IndicatorCorrespondence {
                domain: domain.clone(),
                indicator_type: indicator_type.to_string(),
                district_indicator: district_indicator.to_string(),
                state_indicator,
            });
        }
    }
    Ok(out)
}

// ============================================================================
// TESTS
// ============================================================================
