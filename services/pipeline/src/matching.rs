//! Fuzzy name matching across independently authored naming systems
//!
//! Every reconciliation step (state vs. state, district vs. district,
//! indicator vs. indicator) goes through the same contract: manual
//! overrides win unconditionally, otherwise the single best candidate at
//! or above the similarity cutoff, otherwise an explicit unmatched marker.

use std::collections::BTreeMap;
use strsim::jaro_winkler;

/// Result of resolving one raw name against a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameMatch {
    Matched(String),
    /// No override and no candidate at or above the cutoff. Never
    /// silently merged; callers report this and downstream joins against
    /// the raw name simply yield no row.
    Unmatched,
}

impl NameMatch {
    pub fn matched(&self) -> Option<&str> {
        match self {
            NameMatch::Matched(name) => Some(name),
            NameMatch::Unmatched => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NameMatcher {
    cutoff: f64,
    overrides: BTreeMap<String, String>,
}

impl NameMatcher {
    pub fn new(cutoff: f64) -> Self {
        NameMatcher {
            cutoff,
            overrides: BTreeMap::new(),
        }
    }

    /// Attach a manual override table: raw name -> canonical target.
    /// Overrides bypass similarity computation entirely.
    pub fn with_overrides(cutoff: f64, table: &[(&str, &str)]) -> Self {
        NameMatcher {
            cutoff,
            overrides: table
                .iter()
                .map(|(raw, target)| (raw.trim().to_string(), target.to_string()))
                .collect(),
        }
    }

    /// Resolve `raw` against `vocabulary`. Comparison is case-insensitive;
    /// ties keep the first candidate in vocabulary order (strictly greater
    /// similarity is required to displace an earlier candidate), so the
    /// result is deterministic for a fixed vocabulary.
    pub fn resolve(&self, raw: &str, vocabulary: &[String]) -> NameMatch {
        let raw = raw.trim();
        if let Some(target) = self.overrides.get(raw) {
            return NameMatch::Matched(target.clone());
        }
        match self.best_candidate(raw, vocabulary) {
            Some(idx) => NameMatch::Matched(vocabulary[idx].clone()),
            None => NameMatch::Unmatched,
        }
    }

    /// Override targets that reference names absent from the live
    /// vocabulary. Detected at load time so stale correction tables are
    /// surfaced instead of silently producing dead keys.
    pub fn stale_overrides(&self, vocabulary: &[String]) -> Vec<(String, String)> {
        self.overrides
            .iter()
            .filter(|(_, target)| !vocabulary.iter().any(|v| v == *target))
            .map(|(raw, target)| (raw.clone(), target.clone()))
            .collect()
    }

    fn best_candidate(&self, raw: &str, vocabulary: &[String]) -> Option<usize> {
        let needle = raw.to_lowercase();
        let mut best: Option<(usize, f64)> = None;
        for (idx, candidate) in vocabulary.iter().enumerate() {
            let score = jaro_winkler(&needle, &candidate.trim().to_lowercase());
            if score >= self.cutoff && best.map_or(true, |(_, s)| score > s) {
                best = Some((idx, score));
            }
        }
        best.map(|(idx, _)| idx)
    }
}

// ============================================================================
// TESTS
// ============================================================================
