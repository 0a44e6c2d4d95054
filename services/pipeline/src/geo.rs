//! District boundary source (GeoJSON)
//!
//! Parses the 707-district boundary collection, enforces the ring
//! orientation the map layer requires (exterior rings clockwise, holes
//! counter-clockwise - NOT the RFC 7946 convention), and extracts the
//! canonical (district, state) pairs used as join keys everywhere else.

use crate::report::{DefectKind, QualityReport};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Feature property that carries the composite "District,State" label.
pub const GEO_LABEL_PROPERTY: &str = "707_dist_7";

pub type Ring = Vec<Vec<f64>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: serde_json::Map<String, Value>,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

/// Canonical district identity extracted from one boundary feature.
/// Immutable after load; `label` is the raw property value and the join
/// key the map layer filters on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoDistrict {
    pub district: String,
    pub state: String,
    pub label: String,
    pub feature: usize,
}

#[derive(Debug)]
pub struct GeoBoundarySource {
    pub collection: FeatureCollection,
    pub districts: Vec<GeoDistrict>,
}

/// Signed area of a linear ring (shoelace). Positive = counter-clockwise.
pub fn signed_area(ring: &Ring) -> f64 {
    let mut sum = 0.0;
    for window in ring.windows(2) {
        let (a, b) = (&window[0], &window[1]);
        if a.len() >= 2 && b.len() >= 2 {
            sum += a[0] * b[1] - b[0] * a[1];
        }
    }
    sum / 2.0
}

/// Force exterior rings clockwise and interior rings counter-clockwise.
fn rewind_polygon(rings: &mut [Ring]) {
    for (idx, ring) in rings.iter_mut().enumerate() {
        let area = signed_area(ring);
        let exterior = idx == 0;
        if (exterior && area > 0.0) || (!exterior && area < 0.0) {
            ring.reverse();
        }
    }
}

fn rewind_geometry(geometry: &mut Geometry) {
    match geometry {
        Geometry::Polygon(rings) => rewind_polygon(rings),
        Geometry::MultiPolygon(polygons) => {
            for rings in polygons {
                rewind_polygon(rings);
            }
        }
    }
}

impl GeoBoundarySource {
    pub fn load(path: &Path, report: &mut QualityReport) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read boundary file {}", path.display()))?;
        let collection: FeatureCollection =
            serde_json::from_str(&raw).context("Failed to parse boundary GeoJSON")?;
        Self::from_collection(collection, report)
    }

    pub fn from_collection(
        mut collection: FeatureCollection,
        report: &mut QualityReport,
    ) -> Result<Self> {
        let mut districts = Vec::new();
        for (idx, feature) in collection.features.iter_mut().enumerate() {
            rewind_geometry(&mut feature.geometry);

            let label = match feature.properties.get(GEO_LABEL_PROPERTY) {
                Some(Value::String(s)) => s.clone(),
                _ => {
                    report.record(
                        "geo boundaries",
                        DefectKind::Unmatched,
                        format!("feature {}: missing property {}", idx, GEO_LABEL_PROPERTY),
                    );
                    continue;
                }
            };
            // Composite label is "District,State"; a label without the
            // state part stays in the collection but never joins.
            let Some((district, state)) = label.split_once(',') else {
                report.record(
                    "geo boundaries",
                    DefectKind::Unmatched,
                    format!("feature {}: label '{}' has no state part", idx, label),
                );
                continue;
            };
            districts.push(GeoDistrict {
                district: district.trim().to_string(),
                state: state.trim().to_string(),
                label,
                feature: idx,
            });
        }
        Ok(GeoBoundarySource {
            collection,
            districts,
        })
    }

    /// Unique geo state names, first-seen order.
    pub fn state_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for district in &self.districts {
            if !names.iter().any(|n| n == &district.state) {
                names.push(district.state.clone());
            }
        }
        names
    }

    pub fn districts_in_state(&self, state: &str) -> Vec<&GeoDistrict> {
        self.districts
            .iter()
            .filter(|d| d.state == state)
            .collect()
    }

    /// Feature subset for one geo state. Precomputed once per data state
    /// at model build so map redraws never rescan the full collection.
    pub fn features_for_state(&self, state: &str) -> FeatureCollection {
        let features = self
            .districts
            .iter()
            .filter(|d| d.state == state)
            .map(|d| self.collection.features[d.feature].clone())
            .collect();
        FeatureCollection {
            kind: "FeatureCollection".to_string(),
            features,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(label: &str, ring: Ring) -> Feature {
        let mut properties = serde_json::Map::new();
        properties.insert(GEO_LABEL_PROPERTY.into(), Value::String(label.into()));
        Feature {
            kind: "Feature".into(),
            properties,
            geometry: Geometry::Polygon(vec![ring]),
        }
    }

    fn ccw_square() -> Ring {
        vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 1.0],
            vec![0.0, 0.0],
        ]
    }

    fn collection(features: Vec<Feature>) -> FeatureCollection {
        FeatureCollection {
            kind: "FeatureCollection".into(),
            features,
        }
    }

    // -------------------------------------------------------------------------
    // WINDING TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_signed_area_orientation() {
        assert!(signed_area(&ccw_square()) > 0.0);
        let mut cw = ccw_square();
        cw.reverse();
        assert!(signed_area(&cw) < 0.0);
    }

    #[test]
    fn test_exterior_rings_rewound_clockwise() {
        let mut report = QualityReport::new();
        let source = GeoBoundarySource::from_collection(
            collection(vec![feature("Kollam, Kerala", ccw_square())]),
            &mut report,
        )
        .unwrap();
        for f in &source.collection.features {
            match &f.geometry {
                Geometry::Polygon(rings) => assert!(signed_area(&rings[0]) < 0.0),
                Geometry::MultiPolygon(_) => panic!("unexpected geometry"),
            }
        }
    }

    #[test]
    fn test_holes_rewound_counter_clockwise() {
        let mut cw_outer = ccw_square();
        cw_outer.reverse();
        let mut cw_hole = vec![
            vec![0.2, 0.2],
            vec![0.8, 0.2],
            vec![0.8, 0.8],
            vec![0.2, 0.8],
            vec![0.2, 0.2],
        ];
        cw_hole.reverse();
        let mut f = feature("Kollam, Kerala", cw_outer);
        if let Geometry::Polygon(rings) = &mut f.geometry {
            rings.push(cw_hole);
        }
        let mut report = QualityReport::new();
        let source =
            GeoBoundarySource::from_collection(collection(vec![f]), &mut report).unwrap();
        if let Geometry::Polygon(rings) = &source.collection.features[0].geometry {
            assert!(signed_area(&rings[0]) < 0.0, "exterior must stay clockwise");
            assert!(signed_area(&rings[1]) > 0.0, "hole must become counter-clockwise");
        } else {
            panic!("unexpected geometry");
        }
    }

    // -------------------------------------------------------------------------
    // LABEL EXTRACTION TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_district_state_pairs_extracted() {
        let mut report = QualityReport::new();
        let source = GeoBoundarySource::from_collection(
            collection(vec![
                feature("Kollam, Kerala", ccw_square()),
                feature("Thrissur, Kerala", ccw_square()),
                feature("Mon, Nagaland", ccw_square()),
            ]),
            &mut report,
        )
        .unwrap();
        assert_eq!(source.districts.len(), 3);
        assert_eq!(source.state_names(), vec!["Kerala", "Nagaland"]);
        assert_eq!(source.districts_in_state("Kerala").len(), 2);
        assert_eq!(source.districts[0].district, "Kollam");
        assert_eq!(source.districts[0].label, "Kollam, Kerala");
    }

    #[test]
    fn test_malformed_label_reported_not_joined() {
        let mut report = QualityReport::new();
        let source = GeoBoundarySource::from_collection(
            collection(vec![
                feature("NoStatePart", ccw_square()),
                feature("Kollam, Kerala", ccw_square()),
            ]),
            &mut report,
        )
        .unwrap();
        assert_eq!(source.districts.len(), 1);
        assert_eq!(source.collection.features.len(), 2);
        assert_eq!(report.count("geo boundaries", DefectKind::Unmatched), 1);
    }

    #[test]
    fn test_state_feature_filter() {
        let mut report = QualityReport::new();
        let source = GeoBoundarySource::from_collection(
            collection(vec![
                feature("Kollam, Kerala", ccw_square()),
                feature("Mon, Nagaland", ccw_square()),
            ]),
            &mut report,
        )
        .unwrap();
        let kerala = source.features_for_state("Kerala");
        assert_eq!(kerala.features.len(), 1);
        assert_eq!(
            kerala.features[0].properties.get(GEO_LABEL_PROPERTY),
            Some(&Value::String("Kollam, Kerala".into()))
        );
    }

    #[test]
    fn test_geojson_round_trip() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"707_dist_7": "Kollam, Kerala"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0,0.0],[1.0,0.0],[1.0,1.0],[0.0,1.0],[0.0,0.0]]]
                }
            }]
        }"#;
        let parsed: FeatureCollection = serde_json::from_str(json).unwrap();
        let mut report = QualityReport::new();
        let source = GeoBoundarySource::from_collection(parsed, &mut report).unwrap();
        let back = serde_json::to_value(&source.collection).unwrap();
        assert_eq!(back["features"][0]["geometry"]["type"], "Polygon");
    }
}
