//! Field and feature validation of converted layer artifacts.
//!
//! Conversion always targets GeoJSON, so validation can edit artifacts
//! in place with ordinary JSON tooling instead of going back through
//! the external toolchain. The validator makes exactly one pass over
//! the features, then rewrites the artifact:
//!
//! - features without usable geometry are dropped;
//! - fields that are never set, or set in less than 1% of features,
//!   are dropped;
//! - a string column whose values are consistently dates or numbers is
//!   retyped to its real type; conflicting observations keep the
//!   declared type;
//! - surviving fields are renamed to their cleaned, portable names;
//! - per field, a repeated-value flag is recorded.
//!
//! Centroid derivation is separate ([`append_centroids`]) because it
//! must run after pruning, on polygon layers only.

mod centroid;
mod infer;

pub use centroid::{append_centroids, CENTROID_FIELD};

use crate::layer::{clean_name, FieldSchema, FieldType};
use infer::{coerce_value, observe_value, Observed};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Minimum share of features in which a field must be set to survive.
const MIN_FILL_RATIO: f64 = 0.01;

/// Validation failures. All of them fail closed: the artifact is left
/// untouched and the layer is reported as broken.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// The artifact could not be read or written.
    #[error("cannot access layer artifact {path}: {source}")]
    Io {
        /// Artifact path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The artifact is not a GeoJSON feature collection.
    #[error("layer artifact {path} is not a feature collection")]
    Malformed {
        /// Artifact path.
        path: String,
    },
}

impl ValidateError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn malformed(path: &Path) -> Self {
        Self::Malformed {
            path: path.display().to_string(),
        }
    }
}

/// What one validation pass did to a layer artifact.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    /// Original names of fields dropped as empty or under-filled.
    pub removed_fields: Vec<String>,
    /// Number of features dropped for missing or empty geometry.
    pub removed_features: u64,
    /// Surviving schema, keyed by cleaned field name, with real types.
    pub fields: FieldSchema,
    /// Per surviving field: does any value repeat across features?
    pub duplicated_values: BTreeMap<String, bool>,
}

/// Per-field working state for the single feature pass.
#[derive(Default)]
struct FieldTrack {
    set_count: u64,
    observed: Observed,
    seen: HashSet<String>,
    duplicated: bool,
}

/// Validates and rewrites the layer artifact at `path`.
///
/// `declared` is the schema reported by the inspection tool for this
/// artifact. The artifact is rewritten only when validation succeeds;
/// any error leaves it exactly as it was.
pub async fn validate(
    path: &Path,
    declared: &FieldSchema,
) -> Result<ValidationOutcome, ValidateError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ValidateError::io(path, e))?;
    let mut document: Value =
        serde_json::from_str(&text).map_err(|_| ValidateError::malformed(path))?;

    let features = document
        .get_mut("features")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| ValidateError::malformed(path))?;

    let total_features = features.len() as u64;
    let mut tracks: HashMap<&str, FieldTrack> = declared
        .keys()
        .map(|name| (name.as_str(), FieldTrack::default()))
        .collect();

    // Single pass: drop geometry-less features, observe field values.
    let before = features.len();
    features.retain_mut(|feature| {
        if !has_usable_geometry(feature) {
            return false;
        }
        let properties = feature
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        for (name, declared_type) in declared {
            let track = match tracks.get_mut(name.as_str()) {
                Some(track) => track,
                None => continue,
            };
            let value = properties.get(name).unwrap_or(&Value::Null);

            if !track.duplicated && !track.seen.insert(canonical(value)) {
                track.duplicated = true;
            }

            if is_set(value) {
                track.set_count += 1;
                track.observed.record(observe_value(value, *declared_type));
            }
        }
        true
    });
    let removed_features = (before - features.len()) as u64;

    // Decide fates, then rewrite surviving properties.
    let mut outcome = ValidationOutcome {
        removed_features,
        ..ValidationOutcome::default()
    };
    let mut final_types: HashMap<&str, (String, FieldType, bool)> = HashMap::new();

    for (name, declared_type) in declared {
        let track = match tracks.get(name.as_str()) {
            Some(track) => track,
            None => continue,
        };
        let fill = if total_features == 0 {
            0.0
        } else {
            track.set_count as f64 / total_features as f64
        };
        if track.set_count == 0 || fill < MIN_FILL_RATIO {
            outcome.removed_fields.push(name.clone());
            continue;
        }

        let (final_type, retyped) = match track.observed {
            Observed::Consistent(real) => (real, true),
            Observed::None | Observed::Conflicting => (*declared_type, false),
        };
        let cleaned = clean_name(name);
        outcome.fields.insert(cleaned.clone(), final_type);
        outcome
            .duplicated_values
            .insert(cleaned.clone(), track.duplicated);
        final_types.insert(name.as_str(), (cleaned, final_type, retyped));
    }

    for feature in features.iter_mut() {
        let Some(properties) = feature.get_mut("properties").and_then(Value::as_object_mut)
        else {
            continue;
        };
        let mut rewritten = Map::with_capacity(final_types.len());
        for (name, (cleaned, final_type, retyped)) in &final_types {
            let value = properties.remove(*name).unwrap_or(Value::Null);
            let value = if *retyped {
                coerce_value(value, *final_type)
            } else {
                value
            };
            rewritten.insert(cleaned.clone(), value);
        }
        *properties = rewritten;
    }

    let serialized =
        serde_json::to_string(&document).map_err(|_| ValidateError::malformed(path))?;
    tokio::fs::write(path, serialized)
        .await
        .map_err(|e| ValidateError::io(path, e))?;

    debug!(
        path = %path.display(),
        removed_fields = outcome.removed_fields.len(),
        removed_features = outcome.removed_features,
        "layer artifact validated"
    );
    Ok(outcome)
}

/// A value counts as set when it is neither null, missing, nor a
/// blank string.
fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

fn has_usable_geometry(feature: &Value) -> bool {
    let Some(geometry) = feature.get("geometry") else {
        return false;
    };
    if geometry.is_null() {
        return false;
    }
    match geometry.get("coordinates") {
        Some(Value::Array(coordinates)) => !coordinates.is_empty(),
        // GeometryCollections carry geometries instead of coordinates.
        _ => matches!(
            geometry.get("geometries"),
            Some(Value::Array(geometries)) if !geometries.is_empty()
        ),
    }
}

/// Canonical text of a value for repeated-value detection.
fn canonical(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn schema(entries: &[(&str, FieldType)]) -> FieldSchema {
        entries
            .iter()
            .map(|(n, t)| (n.to_string(), *t))
            .collect()
    }

    async fn write_artifact(features: serde_json::Value) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layer.geojson");
        let document = serde_json::json!({
            "type": "FeatureCollection",
            "features": features,
        });
        tokio::fs::write(&path, document.to_string()).await.unwrap();
        (dir, path)
    }

    fn feature(geometry: serde_json::Value, properties: serde_json::Value) -> serde_json::Value {
        serde_json::json!({"type": "Feature", "geometry": geometry, "properties": properties})
    }

    fn point(x: f64, y: f64) -> serde_json::Value {
        serde_json::json!({"type": "Point", "coordinates": [x, y]})
    }

    #[tokio::test]
    async fn test_empty_field_is_removed() {
        let (_dir, path) = write_artifact(serde_json::json!([
            feature(point(0.1, 0.2), serde_json::json!({"NAME": "a", "EMPTY": null})),
            feature(point(0.3, 0.4), serde_json::json!({"NAME": "b", "EMPTY": ""})),
        ]))
        .await;
        let declared = schema(&[("NAME", FieldType::String), ("EMPTY", FieldType::String)]);

        let outcome = validate(&path, &declared).await.unwrap();
        assert_eq!(outcome.removed_fields, vec!["EMPTY"]);
        assert!(outcome.fields.contains_key("name"));
        assert_eq!(outcome.removed_features, 0);
    }

    #[tokio::test]
    async fn test_validation_is_deterministic_across_reruns() {
        let (_dir, path) = write_artifact(serde_json::json!([
            feature(point(0.1, 0.2), serde_json::json!({"A": null, "B": "x"})),
            feature(point(0.3, 0.4), serde_json::json!({"A": null, "B": "y"})),
        ]))
        .await;
        let declared = schema(&[("A", FieldType::String), ("B", FieldType::String)]);

        let first = validate(&path, &declared).await.unwrap();
        assert_eq!(first.removed_fields, vec!["A"]);

        // Re-validate the rewritten artifact with the surviving schema.
        let surviving = schema(&[("b", FieldType::String)]);
        let second = validate(&path, &surviving).await.unwrap();
        assert!(second.removed_fields.is_empty());
        assert!(second.fields.contains_key("b"));
    }

    #[tokio::test]
    async fn test_features_without_geometry_are_dropped() {
        let (_dir, path) = write_artifact(serde_json::json!([
            feature(point(0.1, 0.2), serde_json::json!({"NAME": "kept"})),
            feature(serde_json::Value::Null, serde_json::json!({"NAME": "no geometry"})),
            feature(
                serde_json::json!({"type": "Polygon", "coordinates": []}),
                serde_json::json!({"NAME": "empty geometry"})
            ),
        ]))
        .await;
        let declared = schema(&[("NAME", FieldType::String)]);

        let outcome = validate(&path, &declared).await.unwrap();
        assert_eq!(outcome.removed_features, 2);

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let document: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(document["features"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_string_column_of_numbers_is_retyped() {
        let (_dir, path) = write_artifact(serde_json::json!([
            feature(point(0.1, 0.2), serde_json::json!({"COUNT": "12"})),
            feature(point(0.3, 0.4), serde_json::json!({"COUNT": "7"})),
        ]))
        .await;
        let declared = schema(&[("COUNT", FieldType::String)]);

        let outcome = validate(&path, &declared).await.unwrap();
        assert_eq!(outcome.fields.get("count"), Some(&FieldType::Integer));

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let document: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(document["features"][0]["properties"]["count"], 12);
    }

    #[tokio::test]
    async fn test_string_column_of_dates_is_retyped() {
        let (_dir, path) = write_artifact(serde_json::json!([
            feature(point(0.1, 0.2), serde_json::json!({"CENSUS": "2017-05-01"})),
            feature(point(0.3, 0.4), serde_json::json!({"CENSUS": "01/06/2017"})),
        ]))
        .await;
        let declared = schema(&[("CENSUS", FieldType::String)]);

        let outcome = validate(&path, &declared).await.unwrap();
        assert_eq!(outcome.fields.get("census"), Some(&FieldType::Date));

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let document: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(document["features"][1]["properties"]["census"], "2017-06-01");
    }

    #[tokio::test]
    async fn test_conflicting_observations_keep_declared_type() {
        let (_dir, path) = write_artifact(serde_json::json!([
            feature(point(0.1, 0.2), serde_json::json!({"MIXED": "12"})),
            feature(point(0.3, 0.4), serde_json::json!({"MIXED": "2017-05-01"})),
        ]))
        .await;
        let declared = schema(&[("MIXED", FieldType::String)]);

        let outcome = validate(&path, &declared).await.unwrap();
        assert_eq!(outcome.fields.get("mixed"), Some(&FieldType::String));

        // Values stay untouched when the declared type is kept.
        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let document: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(document["features"][0]["properties"]["mixed"], "12");
    }

    #[tokio::test]
    async fn test_surviving_fields_are_renamed() {
        let (_dir, path) = write_artifact(serde_json::json!([
            feature(point(0.1, 0.2), serde_json::json!({"Población": "alta"})),
        ]))
        .await;
        let declared = schema(&[("Población", FieldType::String)]);

        let outcome = validate(&path, &declared).await.unwrap();
        assert!(outcome.fields.contains_key("poblacion"));

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let document: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(document["features"][0]["properties"]["poblacion"], "alta");
    }

    #[tokio::test]
    async fn test_duplicated_values_are_flagged() {
        let (_dir, path) = write_artifact(serde_json::json!([
            feature(point(0.1, 0.2), serde_json::json!({"CODE": "a", "UNIQ": "1"})),
            feature(point(0.3, 0.4), serde_json::json!({"CODE": "a", "UNIQ": "2"})),
        ]))
        .await;
        let declared = schema(&[("CODE", FieldType::String), ("UNIQ", FieldType::String)]);

        let outcome = validate(&path, &declared).await.unwrap();
        assert_eq!(outcome.duplicated_values.get("code"), Some(&true));
        assert_eq!(outcome.duplicated_values.get("uniq"), Some(&false));
    }

    #[tokio::test]
    async fn test_missing_artifact_fails_closed() {
        let declared = schema(&[("NAME", FieldType::String)]);
        let result = validate(Path::new("/nonexistent/layer.geojson"), &declared).await;
        assert!(matches!(result, Err(ValidateError::Io { .. })));
    }

    #[tokio::test]
    async fn test_malformed_artifact_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layer.geojson");
        tokio::fs::write(&path, "not json").await.unwrap();

        let declared = schema(&[("NAME", FieldType::String)]);
        let result = validate(&path, &declared).await;
        assert!(matches!(result, Err(ValidateError::Malformed { .. })));
    }
}
