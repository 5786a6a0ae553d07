//! Centroid derivation for polygon layers.
//!
//! Appends a `geometry_c` property holding each feature's centroid as
//! WKT. Runs after field pruning so the derived field can never be
//! pruned itself.

use super::ValidateError;
use serde_json::Value;
use std::path::Path;

/// Name of the derived centroid field.
pub const CENTROID_FIELD: &str = "geometry_c";

/// Adds the centroid field to every feature of the artifact at `path`.
pub async fn append_centroids(path: &Path) -> Result<(), ValidateError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ValidateError::io(path, e))?;
    let mut document: Value =
        serde_json::from_str(&text).map_err(|_| ValidateError::malformed(path))?;

    let features = document
        .get_mut("features")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| ValidateError::malformed(path))?;

    for feature in features.iter_mut() {
        let Some(wkt) = feature.get("geometry").and_then(centroid_wkt) else {
            continue;
        };
        if let Some(properties) = feature.get_mut("properties").and_then(Value::as_object_mut) {
            properties.insert(CENTROID_FIELD.to_string(), Value::String(wkt));
        }
    }

    let serialized =
        serde_json::to_string(&document).map_err(|_| ValidateError::malformed(path))?;
    tokio::fs::write(path, serialized)
        .await
        .map_err(|e| ValidateError::io(path, e))
}

/// Centroid of a Polygon or MultiPolygon geometry as `POINT (x y)`.
fn centroid_wkt(geometry: &Value) -> Option<String> {
    let coordinates = geometry.get("coordinates")?;
    let (x, y) = match geometry.get("type")?.as_str()? {
        "Polygon" => polygon_centroid(coordinates)?,
        "MultiPolygon" => {
            // Area-weighted combination of the member polygons.
            let polygons = coordinates.as_array()?;
            let mut sum_x = 0.0;
            let mut sum_y = 0.0;
            let mut sum_area = 0.0;
            for polygon in polygons {
                let (cx, cy) = polygon_centroid(polygon)?;
                let area = ring_area(polygon.as_array()?.first()?)?;
                sum_x += cx * area;
                sum_y += cy * area;
                sum_area += area;
            }
            if sum_area == 0.0 {
                return None;
            }
            (sum_x / sum_area, sum_y / sum_area)
        }
        _ => return None,
    };
    Some(format!("POINT ({x} {y})"))
}

/// Shoelace centroid of a polygon's exterior ring.
fn polygon_centroid(polygon: &Value) -> Option<(f64, f64)> {
    let ring = polygon.as_array()?.first()?;
    let points = ring_points(ring)?;
    if points.len() < 3 {
        return None;
    }

    let mut area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for window in points.windows(2) {
        let (x0, y0) = window[0];
        let (x1, y1) = window[1];
        let cross = x0 * y1 - x1 * y0;
        area += cross;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }
    if area == 0.0 {
        // Degenerate ring; fall back to the vertex average.
        let n = points.len() as f64;
        let (sx, sy) = points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
        return Some((sx / n, sy / n));
    }
    area /= 2.0;
    Some((cx / (6.0 * area), cy / (6.0 * area)))
}

fn ring_area(ring: &Value) -> Option<f64> {
    let points = ring_points(ring)?;
    let mut area = 0.0;
    for window in points.windows(2) {
        let (x0, y0) = window[0];
        let (x1, y1) = window[1];
        area += x0 * y1 - x1 * y0;
    }
    Some((area / 2.0).abs())
}

fn ring_points(ring: &Value) -> Option<Vec<(f64, f64)>> {
    let mut points = Vec::new();
    for position in ring.as_array()? {
        let position = position.as_array()?;
        points.push((position.first()?.as_f64()?, position.get(1)?.as_f64()?));
    }
    // Close the ring if the source left it open.
    if points.len() >= 2 && points.first() != points.last() {
        if let Some(first) = points.first().copied() {
            points.push(first);
        }
    }
    Some(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unit_square_centroid() {
        let geometry = json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]]
        });
        assert_eq!(centroid_wkt(&geometry), Some("POINT (1 1)".to_string()));
    }

    #[test]
    fn test_non_polygon_has_no_centroid_field() {
        let geometry = json!({"type": "Point", "coordinates": [1.0, 2.0]});
        assert_eq!(centroid_wkt(&geometry), None);
    }

    #[tokio::test]
    async fn test_centroids_are_appended_to_features() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layer.geojson");
        let document = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]]]
                },
                "properties": {"name": "square"}
            }]
        });
        tokio::fs::write(&path, document.to_string()).await.unwrap();

        append_centroids(&path).await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let document: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            document["features"][0]["properties"][CENTROID_FIELD],
            "POINT (2 2)"
        );
    }
}
