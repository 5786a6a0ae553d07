//! Command construction for the GDAL conversion and inspection tools.
//!
//! Arguments are built here and nowhere else, so the exact invocation
//! conventions stay in one place. Conversion always reprojects to
//! WGS84 and always explodes geometry collections, which is what turns
//! a mixed-geometry source into several single-geometry layers.

use std::path::Path;

/// Conversion binary.
pub const CONVERT_TOOL: &str = "ogr2ogr";
/// Inspection binary.
pub const INSPECT_TOOL: &str = "ogrinfo";

/// Driver every conversion targets. GeoJSON artifacts can be edited
/// in place by the validator without going back through the tool.
pub const TARGET_DRIVER: &str = "GeoJSON";
/// Extension of converted artifacts.
pub const TARGET_EXTENSION: &str = "geojson";
/// Spatial reference every conversion targets.
pub const TARGET_SRS: &str = "EPSG:4326";

/// Maps a source file extension to its driver name.
///
/// Returns `None` for unsupported formats; callers turn that into the
/// extension-not-valid operator error.
pub fn source_driver(extension: &str) -> Option<&'static str> {
    match extension.trim_start_matches('.').to_lowercase().as_str() {
        "shp" => Some("ESRI Shapefile"),
        "geojson" | "json" => Some("GeoJSON"),
        "gml" => Some("GML"),
        "kml" => Some("KML"),
        _ => None,
    }
}

/// Side-file extensions that travel with a source of the given format.
///
/// Used when deleting a task's uploaded resource, so companions like a
/// Shapefile's index and attribute files are removed together.
pub fn companion_extensions(extension: &str) -> &'static [&'static str] {
    match extension.trim_start_matches('.').to_lowercase().as_str() {
        "shp" => &[
            ".shp", ".shx", ".prj", ".sbn", ".sbx", ".dbf", ".fbn", ".fbx", ".ain", ".aih",
            ".shp.xml", ".cpg", ".qix",
        ],
        _ => &[],
    }
}

/// Arguments converting `source` into GeoJSON under `destination`.
pub fn convert_args(source: &Path, destination: &Path) -> Vec<String> {
    vec![
        "-t_srs".to_string(),
        TARGET_SRS.to_string(),
        "-f".to_string(),
        TARGET_DRIVER.to_string(),
        destination.display().to_string(),
        source.display().to_string(),
        "-explodecollections".to_string(),
    ]
}

/// Arguments for a summary-only inspection of every layer in `source`.
pub fn inspect_args(source: &Path) -> Vec<String> {
    vec![
        "-al".to_string(),
        "-so".to_string(),
        source.display().to_string(),
    ]
}

/// Arguments asking the inspection tool for its version banner.
pub fn version_args() -> Vec<String> {
    vec!["--version".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_source_driver_known_formats() {
        assert_eq!(source_driver("shp"), Some("ESRI Shapefile"));
        assert_eq!(source_driver(".shp"), Some("ESRI Shapefile"));
        assert_eq!(source_driver("GeoJSON"), Some("GeoJSON"));
        assert_eq!(source_driver("dwg"), None);
    }

    #[test]
    fn test_convert_args_shape() {
        let args = convert_args(
            &PathBuf::from("/in/region.shp"),
            &PathBuf::from("/out/layers"),
        );
        assert_eq!(
            args,
            vec![
                "-t_srs",
                "EPSG:4326",
                "-f",
                "GeoJSON",
                "/out/layers",
                "/in/region.shp",
                "-explodecollections",
            ]
        );
    }

    #[test]
    fn test_inspect_args_are_summary_only() {
        let args = inspect_args(&PathBuf::from("/out/layers/a.geojson"));
        assert_eq!(args, vec!["-al", "-so", "/out/layers/a.geojson"]);
    }

    #[test]
    fn test_shapefile_companions_include_attributes() {
        let companions = companion_extensions("shp");
        assert!(companions.contains(&".dbf"));
        assert!(companions.contains(&".prj"));
        assert!(companion_extensions("geojson").is_empty());
    }
}
