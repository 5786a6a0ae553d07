//! Layer model for converted geo-spatial resources.
//!
//! A single uploaded resource may explode into several layers during
//! conversion (mixed-geometry containers, multi-layer sources). Each
//! layer gets a content-derived identifier so downstream stages never
//! depend on user-supplied naming.

mod id;

pub use id::{clean_name, layer_id};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Normalized field type after schema extraction.
///
/// Only the types representable by the conversion toolchain are kept;
/// the names are the ones persisted to the shared store and shown to
/// operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Free-form text.
    String,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer (`Integer64` in tool output).
    Long,
    /// Floating point (`Real` in tool output).
    Float,
    /// Calendar date.
    Date,
}

impl FieldType {
    /// Maps a type name from tool output to the normalized type.
    ///
    /// Returns `None` for unknown names so callers can skip
    /// non-field property lines.
    pub fn from_tool_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "string" => Some(FieldType::String),
            "integer" => Some(FieldType::Integer),
            "integer64" => Some(FieldType::Long),
            "real" => Some(FieldType::Float),
            "date" => Some(FieldType::Date),
            _ => None,
        }
    }

    /// The persisted, operator-facing name.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Date => "date",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Field schema: field name → normalized type, ordered by name.
pub type FieldSchema = BTreeMap<String, FieldType>;

/// Properties extracted from tool inspection of one layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerProperties {
    /// Geometry kind reported by the tool (e.g. `Polygon`, `Point`).
    pub geometry: String,
    /// Number of features in the layer.
    pub features: u64,
    /// Raw bounding box text, e.g. `(-3.8, 40.3) - (-3.5, 40.5)`.
    pub bounding: String,
    /// Spatial reference as `AUTHORITY:CODE`, when detected.
    pub crs: Option<String>,
}

impl LayerProperties {
    /// Returns true if the bounding box is degenerate (all zeros).
    ///
    /// A zero extent means the conversion produced placeholder
    /// geometry; such layers carry no usable information.
    pub fn has_extent(&self) -> bool {
        let trimmed = self
            .bounding
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
            .replace(") - (", ", ");
        let mut any_parsed = false;
        for part in trimmed.split(',') {
            match part.trim().parse::<f64>() {
                Ok(v) => {
                    any_parsed = true;
                    if v != 0.0 {
                        return true;
                    }
                }
                Err(_) => return false,
            }
        }
        // All coordinates parsed and all were zero.
        !any_parsed
    }

    /// Flattens the properties into the map persisted per layer.
    pub fn to_store_map(&self) -> Vec<(String, String)> {
        let mut map = vec![
            ("geometry".to_string(), self.geometry.clone()),
            ("features".to_string(), self.features.to_string()),
            ("bounding".to_string(), self.bounding.clone()),
        ];
        if let Some(crs) = &self.crs {
            map.push(("crs".to_string(), crs.clone()));
        }
        map
    }
}

/// Processing state of one candidate layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerStatus {
    /// Created by conversion, not yet validated.
    Pending,
    /// Validated; its artifacts survive and its metadata is persisted.
    Valid,
    /// Rejected; its on-disk artifacts were deleted.
    Discarded,
}

/// One geometry collection produced by converting a task's resource.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Content-derived stable identifier (hash of the original name).
    pub id: String,
    /// The original layer name as produced by the conversion tool.
    pub original_name: String,
    /// Extracted properties, populated during validation.
    pub properties: LayerProperties,
    /// Field schema after validation.
    pub fields: FieldSchema,
    /// Per-field flag: does any value repeat across features?
    pub duplicated_values: BTreeMap<String, bool>,
    /// Current processing state.
    pub status: LayerStatus,
}

impl Layer {
    /// Creates a pending layer for an original name.
    pub fn new(original_name: impl Into<String>) -> Self {
        let original_name = original_name.into();
        Self {
            id: layer_id(&original_name),
            original_name,
            properties: LayerProperties::default(),
            fields: FieldSchema::new(),
            duplicated_values: BTreeMap::new(),
            status: LayerStatus::Pending,
        }
    }
}
