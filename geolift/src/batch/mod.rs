//! Layer fan-out: conversion, per-layer validation, aggregation.
//!
//! One task's source resource expands into zero or more candidate
//! layers. The processor drives them through three stages:
//!
//! 1. `Converting` — the source is converted to one GeoJSON artifact
//!    per layer; a tool-reported error fails the whole task.
//! 2. `PerLayerValidating` — every candidate is inspected and
//!    validated independently; a bad layer is discarded (its artifact
//!    deleted) without aborting the batch.
//! 3. `Aggregating` — surviving layers are recombined into a single
//!    derived artifact; a batch where every candidate was discarded
//!    fails as having no usable layers.
//!
//! The processor owns layer lifecycle but never the task's directory:
//! rollback of conversion outputs on task failure belongs to the
//! orchestrator.

use crate::layer::{Layer, LayerStatus};
use crate::messages::{canned, MessageBag};
use crate::parser;
use crate::task::{Task, TaskPaths};
use crate::tools::{gdal, ToolError, ToolRunner};
use crate::validate;
use chrono::Local;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Outcome of a completed batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Every candidate layer, surviving and discarded, in the order
    /// the conversion produced them.
    pub layers: Vec<Layer>,
    /// Accumulated operator messages across all stages.
    pub messages: MessageBag,
}

impl BatchOutcome {
    /// The layers that survived validation.
    pub fn surviving(&self) -> impl Iterator<Item = &Layer> {
        self.layers
            .iter()
            .filter(|l| l.status == LayerStatus::Valid)
    }
}

/// Batch failures.
#[derive(Debug, Error)]
pub enum BatchError {
    /// A tool process could not be launched; environment problem,
    /// retryable, not a statement about the task's data.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The task's data is broken. Carries the operator messages.
    #[error("ingestion failed")]
    Failed(MessageBag),
}

/// Drives one task's layers through conversion and validation.
#[derive(Debug, Clone)]
pub struct LayerBatchProcessor<R> {
    runner: R,
}

impl<R: ToolRunner> LayerBatchProcessor<R> {
    /// Creates a processor over the given tool runner.
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Runs the full batch for `task`, reading the source at `source`
    /// and writing artifacts under `paths`.
    pub async fn process(
        &self,
        task: &Task,
        source: &Path,
        paths: &TaskPaths,
    ) -> Result<BatchOutcome, BatchError> {
        let mut messages = MessageBag::new();

        if gdal::source_driver(&task.extension).is_none() {
            return Err(BatchError::Failed(canned::extension_not_valid()));
        }
        if !source.exists() {
            return Err(BatchError::Failed(canned::file_not_found()));
        }
        if paths.layers_dir().exists() || paths.derived_dir().exists() {
            return Err(BatchError::Failed(canned::duplicated_transformation()));
        }

        messages.info.push(format!(
            "GDAL transformation - {}",
            Local::now().format("%Y-%m-%d %H:%M")
        ));

        let mut layers = self.convert(source, paths, &mut messages).await?;
        for layer in &mut layers {
            self.validate_layer(layer, paths, &mut messages).await?;
        }

        let outcome = BatchOutcome { layers, messages };
        self.aggregate(paths, outcome).await
    }

    /// `Converting`: run the conversion tool and enumerate candidates.
    async fn convert(
        &self,
        source: &Path,
        paths: &TaskPaths,
        messages: &mut MessageBag,
    ) -> Result<Vec<Layer>, BatchError> {
        let layers_dir = paths.layers_dir();
        tokio::fs::create_dir_all(&layers_dir)
            .await
            .map_err(|e| BatchError::Failed(MessageBag::from_error(e.to_string())))?;

        let output = self
            .runner
            .run(gdal::CONVERT_TOOL, &gdal::convert_args(source, &layers_dir))
            .await?;
        let bag = parser::gdal::parse(&output.stdout, &output.stderr);
        messages.warn.extend(bag.warn.clone());
        if bag.has_errors() {
            let mut failed = messages.clone();
            failed.error.extend(bag.error);
            return Err(BatchError::Failed(failed));
        }

        // Every artifact becomes a candidate named by its content id,
        // decoupling artifact paths from user-supplied layer names.
        let mut names = enumerate_artifacts(&layers_dir).await?;
        names.sort();
        let mut layers = Vec::with_capacity(names.len());
        for name in names {
            let layer = Layer::new(name.as_str());
            let produced = layers_dir.join(format!("{name}.{}", gdal::TARGET_EXTENSION));
            let renamed = paths.layer_artifact(&layer.id);
            tokio::fs::rename(&produced, &renamed)
                .await
                .map_err(|e| BatchError::Failed(MessageBag::from_error(e.to_string())))?;
            debug!(layer = %layer.id, original = %name, "candidate layer registered");
            layers.push(layer);
        }
        Ok(layers)
    }

    /// `PerLayerValidating`: inspect, validate, derive for one layer.
    /// A failure here discards the layer; it never aborts the batch.
    async fn validate_layer(
        &self,
        layer: &mut Layer,
        paths: &TaskPaths,
        messages: &mut MessageBag,
    ) -> Result<(), BatchError> {
        let artifact = paths.layer_artifact(&layer.id);
        messages
            .info
            .push(format!("Layer - {} - {}", layer.id, layer.original_name));

        let Some((properties, declared)) = self.inspect(&artifact, messages).await? else {
            self.discard(layer, &artifact).await;
            return Ok(());
        };
        layer.properties = properties;

        if layer.properties.features == 0 || !layer.properties.has_extent() {
            messages.warn.push(format!(
                "Removed layer {} because it has no features or a valid extent.",
                layer.original_name
            ));
            self.discard(layer, &artifact).await;
            return Ok(());
        }

        let outcome = match validate::validate(&artifact, &declared).await {
            Ok(outcome) => outcome,
            Err(e) => {
                messages.error.push(e.to_string());
                self.discard(layer, &artifact).await;
                return Ok(());
            }
        };

        for field in &outcome.removed_fields {
            messages
                .warn
                .push(format!("Removed field {field} because is empty"));
        }
        if outcome.removed_features > 0 {
            messages.warn.push(format!(
                "Removed {} features because they have not any geometry \
                 or the geometry was not valid.",
                outcome.removed_features
            ));
            // The feature count and extent changed; measure again.
            match self.inspect(&artifact, messages).await? {
                Some((properties, _)) => layer.properties = properties,
                None => {
                    self.discard(layer, &artifact).await;
                    return Ok(());
                }
            }
            if layer.properties.features == 0 || !layer.properties.has_extent() {
                messages.warn.push(format!(
                    "Removed layer {} because it has no features or a valid extent.",
                    layer.original_name
                ));
                self.discard(layer, &artifact).await;
                return Ok(());
            }
        }

        layer.fields = outcome.fields;
        layer.duplicated_values = outcome.duplicated_values;

        if layer.properties.geometry.contains("Polygon") {
            if let Err(e) = validate::append_centroids(&artifact).await {
                messages.error.push(e.to_string());
                self.discard(layer, &artifact).await;
                return Ok(());
            }
            layer
                .fields
                .insert(validate::CENTROID_FIELD.to_string(), crate::layer::FieldType::String);
        }

        for (field, field_type) in &layer.fields {
            messages.info.push(format!("{field}: {field_type}"));
        }
        layer.status = LayerStatus::Valid;
        info!(layer = %layer.id, features = layer.properties.features, "layer validated");
        Ok(())
    }

    /// Inspects an artifact, returning its properties and declared
    /// field schema, or recording the tool's errors and returning
    /// `None`.
    async fn inspect(
        &self,
        artifact: &Path,
        messages: &mut MessageBag,
    ) -> Result<Option<(crate::layer::LayerProperties, crate::layer::FieldSchema)>, BatchError>
    {
        let output = self
            .runner
            .run(gdal::INSPECT_TOOL, &gdal::inspect_args(artifact))
            .await?;
        let bag = parser::gdal::parse(&output.stdout, &output.stderr);
        if bag.has_errors() {
            messages.error.extend(bag.error);
            return Ok(None);
        }
        let properties = parser::gdal::extract_properties(&bag.info, &output.stdout);
        let declared = parser::gdal::extract_fields(&bag.info);
        messages.info.extend(bag.info);
        Ok(Some((properties, declared)))
    }

    async fn discard(&self, layer: &mut Layer, artifact: &Path) {
        layer.status = LayerStatus::Discarded;
        if let Err(e) = tokio::fs::remove_file(artifact).await {
            warn!(layer = %layer.id, error = %e, "could not delete discarded artifact");
        }
        debug!(layer = %layer.id, "layer discarded");
    }

    /// `Aggregating`: merge surviving layers into the derived artifact.
    async fn aggregate(
        &self,
        paths: &TaskPaths,
        mut outcome: BatchOutcome,
    ) -> Result<BatchOutcome, BatchError> {
        let surviving: Vec<String> = outcome.surviving().map(|l| l.id.clone()).collect();
        if surviving.is_empty() {
            outcome
                .messages
                .error
                .push(canned::no_usable_layers());
            return Err(BatchError::Failed(outcome.messages));
        }

        let mut combined = Vec::new();
        for id in &surviving {
            let artifact = paths.layer_artifact(id);
            let features = read_features(&artifact)
                .await
                .map_err(|m| BatchError::Failed(MessageBag::from_error(m)))?;
            combined.extend(features);
        }

        let derived = serde_json::json!({
            "type": "FeatureCollection",
            "features": combined,
        });
        tokio::fs::create_dir_all(paths.derived_dir())
            .await
            .map_err(|e| BatchError::Failed(MessageBag::from_error(e.to_string())))?;
        tokio::fs::write(paths.derived_artifact(), derived.to_string())
            .await
            .map_err(|e| BatchError::Failed(MessageBag::from_error(e.to_string())))?;

        info!(
            layers = surviving.len(),
            derived = %paths.derived_artifact().display(),
            "batch aggregated"
        );
        Ok(outcome)
    }
}

/// Lists the layer names of converted artifacts in `dir`.
async fn enumerate_artifacts(dir: &Path) -> Result<Vec<String>, BatchError> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| BatchError::Failed(MessageBag::from_error(e.to_string())))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| BatchError::Failed(MessageBag::from_error(e.to_string())))?
    {
        let path = entry.path();
        let is_artifact = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case(gdal::TARGET_EXTENSION))
            .unwrap_or(false);
        if is_artifact {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
    }
    Ok(names)
}

async fn read_features(artifact: &Path) -> Result<Vec<Value>, String> {
    let text = tokio::fs::read_to_string(artifact)
        .await
        .map_err(|e| e.to_string())?;
    let document: Value = serde_json::from_str(&text).map_err(|e| e.to_string())?;
    match document.get("features").and_then(Value::as_array) {
        Some(features) => Ok(features.clone()),
        None => Err(format!(
            "artifact {} is not a feature collection",
            artifact.display()
        )),
    }
}
