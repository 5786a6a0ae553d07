//! Parsing of conversion/inspection tool output.
//!
//! The rules here are an operator contract: people read these messages
//! in worker logs and the upload portal, and the filtering decides
//! which lines count as layer properties. Change them only in lockstep
//! with whoever consumes the persisted messages.

use crate::layer::{FieldSchema, FieldType, LayerProperties};
use crate::messages::{canned, MessageBag};
use regex::Regex;

/// Property-line prefixes that are layer metadata, not fields.
const PROPERTY_PREFIXES: [&str; 4] = ["Layer name:", "Geometry:", "Feature Count:", "Extent:"];

/// Parses one tool invocation into a message bag.
///
/// Stdout: a line containing `FAILURE` promotes the following line to
/// an error; the surviving lines are filtered to property lines
/// (non-empty, containing `:`, not ending in `:`, no `INFO` marker)
/// and kept as info. Stderr: `ERROR`/`Warning` lines open a message
/// captured after the first `:`, continuation lines are joined, and a
/// blank line closes the message. `Unable to open` diagnostics are
/// replaced with the operator-friendly wording, and duplicate errors
/// are collapsed keeping first-seen order.
pub fn parse(stdout: &str, stderr: &str) -> MessageBag {
    let mut bag = MessageBag::new();

    let out_lines: Vec<&str> = stdout.split('\n').collect();
    let err_lines: Vec<&str> = stderr.split('\n').collect();

    for (i, line) in out_lines.iter().enumerate() {
        if line.contains("FAILURE") {
            if let Some(next) = out_lines.get(i + 1) {
                bag.error.push(substitute_unable(next));
            }
        }
    }
    for (i, line) in err_lines.iter().enumerate() {
        if line.contains("FAILURE") {
            if let Some(next) = err_lines.get(i + 1) {
                bag.error.push(substitute_unable(next));
            }
        }
    }

    for line in &out_lines {
        if is_property_line(line) {
            bag.info.push(clean_message(line));
        }
    }

    parse_leveled_stderr(&err_lines, &mut bag);

    bag.dedupe_errors();
    bag.warn = bag.warn.iter().map(|m| clean_message(m)).collect();
    bag.error = bag.error.iter().map(|m| clean_message(m)).collect();
    bag
}

fn is_property_line(line: &str) -> bool {
    !line.is_empty() && line.contains(':') && !line.ends_with(':') && !line.contains("INFO")
}

fn substitute_unable(message: &str) -> String {
    if message.contains("Unable to open") {
        canned::unable_to_open()
    } else {
        message.to_string()
    }
}

/// Collapses runs of spaces and strips quotes, matching what operators
/// have always seen in these logs.
fn clean_message(message: &str) -> String {
    message.replace("  ", " ").replace('"', "")
}

enum Target {
    Warn,
    Error,
}

fn parse_leveled_stderr(lines: &[&str], bag: &mut MessageBag) {
    let mut current: Option<(Target, String)> = None;

    let flush = |current: Option<(Target, String)>, bag: &mut MessageBag| {
        if let Some((target, message)) = current {
            let message = substitute_unable(&message);
            match target {
                Target::Warn => bag.warn.push(message),
                Target::Error => bag.error.push(message),
            }
        }
    };

    for line in lines {
        if line.starts_with("ERROR") || line.starts_with("Warning") {
            flush(current.take(), bag);
            // A marker line without a separator is malformed; drop it.
            let Some(idx) = line.find(':') else {
                continue;
            };
            let target = if line.starts_with("ERROR") {
                Target::Error
            } else {
                Target::Warn
            };
            current = Some((target, line[idx + 1..].trim_start().to_string()));
        } else if line.is_empty() {
            flush(current.take(), bag);
        } else if let Some((_, message)) = &mut current {
            message.push(' ');
            message.push_str(line);
        }
    }
    flush(current, bag);
}

/// Extracts layer properties from parsed property lines.
///
/// `raw_stdout` is additionally scanned for the spatial-reference
/// authority, which lives in the WKT block that property filtering
/// discards.
pub fn extract_properties(info: &[String], raw_stdout: &str) -> LayerProperties {
    let mut properties = LayerProperties::default();
    for line in info {
        if let Some(value) = line.strip_prefix("Geometry:") {
            properties.geometry = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("Feature Count:") {
            properties.features = value.trim().parse().unwrap_or(0);
        } else if let Some(value) = line.strip_prefix("Extent:") {
            properties.bounding = value.trim().to_string();
        }
    }
    properties.crs = extract_crs(raw_stdout);
    properties
}

/// Lists the layer names announced in parsed property lines.
pub fn layer_names(info: &[String]) -> Vec<String> {
    info.iter()
        .filter_map(|line| line.strip_prefix("Layer name:"))
        .map(|name| name.trim().to_string())
        .collect()
}

/// Extracts the field schema from parsed property lines.
///
/// Field lines look like `POPULATION: Integer64 (10.0)`; the width and
/// precision suffix is dropped and type names are normalized. Property
/// lines that are not fields, and fields of unknown type, are skipped.
pub fn extract_fields(info: &[String]) -> FieldSchema {
    let mut fields = FieldSchema::new();
    for line in info {
        if PROPERTY_PREFIXES.iter().any(|p| line.starts_with(p)) {
            continue;
        }
        let Some((name, type_text)) = line.split_once(':') else {
            continue;
        };
        let type_name = match type_text.trim().split_once(" (") {
            Some((t, _)) => t,
            None => type_text.trim(),
        };
        if let Some(field_type) = FieldType::from_tool_name(type_name) {
            fields.insert(name.to_string(), field_type);
        }
    }
    fields
}

/// Finds the spatial reference as `AUTHORITY:CODE` in raw tool output.
///
/// The WKT block may carry an authority per coordinate component; the
/// last match is the one describing the whole reference system.
pub fn extract_crs(raw_stdout: &str) -> Option<String> {
    let pattern = Regex::new(r#"(?:AUTHORITY|ID)\["?([A-Za-z0-9_]+)"?,\s*"?(\d+)"?\]"#).ok()?;
    let captures = pattern.captures_iter(raw_stdout).last()?;
    Some(format!("{}:{}", &captures[1], &captures[2]))
}
