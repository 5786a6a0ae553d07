//! Real-type inference for misdeclared columns.
//!
//! Conversion tools declare every attribute of some sources as text.
//! When the values of a text column are consistently parseable as one
//! other type, the column is retyped; values that already match their
//! declared type contribute no observation, and two different
//! mismatched observations poison the column back to its declared
//! type.

use crate::layer::FieldType;
use chrono::NaiveDate;
use serde_json::Value;

/// Date layouts accepted for retyping. Day-first variants are listed
/// because the upload corpus predominantly uses them.
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%Y%m%d"];

/// Shortest string worth trying to parse as a date.
const MIN_DATE_LEN: usize = 8;

/// Accumulated mismatch observations for one column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Observed {
    /// No value disagreed with the declared type.
    #[default]
    None,
    /// Every mismatched value agreed on this real type.
    Consistent(FieldType),
    /// Mismatched values disagreed among themselves.
    Conflicting,
}

impl Observed {
    /// Folds in one value's observation.
    pub fn record(&mut self, observation: Option<FieldType>) {
        let Some(real) = observation else {
            return;
        };
        *self = match *self {
            Observed::None => Observed::Consistent(real),
            Observed::Consistent(existing) if existing == real => Observed::Consistent(real),
            _ => Observed::Conflicting,
        };
    }
}

/// Determines a value's real type when it differs from the declared
/// one. Returns `None` when the value matches its declaration or is
/// not parseable as anything more specific.
pub fn observe_value(value: &Value, declared: FieldType) -> Option<FieldType> {
    let real = real_type(value, declared)?;
    (real != declared).then_some(real)
}

fn real_type(value: &Value, declared: FieldType) -> Option<FieldType> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if declared == FieldType::Date {
                return None;
            }
            if s.len() >= MIN_DATE_LEN && parse_date(s).is_some() {
                return Some(FieldType::Date);
            }
            if let Ok(n) = s.parse::<i64>() {
                return Some(integer_type(n));
            }
            if s.parse::<f64>().is_ok() {
                return Some(FieldType::Float);
            }
            None
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(integer_type(i)),
            None => Some(FieldType::Float),
        },
        _ => None,
    }
}

fn integer_type(n: i64) -> FieldType {
    if i32::try_from(n).is_ok() {
        FieldType::Integer
    } else {
        FieldType::Long
    }
}

/// Rewrites a value into its inferred type's canonical representation.
/// Values that do not parse are left untouched.
pub fn coerce_value(value: Value, target: FieldType) -> Value {
    match (&value, target) {
        (Value::String(s), FieldType::Date) => match parse_date(s.trim()) {
            Some(date) => Value::String(date.format("%Y-%m-%d").to_string()),
            None => value,
        },
        (Value::String(s), FieldType::Integer | FieldType::Long) => {
            match s.trim().parse::<i64>() {
                Ok(n) => Value::Number(n.into()),
                Err(_) => value,
            }
        }
        (Value::String(s), FieldType::Float) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(value),
        _ => value,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
}
