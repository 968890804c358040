//! Typed statistic values and point-in-time snapshots.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// The coerced result of reading one field.
///
/// `Unparsable` means recognition or coercion failed this cycle. It is not a
/// zero reading and never takes part in arithmetic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TypedStatValue {
    Integer(i64),
    Number(f64),
    /// A number followed by a unit letter, e.g. `1.2K`, `35%`
    Quantity {
        value: f64,
        unit: char,
        text: String,
    },
    Duration(Duration),
    Text(String),
    Unparsable,
}

impl TypedStatValue {
    pub fn is_unparsable(&self) -> bool {
        matches!(self, TypedStatValue::Unparsable)
    }

    /// Numeric view used when diffing: units are scaled out (`1.2M` -> 1200000),
    /// durations become seconds, text goes through [`scaled_number`].
    pub fn as_number(&self) -> Option<f64> {
        match self {
            TypedStatValue::Integer(v) => Some(*v as f64),
            TypedStatValue::Number(v) => Some(*v),
            TypedStatValue::Quantity { value, unit, .. } => Some(value * unit_multiplier(*unit)),
            TypedStatValue::Duration(d) => Some(d.as_secs_f64()),
            TypedStatValue::Text(text) => scaled_number(text),
            TypedStatValue::Unparsable => None,
        }
    }

    /// Integer view for stage-like values.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            TypedStatValue::Integer(v) => u64::try_from(*v).ok(),
            TypedStatValue::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for TypedStatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedStatValue::Integer(v) => write!(f, "{}", v),
            TypedStatValue::Number(v) => write!(f, "{}", v),
            TypedStatValue::Quantity { text, .. } => write!(f, "{}", text),
            TypedStatValue::Duration(d) => {
                let secs = d.as_secs();
                write!(f, "{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
            }
            TypedStatValue::Text(text) => write!(f, "{}", text),
            TypedStatValue::Unparsable => write!(f, "N/A"),
        }
    }
}

/// Scale applied to a unit suffix. Unknown units (including `%`) scale by one.
pub fn unit_multiplier(unit: char) -> f64 {
    match unit.to_ascii_uppercase() {
        'K' => 1e3,
        'M' => 1e6,
        'B' => 1e9,
        'T' => 1e12,
        _ => 1.0,
    }
}

/// Parses text such as `12,345`, `1.2M` or `35%` into a plain number.
pub fn scaled_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(v) = cleaned.parse::<f64>() {
        return v.is_finite().then_some(v);
    }

    let unit = cleaned.chars().last()?;
    if unit.is_ascii_digit() {
        return None;
    }
    let number = &cleaned[..cleaned.len() - unit.len_utf8()];
    number
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v * unit_multiplier(unit))
}

/// One point-in-time read of every tracked field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub captured_at: DateTime<Local>,
    pub values: BTreeMap<String, TypedStatValue>,
}

impl StatisticsSnapshot {
    pub fn new() -> Self {
        Self {
            captured_at: Local::now(),
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&TypedStatValue> {
        self.values.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: TypedStatValue) {
        self.values.insert(field.into(), value);
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of fields that failed to parse this cycle.
    pub fn unparsable_count(&self) -> usize {
        self.values.values().filter(|v| v.is_unparsable()).count()
    }
}

impl Default for StatisticsSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<(String, TypedStatValue)> for StatisticsSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, TypedStatValue)>>(iter: I) -> Self {
        Self {
            captured_at: Local::now(),
            values: iter.into_iter().collect(),
        }
    }
}
