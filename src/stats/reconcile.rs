//! Per-field deltas between a baseline snapshot and the current one.
//!
//! Pure functions over their inputs; the snapshots themselves are never
//! modified.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::snapshot::{StatisticsSnapshot, TypedStatValue};

/// `{old, new, diff}` for one field.
///
/// `diff` is present only when both sides are numeric. A side missing from
/// its snapshot counts as zero for the diff but stays `None` here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeltaRecord {
    pub old: Option<TypedStatValue>,
    pub new: Option<TypedStatValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<f64>,
}

fn numeric_or_zero(value: Option<&TypedStatValue>) -> Option<f64> {
    match value {
        None => Some(0.0),
        Some(v) => v.as_number(),
    }
}

/// Delta for a single field.
pub fn diff_field(old: Option<&TypedStatValue>, new: Option<&TypedStatValue>) -> DeltaRecord {
    let diff = numeric_or_zero(old)
        .zip(numeric_or_zero(new))
        .map(|(o, n)| n - o);

    DeltaRecord {
        old: old.cloned(),
        new: new.cloned(),
        diff,
    }
}

/// Deltas for the requested fields.
pub fn diff<'a, I>(
    baseline: &StatisticsSnapshot,
    current: &StatisticsSnapshot,
    fields: I,
) -> BTreeMap<String, DeltaRecord>
where
    I: IntoIterator<Item = &'a str>,
{
    fields
        .into_iter()
        .map(|field| {
            (
                field.to_string(),
                diff_field(baseline.get(field), current.get(field)),
            )
        })
        .collect()
}

/// Deltas for every field present on either side.
pub fn diff_all(
    baseline: &StatisticsSnapshot,
    current: &StatisticsSnapshot,
) -> BTreeMap<String, DeltaRecord> {
    let fields: BTreeSet<&str> = baseline.fields().chain(current.fields()).collect();
    diff(baseline, current, fields)
}
