//! Field classification: numeric, temporal or categorical per column

use crate::config::CLASSIFIER_SAMPLE;
use crate::structs::{Dataset, DatasenseError, FieldKind, FieldProfile, Result, Value};
use std::collections::HashSet;

/// Share of rows a column's distinct count must stay under to count as low-cardinality
const LOW_CARDINALITY_RATIO: f64 = 0.5;
/// Absolute cap on distinct values for a low-cardinality column
const LOW_CARDINALITY_MAX: f64 = 50.0;

/// Classify every column of a dataset
///
/// The kind is decided on the first `sample_size` rows (default
/// `min(10, rows)`): numeric when at least half of the non-null sampled
/// values are numbers, else temporal when at least half parse as dates,
/// else categorical. Cardinality and nullability are measured over all rows.
///
/// # Errors
/// Returns error if the dataset is empty
#[allow(clippy::cast_precision_loss)]
pub fn classify(dataset: &Dataset, sample_size: Option<usize>) -> Result<Vec<FieldProfile>> {
    if dataset.is_empty() {
        return Err(DatasenseError::InvalidArgument(
            "Cannot classify an empty dataset".into(),
        ));
    }

    let row_count = dataset.row_count();
    let sample = sample_size
        .unwrap_or(CLASSIFIER_SAMPLE)
        .clamp(1, row_count);

    let profiles = dataset
        .columns()
        .into_iter()
        .map(|name| profile_field(dataset, name, sample, row_count))
        .collect();

    Ok(profiles)
}

#[allow(clippy::cast_precision_loss)]
fn profile_field(dataset: &Dataset, name: String, sample: usize, row_count: usize) -> FieldProfile {
    let sampled: Vec<&Value> = (0..sample)
        .map(|i| dataset.value(i, &name))
        .filter(|v| !v.is_null())
        .collect();

    let numeric = sampled.iter().filter(|v| v.as_number().is_some()).count();
    let temporal = sampled
        .iter()
        .filter(|v| v.as_number().is_none() && v.as_temporal().is_some())
        .count();
    let resolvable = sampled.len();

    let kind = if resolvable == 0 {
        FieldKind::Categorical
    } else if numeric > 0 && numeric * 2 >= resolvable {
        FieldKind::Numeric
    } else if temporal > 0 && temporal * 2 >= resolvable {
        FieldKind::Temporal
    } else {
        FieldKind::Categorical
    };

    let mut distinct = HashSet::new();
    let mut has_nulls = false;
    for i in 0..row_count {
        match dataset.value(i, &name).distinct_key() {
            Some(key) => {
                distinct.insert(key);
            }
            None => has_nulls = true,
        }
    }

    let distinct_count = distinct.len();
    let cap = (row_count as f64 * LOW_CARDINALITY_RATIO).min(LOW_CARDINALITY_MAX);

    FieldProfile {
        name,
        kind,
        sample_size: resolvable,
        distinct_count,
        has_nulls,
        low_cardinality: (distinct_count as f64) < cap,
    }
}

/// Profiles for the requested fields, or all profiles when none are requested
///
/// # Errors
/// Returns error if a requested field is not a column of the dataset
pub fn select_profiles<'a>(
    profiles: &'a [FieldProfile],
    requested: Option<&[String]>,
) -> Result<Vec<&'a FieldProfile>> {
    let Some(requested) = requested else {
        return Ok(profiles.iter().collect());
    };

    requested
        .iter()
        .map(|name| {
            profiles
                .iter()
                .find(|p| &p.name == name)
                .ok_or_else(|| DatasenseError::InvalidArgument(format!("Unknown field: {name}")))
        })
        .collect()
}

/// Names of the numeric fields among `profiles`, in column order
#[must_use]
pub fn numeric_fields(profiles: &[&FieldProfile]) -> Vec<String> {
    profiles
        .iter()
        .filter(|p| p.is_numeric())
        .map(|p| p.name.clone())
        .collect()
}
