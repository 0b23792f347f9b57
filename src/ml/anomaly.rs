//! Anomaly detection over numeric fields
//!
//! Statistical detectors (z-score, IQR, MAD) run per field; results are merged
//! so each `(field, row)` cell is reported once, by the most confident method.
//! When an ML backend is selected it is tried first and the statistical
//! detectors are the fallback.

use crate::backend::SelectorSession;
use crate::config::AnalysisConfig;
use crate::ml::classify::{classify, numeric_fields, select_profiles};
use crate::ml::stats;
use crate::structs::{
    Anomaly, AnomalyMethod, AnomalyOptions, AnomalyReport, AnomalySummary, ColumnStats, Dataset,
    DatasenseError, DetectionMethod, FeatureMatrix, MethodDecision, MethodKind, Result, TaskKind,
};
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Detect anomalies in the numeric fields of a dataset
///
/// # Errors
/// Returns error if the dataset is empty, a requested field does not exist,
/// or the threshold is not a positive finite number
pub fn detect(
    dataset: &Dataset,
    options: &AnomalyOptions,
    session: &SelectorSession<'_>,
    config: &AnalysisConfig,
) -> Result<AnomalyReport> {
    if !options.threshold.is_finite() || options.threshold <= 0.0 {
        return Err(DatasenseError::InvalidArgument(format!(
            "Threshold must be a positive number, got {}",
            options.threshold
        )));
    }

    let profiles = classify(dataset, None)?;
    let selected = select_profiles(&profiles, options.fields.as_deref())?;
    let fields = numeric_fields(&selected);

    let mut decision = session.select(TaskKind::AnomalyDetection, true);
    if decision.method == MethodKind::None {
        return Ok(no_method_report(decision));
    }

    let mut method_used = MethodKind::Statistical;
    let mut anomalies = Vec::new();

    if options.method == DetectionMethod::All {
        if let Some((kind, found)) = detect_with_models(dataset, &fields, &decision, session, config) {
            method_used = kind;
            anomalies = found;
        }
    }

    if method_used == MethodKind::Statistical {
        anomalies = detect_statistical(dataset, &fields, options, config);
    }

    if method_used != decision.method {
        let why = if options.method == DetectionMethod::All {
            "model backends gave no usable result"
        } else {
            "a statistical detector was requested"
        };
        decision.reason = format!("{}; ran statistical detectors since {why}", decision.reason);
    }

    let anomalies = merge_anomalies(anomalies);
    tracing::info!(
        count = anomalies.len(),
        fields = fields.len(),
        method = ?method_used,
        "Anomaly detection complete"
    );

    Ok(AnomalyReport {
        confidence: mean_confidence(&anomalies),
        summary: summarize(&anomalies),
        anomalies,
        decision,
        method_used,
    })
}

fn no_method_report(decision: MethodDecision) -> AnomalyReport {
    AnomalyReport {
        anomalies: Vec::new(),
        confidence: 0.0,
        summary: AnomalySummary::default(),
        decision,
        method_used: MethodKind::None,
    }
}

/// Run every requested statistical detector over every field
#[must_use]
pub fn detect_statistical(
    dataset: &Dataset,
    fields: &[String],
    options: &AnomalyOptions,
    config: &AnalysisConfig,
) -> Vec<Anomaly> {
    let mut candidates = Vec::new();

    for field in fields {
        let points = dataset.numeric_values(field);
        if points.len() < config.min_detector_points {
            tracing::debug!(field, points = points.len(), "Too few values for detection");
            continue;
        }
        let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
        let Ok(column) = ColumnStats::calculate(field, &values) else {
            continue;
        };

        if options.method.runs(AnomalyMethod::ZScore) {
            candidates.extend(zscore_anomalies(&column, &points, options.threshold));
        }
        if options.method.runs(AnomalyMethod::Iqr) {
            candidates.extend(iqr_anomalies(&column, &points, config.iqr_multiplier));
        }
        if options.method.runs(AnomalyMethod::Mad) {
            candidates.extend(mad_anomalies(
                &column,
                &points,
                config.mad_multiplier,
                config.mad_confidence_scale,
            ));
        }
    }

    candidates
}

/// Values more than `threshold` standard deviations from the mean
#[must_use]
pub fn zscore_anomalies(column: &ColumnStats, points: &[(usize, f64)], threshold: f64) -> Vec<Anomaly> {
    if column.std_dev == 0.0 {
        return Vec::new();
    }

    points
        .iter()
        .filter_map(|&(row_index, value)| {
            let z = (value - column.mean).abs() / column.std_dev;
            (z > threshold).then(|| Anomaly {
                row_index,
                field: column.name.clone(),
                value,
                expected_value: Some(column.mean),
                deviation_score: z,
                confidence: (z / threshold).min(1.0),
                method: AnomalyMethod::ZScore,
            })
        })
        .collect()
}

/// Values outside the Tukey fences
#[must_use]
pub fn iqr_anomalies(column: &ColumnStats, points: &[(usize, f64)], multiplier: f64) -> Vec<Anomaly> {
    if column.iqr == 0.0 {
        return Vec::new();
    }

    let (lower, upper) = column.iqr_bounds(multiplier);
    let midpoint = (column.q1 + column.q3) / 2.0;

    points
        .iter()
        .filter(|(_, value)| *value < lower || *value > upper)
        .map(|&(row_index, value)| {
            let deviation = (value - midpoint).abs() / column.iqr;
            Anomaly {
                row_index,
                field: column.name.clone(),
                value,
                expected_value: Some(midpoint),
                deviation_score: deviation,
                confidence: deviation.min(1.0),
                method: AnomalyMethod::Iqr,
            }
        })
        .collect()
}

/// Values more than `multiplier` MADs from the median
#[must_use]
pub fn mad_anomalies(
    column: &ColumnStats,
    points: &[(usize, f64)],
    multiplier: f64,
    confidence_scale: f64,
) -> Vec<Anomaly> {
    if column.mad == 0.0 {
        return Vec::new();
    }

    points
        .iter()
        .filter_map(|&(row_index, value)| {
            let ratio = (value - column.median).abs() / column.mad;
            (ratio > multiplier).then(|| Anomaly {
                row_index,
                field: column.name.clone(),
                value,
                expected_value: Some(column.median),
                deviation_score: ratio,
                confidence: (ratio / confidence_scale).min(1.0),
                method: AnomalyMethod::Mad,
            })
        })
        .collect()
}

/// Try the selected ML backend, then the local model if the remote gave nothing
///
/// Returns `None` when no model produced anomalies, so the caller falls back.
fn detect_with_models(
    dataset: &Dataset,
    fields: &[String],
    decision: &MethodDecision,
    session: &SelectorSession<'_>,
    config: &AnalysisConfig,
) -> Option<(MethodKind, Vec<Anomaly>)> {
    if fields.is_empty() {
        return None;
    }

    if decision.method == MethodKind::Remote {
        match detect_remote(dataset, fields, session, config) {
            Ok(found) if !found.is_empty() => return Some((MethodKind::Remote, found)),
            Ok(_) => tracing::debug!("Remote backend reported no anomalies"),
            Err(e) => tracing::warn!(error = %e, "Remote anomaly detection failed"),
        }
    }

    if matches!(decision.method, MethodKind::Remote | MethodKind::LocalModel) {
        match detect_local(dataset, fields, session, config) {
            Ok(found) if !found.is_empty() => return Some((MethodKind::LocalModel, found)),
            Ok(_) => tracing::debug!("Local model reported no anomalies"),
            Err(e) => tracing::warn!(error = %e, "Local anomaly detection failed"),
        }
    }

    None
}

/// Score the complete-row matrix remotely and attribute each anomalous row
/// to its most extreme field
fn detect_remote(
    dataset: &Dataset,
    fields: &[String],
    session: &SelectorSession<'_>,
    config: &AnalysisConfig,
) -> Result<Vec<Anomaly>> {
    let Some(remote) = session.remote() else {
        return Ok(Vec::new());
    };

    let matrix = FeatureMatrix::from_dataset(dataset, fields)?;
    if matrix.n_samples() < config.min_points_for_ml {
        return Ok(Vec::new());
    }

    let columns: Vec<(f64, f64)> = (0..matrix.n_features())
        .filter_map(|i| matrix.column(i))
        .map(|col| (stats::mean(&col), stats::std_dev(&col)))
        .collect();

    let scores = remote.detect_anomalies(&matrix.data, config.contamination)?;

    let anomalies = scores
        .iter()
        .filter(|s| s.is_anomaly)
        .filter_map(|s| {
            let row = matrix.data.get(s.index)?;
            let (feature, z) = row
                .iter()
                .zip(&columns)
                .map(|(v, (mean, sd))| if *sd > 0.0 { (v - mean).abs() / sd } else { 0.0 })
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))?;

            Some(Anomaly {
                row_index: matrix.row_indices[s.index],
                field: matrix.names[feature].clone(),
                value: row[feature],
                expected_value: Some(columns[feature].0),
                deviation_score: z,
                confidence: s.confidence.clamp(0.0, 1.0),
                method: AnomalyMethod::Remote,
            })
        })
        .collect();

    Ok(anomalies)
}

/// Fit a local model per field and flag large reconstruction errors
fn detect_local(
    dataset: &Dataset,
    fields: &[String],
    session: &SelectorSession<'_>,
    config: &AnalysisConfig,
) -> Result<Vec<Anomaly>> {
    let Some(runtime) = session.local() else {
        return Ok(Vec::new());
    };

    let mut anomalies = Vec::new();
    for field in fields {
        let points = dataset.numeric_values(field);
        if points.len() < config.min_points_for_ml {
            continue;
        }
        let series: Vec<f64> = points.iter().map(|(_, v)| *v).collect();

        let scored = runtime
            .train(&series, config.ml_lookback)
            .and_then(|model| model.score(&series));
        let errors = match scored {
            Ok(errors) => errors,
            Err(e) => {
                tracing::warn!(field = %field, error = %e, "Local model failed on field");
                continue;
            }
        };

        anomalies.extend(
            points
                .iter()
                .zip(errors)
                .filter(|(_, err)| *err > config.local_error_threshold)
                .map(|(&(row_index, value), err)| Anomaly {
                    row_index,
                    field: field.clone(),
                    value,
                    expected_value: None,
                    deviation_score: err,
                    confidence: (err / config.mad_confidence_scale).min(1.0),
                    method: AnomalyMethod::LocalModel,
                }),
        );
    }

    Ok(anomalies)
}

/// Keep one anomaly per `(field, row)`: highest confidence, ties broken by
/// method priority. Output is ordered by confidence, then field, then row.
#[must_use]
pub fn merge_anomalies(candidates: Vec<Anomaly>) -> Vec<Anomaly> {
    let mut best: BTreeMap<(String, usize), Anomaly> = BTreeMap::new();

    for anomaly in candidates {
        match best.entry((anomaly.field.clone(), anomaly.row_index)) {
            Entry::Vacant(slot) => {
                slot.insert(anomaly);
            }
            Entry::Occupied(mut slot) => {
                if outranks(&anomaly, slot.get()) {
                    slot.insert(anomaly);
                }
            }
        }
    }

    let mut merged: Vec<Anomaly> = best.into_values().collect();
    merged.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));
    merged
}

fn outranks(candidate: &Anomaly, current: &Anomaly) -> bool {
    match candidate.confidence.partial_cmp(&current.confidence) {
        Some(Ordering::Greater) => true,
        Some(Ordering::Equal) => candidate.method.priority() < current.method.priority(),
        _ => false,
    }
}

/// Count anomalies by field and by method
#[must_use]
pub fn summarize(anomalies: &[Anomaly]) -> AnomalySummary {
    let mut summary = AnomalySummary {
        total: anomalies.len(),
        ..AnomalySummary::default()
    };
    for anomaly in anomalies {
        *summary.by_field.entry(anomaly.field.clone()).or_insert(0) += 1;
        *summary.by_type.entry(anomaly.method).or_insert(0) += 1;
    }
    summary
}

/// Mean confidence, 0 when there are no anomalies
#[must_use]
pub fn mean_confidence(anomalies: &[Anomaly]) -> f64 {
    let confidences: Vec<f64> = anomalies.iter().map(|a| a.confidence).collect();
    stats::mean(&confidences)
}
