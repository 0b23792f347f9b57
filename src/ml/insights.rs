//! Automatic insights: trends, correlations, outliers and naive periodicity

use crate::config::AnalysisConfig;
use crate::ml::classify::{classify, numeric_fields, select_profiles};
use crate::ml::correlation::pairwise_correlations;
use crate::ml::stats;
use crate::structs::{
    ColumnStats, Dataset, Insight, InsightKind, InsightReport, Result, Severity, Trend,
    TrendDirection,
};
use std::cmp::Ordering;

/// Generate insights for every numeric field of a dataset
///
/// # Errors
/// Returns error if the dataset is empty
pub fn generate(dataset: &Dataset, config: &AnalysisConfig) -> Result<InsightReport> {
    let profiles = classify(dataset, None)?;
    let fields = numeric_fields(&select_profiles(&profiles, None)?);
    let row_count = dataset.row_count();

    let mut report = InsightReport::default();
    let mut insights = Vec::new();

    for field in &fields {
        let values = dataset.numeric_series(field);
        if let Some(trend) = detect_trend(field, &values, config) {
            if let Some(insight) = trend_insight(&trend) {
                insights.push(insight);
            }
            report.trends.push(trend);
        }
    }

    insights.extend(correlation_insights(dataset, &fields, config));

    for field in &fields {
        let values = dataset.numeric_series(field);
        if let Some(insight) = outlier_insight(field, &values, row_count, config) {
            report.anomalies.push(insight.clone());
            insights.push(insight);
        }
    }

    for field in &fields {
        let values = dataset.numeric_series(field);
        if let Some(insight) = pattern_insight(field, &values, config) {
            insights.push(insight);
        }
    }

    sort_by_confidence(&mut insights);
    sort_by_confidence(&mut report.anomalies);
    report.insights = insights;

    tracing::info!(
        insights = report.insights.len(),
        trends = report.trends.len(),
        fields = fields.len(),
        "Insight generation complete"
    );
    Ok(report)
}

fn sort_by_confidence(insights: &mut [Insight]) {
    insights.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));
}

/// Compare the means of the first and second half of a series
///
/// Returns `None` for fewer than two values or a zero first-half mean.
#[must_use]
pub fn detect_trend(field: &str, values: &[f64], config: &AnalysisConfig) -> Option<Trend> {
    if values.len() < 2 {
        return None;
    }

    let mid = values.len() / 2;
    let first = stats::mean(&values[..mid]);
    let second = stats::mean(&values[mid..]);
    if first == 0.0 {
        tracing::debug!(field, "First-half mean is zero; relative change undefined");
        return None;
    }

    let change = (second - first) / first * 100.0;
    let direction = if change.abs() <= config.trend_change_percent {
        TrendDirection::Stable
    } else if change > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    Some(Trend {
        field: field.to_string(),
        direction,
        change: change.abs(),
    })
}

/// Insight for a non-stable trend
#[must_use]
pub fn trend_insight(trend: &Trend) -> Option<Insight> {
    let verb = match trend.direction {
        TrendDirection::Increasing => "Growth",
        TrendDirection::Decreasing => "Decline",
        TrendDirection::Stable => return None,
    };

    let severity = if trend.change > 20.0 {
        Severity::High
    } else if trend.change > 10.0 {
        Severity::Medium
    } else {
        Severity::Low
    };

    Some(Insight {
        kind: InsightKind::Trend,
        title: format!("{verb} in {}", trend.field),
        description: format!("Changed by {:.2}% between the first and second half", trend.change),
        fields: vec![trend.field.clone()],
        value: Some(trend.change),
        confidence: (trend.change / 100.0).min(1.0),
        severity,
    })
}

/// Strong pairwise correlations over paired rows
#[must_use]
pub fn correlation_insights(dataset: &Dataset, fields: &[String], config: &AnalysisConfig) -> Vec<Insight> {
    pairwise_correlations(dataset, fields)
        .into_iter()
        .filter(|c| c.pairs >= config.min_detector_points && c.r.abs() > config.correlation_threshold)
        .map(|c| {
            let strength = c.r.abs();
            Insight {
                kind: InsightKind::Correlation,
                title: format!("Strong correlation between {} and {}", c.first, c.second),
                description: format!(
                    "Correlation: {:.2}. {} relationship.",
                    c.r,
                    if c.r > 0.0 { "Positive" } else { "Negative" }
                ),
                fields: vec![c.first, c.second],
                value: Some(c.r),
                confidence: strength.min(1.0),
                severity: if strength > config.correlation_high {
                    Severity::High
                } else {
                    Severity::Medium
                },
            }
        })
        .collect()
}

/// Summarize the values outside the Tukey fences of a field
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn outlier_insight(
    field: &str,
    values: &[f64],
    row_count: usize,
    config: &AnalysisConfig,
) -> Option<Insight> {
    if values.len() < config.min_detector_points || row_count == 0 {
        return None;
    }
    let column = ColumnStats::calculate(field, values).ok()?;
    if column.iqr == 0.0 {
        return None;
    }

    let count = column.outlier_indices(values, config.iqr_multiplier).len();
    if count == 0 {
        return None;
    }

    let (lower, upper) = column.iqr_bounds(config.iqr_multiplier);
    let ratio = count as f64 / row_count as f64;

    Some(Insight {
        kind: InsightKind::Outlier,
        title: format!("{count} outliers in {field}"),
        description: format!("Outliers fall outside [{lower:.2}, {upper:.2}]"),
        fields: vec![field.to_string()],
        value: Some(count as f64),
        confidence: ratio.min(1.0),
        severity: if ratio > config.outlier_high_ratio {
            Severity::High
        } else {
            Severity::Medium
        },
    })
}

/// Naive periodicity: some value is within tolerance of the value one period earlier
#[must_use]
pub fn pattern_insight(field: &str, values: &[f64], config: &AnalysisConfig) -> Option<Insight> {
    let period = config.seasonal_period;
    if values.len() < period {
        return None;
    }

    let repeats = (period..values.len()).any(|i| {
        let previous = values[i - period];
        previous != 0.0 && ((values[i] - previous) / previous).abs() < config.pattern_tolerance
    });
    if !repeats {
        return None;
    }

    Some(Insight {
        kind: InsightKind::Pattern,
        title: format!("Recurring pattern in {field}"),
        description: format!("Values repeat at a lag of {period}; possible seasonality"),
        fields: vec![field.to_string()],
        value: None,
        confidence: config.pattern_confidence,
        severity: Severity::Medium,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::DatasenseError;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn config() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    #[test]
    fn test_identical_series_correlate() {
        let values: Vec<f64> = (0..30).map(|i| f64::from(i * i % 17)).collect();
        let data = Dataset::from_numeric_columns(&[("a", &values), ("b", &values)]);
        let report = generate(&data, &config()).expect("generate");

        let corr = report
            .insights
            .iter()
            .find(|i| i.kind == InsightKind::Correlation)
            .expect("correlation insight");
        assert!((corr.confidence - 1.0).abs() < 1e-9);
        assert_eq!(corr.severity, Severity::High);
        assert_eq!(corr.fields, vec!["a", "b"]);
    }

    #[test]
    fn test_independent_random_series_do_not_correlate() {
        let mut rng = StdRng::seed_from_u64(42);
        let a: Vec<f64> = (0..1000).map(|_| rng.gen::<f64>()).collect();
        let b: Vec<f64> = (0..1000).map(|_| rng.gen::<f64>()).collect();
        let data = Dataset::from_numeric_columns(&[("a", &a), ("b", &b)]);

        let fields = vec!["a".to_string(), "b".to_string()];
        assert!(correlation_insights(&data, &fields, &config()).is_empty());
    }

    #[test]
    fn test_trend_directions() {
        let up: Vec<f64> = (1..=10).map(f64::from).collect();
        let trend = detect_trend("up", &up, &config()).expect("trend");
        assert_eq!(trend.direction, TrendDirection::Increasing);
        // first half mean 3, second half mean 8
        assert!((trend.change - 166.666_666).abs() < 1e-3);

        let insight = trend_insight(&trend).expect("insight");
        assert!((insight.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(insight.severity, Severity::High);

        let flat = [100.0, 101.0, 100.0, 102.0];
        let stable = detect_trend("flat", &flat, &config()).expect("trend");
        assert_eq!(stable.direction, TrendDirection::Stable);
        assert!(trend_insight(&stable).is_none());

        assert!(detect_trend("zero", &[0.0, 0.0, 5.0, 5.0], &config()).is_none());
    }

    #[test]
    fn test_stable_trend_recorded_not_surfaced() {
        let values = vec![50.0; 12];
        let data = Dataset::from_numeric_columns(&[("flat", &values)]);
        let report = generate(&data, &config()).expect("generate");

        assert_eq!(report.trends.len(), 1);
        assert!(report.insights.iter().all(|i| i.kind != InsightKind::Trend));
    }

    #[test]
    fn test_outlier_insight() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 100.0];
        let insight = outlier_insight("v", &values, values.len(), &config()).expect("outlier");

        assert_eq!(insight.value, Some(1.0));
        assert!((insight.confidence - 0.1).abs() < 1e-9);
        assert_eq!(insight.severity, Severity::Medium);
        assert!(insight.description.contains("[-4.50, 15.50]"));
    }

    #[test]
    fn test_pattern_needs_a_full_period_plus_one() {
        let twelve = vec![10.0; 12];
        assert!(pattern_insight("p", &twelve, &config()).is_none());

        let thirteen = vec![10.0; 13];
        let insight = pattern_insight("p", &thirteen, &config()).expect("pattern");
        assert!((insight.confidence - 0.7).abs() < f64::EPSILON);

        let zeros = vec![0.0; 24];
        assert!(pattern_insight("z", &zeros, &config()).is_none());
    }

    #[test]
    fn test_report_sorted_and_anomalies_mirror_outliers() {
        let mut values: Vec<f64> = (0..24).map(|i| f64::from(i % 12) + 10.0).collect();
        values[5] = 500.0;
        let data = Dataset::from_numeric_columns(&[("sales", &values)]);
        let report = generate(&data, &config()).expect("generate");

        assert!(report
            .insights
            .windows(2)
            .all(|w| w[0].confidence >= w[1].confidence));
        assert_eq!(report.anomalies.len(), 1);
        assert!(report.anomalies.iter().all(|i| i.kind == InsightKind::Outlier));
    }

    #[test]
    fn test_empty_dataset_rejected() {
        assert!(matches!(
            generate(&Dataset::default(), &config()),
            Err(DatasenseError::InvalidArgument(_))
        ));
    }
}
