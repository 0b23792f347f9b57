//! Statistical primitives: pure, deterministic, no I/O

use crate::structs::{ColumnStats, DatasenseError, Decomposition, LinearFit, Result};

impl ColumnStats {
    /// Calculate statistics for a vector of values
    ///
    /// # Errors
    /// Returns error if values is empty
    #[allow(clippy::cast_precision_loss)]
    pub fn calculate(name: &str, values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(DatasenseError::Ml(
                "Cannot calculate stats for empty data".into(),
            ));
        }

        let count = values.len();
        let mean = mean(values);
        let std_dev = std_dev(values);

        let ordered = sorted(values);

        let min = ordered[0];
        let max = ordered[count - 1];

        let q1 = positional_quantile(&ordered, 0.25);
        let median = positional_quantile(&ordered, 0.5);
        let q3 = positional_quantile(&ordered, 0.75);
        let iqr = q3 - q1;

        let deviations: Vec<f64> = values.iter().map(|v| (v - median).abs()).collect();
        let mad = positional_quantile(&sorted(&deviations), 0.5);

        Ok(Self {
            name: name.to_string(),
            count,
            mean,
            std_dev,
            min,
            max,
            q1,
            median,
            q3,
            iqr,
            mad,
        })
    }
}

/// Sorted copy; NaNs compare equal so they never panic the sort
#[must_use]
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

/// Arithmetic mean (0 for empty input)
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (0 for empty input)
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Population standard deviation
#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Quantile by index truncation: `sorted[floor(n * p)]`
///
/// Not interpolated.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn positional_quantile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64) * p).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Calculate correlation coefficient between two variables
///
/// Returns 0 when either variable has zero variance.
///
/// # Errors
/// Returns error if vectors have different lengths or fewer than 2 values
#[allow(clippy::cast_precision_loss)]
pub fn correlation(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(DatasenseError::Ml("Vectors must have same length".into()));
    }
    if x.len() < 2 {
        return Err(DatasenseError::Ml(
            "Need at least 2 values for correlation".into(),
        ));
    }

    let mean_x = mean(x);
    let mean_y = mean(y);

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;

    for i in 0..x.len() {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        return Ok(0.0);
    }

    Ok(cov / denom)
}

/// Ordinary least squares of `y` on `x` with R²
///
/// R² is 0 when `y` is constant. A degenerate `x` (all equal) yields a flat
/// line through the mean of `y`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn linear_regression(x: &[f64], y: &[f64]) -> LinearFit {
    let n = x.len().min(y.len());
    if n == 0 {
        return LinearFit {
            slope: 0.0,
            intercept: 0.0,
            r2: 0.0,
        };
    }
    let (x, y) = (&x[..n], &y[..n]);
    let nf = n as f64;

    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    let sum_x2: f64 = x.iter().map(|a| a * a).sum();

    let denom = nf * sum_x2 - sum_x * sum_x;
    let slope = if denom == 0.0 {
        0.0
    } else {
        (nf * sum_xy - sum_x * sum_y) / denom
    };
    let intercept = (sum_y - slope * sum_x) / nf;

    let y_mean = sum_y / nf;
    let ss_res: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| (yi - (slope * xi + intercept)).powi(2))
        .sum();
    let ss_tot: f64 = y.iter().map(|yi| (yi - y_mean).powi(2)).sum();
    let r2 = if ss_tot == 0.0 { 0.0 } else { 1.0 - ss_res / ss_tot };

    LinearFit {
        slope,
        intercept,
        r2,
    }
}

/// Regress a series on its positions `0..n`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn index_regression(values: &[f64]) -> LinearFit {
    let x: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    linear_regression(&x, values)
}

/// Simple exponential smoothing, seeded with the first observation
#[must_use]
pub fn exponential_smoothing(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut smoothed = Vec::with_capacity(values.len());
    let Some(&first) = values.first() else {
        return smoothed;
    };
    smoothed.push(first);
    for (i, &v) in values.iter().enumerate().skip(1) {
        smoothed.push(alpha * v + (1.0 - alpha) * smoothed[i - 1]);
    }
    smoothed
}

/// Centered moving-average trend plus residual seasonal component
///
/// Series shorter than `period` are returned as pure trend. Seasonality is
/// reported when the residual variance exceeds `variance_ratio` of the
/// series variance.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn decompose(values: &[f64], period: usize, variance_ratio: f64) -> Decomposition {
    let n = values.len();
    if n < period || n == 0 {
        return Decomposition {
            trend: values.to_vec(),
            seasonal: vec![0.0; n],
            window: 0,
            has_seasonality: false,
        };
    }

    let window = period.min(n / 4).max(1);
    let half_before = window / 2;
    let half_after = window.div_ceil(2);

    let trend: Vec<f64> = (0..n)
        .map(|i| {
            let start = i.saturating_sub(half_before);
            let end = n.min(i + half_after);
            mean(&values[start..end])
        })
        .collect();

    let seasonal: Vec<f64> = values.iter().zip(&trend).map(|(v, t)| v - t).collect();

    let seasonal_variance = seasonal.iter().map(|s| s * s).sum::<f64>() / n as f64;
    let has_seasonality = seasonal_variance > variance(values) * variance_ratio;

    Decomposition {
        trend,
        seasonal,
        window,
        has_seasonality,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_stats() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let stats = ColumnStats::calculate("test", &values).expect("calculate stats");

        assert_eq!(stats.count, 10);
        assert!((stats.mean - 5.5).abs() < 0.01);
        assert!((stats.min - 1.0).abs() < 0.01);
        assert!((stats.max - 10.0).abs() < 0.01);
        // positional: sorted[5]
        assert!((stats.median - 6.0).abs() < 0.01);
        assert!((stats.q1 - 3.0).abs() < 0.01);
        assert!((stats.q3 - 8.0).abs() < 0.01);
    }

    #[test]
    fn test_positional_iqr_bounds() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 100.0];
        let stats = ColumnStats::calculate("test", &values).expect("calculate stats");
        let (lower, upper) = stats.iqr_bounds(1.5);

        assert!((stats.q1 - 3.0).abs() < f64::EPSILON);
        assert!((stats.q3 - 8.0).abs() < f64::EPSILON);
        assert!((lower - -4.5).abs() < f64::EPSILON);
        assert!((upper - 15.5).abs() < f64::EPSILON);
        assert_eq!(stats.outlier_indices(&values, 1.5), vec![9]);
    }

    #[test]
    fn test_mad() {
        let values = vec![1.0, 1.0, 2.0, 2.0, 4.0, 6.0, 9.0];
        let stats = ColumnStats::calculate("test", &values).expect("calculate stats");
        // median = sorted[3] = 2; deviations sorted = [0,0,1,1,2,4,7]; MAD = 1
        assert!((stats.median - 2.0).abs() < f64::EPSILON);
        assert!((stats.mad - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_stats_is_error() {
        assert!(ColumnStats::calculate("empty", &[]).is_err());
    }

    #[test]
    fn test_correlation() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![2.0, 4.0, 6.0, 8.0, 10.0];
        let corr = correlation(&x, &y).expect("calculate correlation");

        assert!((corr - 1.0).abs() < 0.01);

        let flat = vec![3.0; 5];
        assert!(correlation(&x, &flat).expect("flat").abs() < f64::EPSILON);
        assert!(correlation(&x, &y[..3]).is_err());
    }

    #[test]
    fn test_linear_regression_exact() {
        let y: Vec<f64> = (0..20).map(|i| 2.0 * f64::from(i) + 5.0).collect();
        let fit = index_regression(&y);

        assert!((fit.slope - 2.0).abs() < 1e-9);
        assert!((fit.intercept - 5.0).abs() < 1e-9);
        assert!((fit.r2 - 1.0).abs() < 1e-9);
        assert!((fit.predict(25.0) - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_regression_constant() {
        let fit = index_regression(&[4.0, 4.0, 4.0]);
        assert!(fit.slope.abs() < f64::EPSILON);
        assert!((fit.intercept - 4.0).abs() < f64::EPSILON);
        assert!(fit.r2.abs() < f64::EPSILON);
    }

    #[test]
    fn test_exponential_smoothing() {
        let smoothed = exponential_smoothing(&[10.0, 20.0, 20.0], 0.5);
        assert_eq!(smoothed, vec![10.0, 15.0, 17.5]);
        assert!(exponential_smoothing(&[], 0.3).is_empty());
    }

    #[test]
    fn test_decompose_short_series_is_pure_trend() {
        let values = vec![1.0, 2.0, 3.0];
        let d = decompose(&values, 12, 0.1);
        assert_eq!(d.trend, values);
        assert!(!d.has_seasonality);
        assert!(d.seasonal.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_decompose_detects_oscillation() {
        let values: Vec<f64> = (0..48)
            .map(|i| if i % 2 == 0 { 10.0 } else { -10.0 })
            .collect();
        let d = decompose(&values, 12, 0.1);
        assert_eq!(d.window, 12);
        assert!(d.has_seasonality);
        assert_eq!(d.trend.len(), 48);
    }
}
