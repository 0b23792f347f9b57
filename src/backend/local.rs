//! In-process autoregressive model runtime
//!
//! Fits `x[t] = b + w1*x[t-1] + ... + wk*x[t-k]` with linfa's ridge estimator on
//! the standardized series. Residuals are scaled robustly (MAD) so a handful of
//! spikes in the training data do not hide themselves.

use crate::ml::stats;
use crate::structs::{DatasenseError, LocalModel, LocalModelRuntime, Result};
use linfa::traits::Fit;
use linfa::Dataset;
use linfa_elasticnet::ElasticNet;
use ndarray::{Array1, Array2};

/// Consistency constant turning a MAD into a normal standard deviation
const MAD_TO_SIGMA: f64 = 1.4826;
/// Residual scale never drops below this share of the series deviation
const MIN_RELATIVE_SCALE: f64 = 1e-3;
const DEFAULT_PENALTY: f64 = 1e-3;

/// Runtime that trains [`AutoregressiveModel`]s
#[derive(Debug, Clone)]
pub struct AutoregressiveRuntime {
    penalty: f64,
}

impl Default for AutoregressiveRuntime {
    fn default() -> Self {
        Self {
            penalty: DEFAULT_PENALTY,
        }
    }
}

impl AutoregressiveRuntime {
    #[must_use]
    pub fn with_penalty(penalty: f64) -> Self {
        Self {
            penalty: penalty.max(0.0),
        }
    }
}

impl LocalModelRuntime for AutoregressiveRuntime {
    fn is_available(&self) -> bool {
        true
    }

    fn train(&self, series: &[f64], lookback: usize) -> Result<Box<dyn LocalModel>> {
        Ok(Box::new(AutoregressiveModel::fit(series, lookback, self.penalty)?))
    }
}

/// A fitted autoregressive model
#[derive(Debug, Clone)]
pub struct AutoregressiveModel {
    lookback: usize,
    intercept: f64,
    /// One weight per lag, nearest lag first
    weights: Array1<f64>,
    mean: f64,
    scale: f64,
    /// Residual scale in original units
    residual_scale: f64,
    r2: f64,
}

impl AutoregressiveModel {
    /// Fit to `series` using `lookback` lags and an L2 `penalty` on the lag
    /// weights (the intercept is not penalized)
    ///
    /// # Errors
    /// Returns error if `lookback` is zero, the series is shorter than
    /// `lookback + 2`, or the ridge fit fails
    pub fn fit(series: &[f64], lookback: usize, penalty: f64) -> Result<Self> {
        if lookback == 0 {
            return Err(DatasenseError::InvalidArgument(
                "Lookback must be at least 1".into(),
            ));
        }
        if series.len() < lookback + 2 {
            return Err(DatasenseError::Ml(format!(
                "Need at least {} points to fit {lookback} lags, got {}",
                lookback + 2,
                series.len()
            )));
        }

        let mean = stats::mean(series);
        let sd = stats::std_dev(series);
        let scale = if sd > 0.0 { sd } else { 1.0 };
        let z: Vec<f64> = series.iter().map(|v| (v - mean) / scale).collect();

        let m = z.len() - lookback;
        let mut x = Array2::<f64>::zeros((m, lookback));
        let mut y = Array1::<f64>::zeros(m);
        for r in 0..m {
            for j in 0..lookback {
                x[[r, j]] = z[r + lookback - 1 - j];
            }
            y[r] = z[r + lookback];
        }

        let dataset = Dataset::new(x, y);
        let model = ElasticNet::<f64>::params()
            .penalty(penalty)
            .l1_ratio(0.0)
            .with_intercept(true)
            .max_iterations(1000)
            .tolerance(1e-6)
            .fit(&dataset)
            .map_err(|e| DatasenseError::Ml(format!("Ridge fit failed: {e}")))?;

        let intercept = model.intercept();
        let weights = model.hyperplane().clone();

        let fitted = dataset.records().dot(&weights) + intercept;
        let residuals = dataset.targets() - &fitted;
        let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
        let y_mean = dataset.targets().mean().unwrap_or(0.0);
        let ss_tot: f64 = dataset.targets().iter().map(|v| (v - y_mean).powi(2)).sum();
        let r2 = if ss_tot == 0.0 {
            1.0
        } else {
            (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
        };

        let abs_residuals: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
        let robust = stats::positional_quantile(&stats::sorted(&abs_residuals), 0.5) * MAD_TO_SIGMA;
        let residual_scale = robust.max(MIN_RELATIVE_SCALE) * scale;

        Ok(Self {
            lookback,
            intercept,
            weights,
            mean,
            scale,
            residual_scale,
            r2,
        })
    }

    /// One-step prediction in standardized units from the trailing window
    fn step(&self, window: &[f64]) -> f64 {
        let n = window.len();
        let mut acc = self.intercept;
        for j in 0..self.lookback {
            acc += self.weights[j] * window[n - 1 - j];
        }
        acc
    }

    fn standardize(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| (v - self.mean) / self.scale).collect()
    }
}

impl LocalModel for AutoregressiveModel {
    fn score(&self, series: &[f64]) -> Result<Vec<f64>> {
        let z = self.standardize(series);
        let scores = (0..series.len())
            .map(|i| {
                if i < self.lookback {
                    0.0
                } else {
                    let predicted = self.step(&z[i - self.lookback..i]) * self.scale + self.mean;
                    (series[i] - predicted).abs() / self.residual_scale
                }
            })
            .collect();
        Ok(scores)
    }

    fn predict(&self, history: &[f64], steps: usize) -> Result<Vec<f64>> {
        if history.len() < self.lookback {
            return Err(DatasenseError::Ml(format!(
                "History of {} points is shorter than lookback {}",
                history.len(),
                self.lookback
            )));
        }

        let mut window = self.standardize(&history[history.len() - self.lookback..]);
        let mut predictions = Vec::with_capacity(steps);
        for _ in 0..steps {
            let next = self.step(&window);
            predictions.push(next * self.scale + self.mean);
            window.remove(0);
            window.push(next);
        }
        Ok(predictions)
    }

    fn fit_quality(&self) -> f64 {
        self.r2
    }
}
