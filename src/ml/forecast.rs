//! Short-horizon forecasting of a single numeric field

use crate::backend::SelectorSession;
use crate::config::AnalysisConfig;
use crate::ml::classify::{classify, select_profiles};
use crate::ml::stats;
use crate::structs::{
    BacktestMetrics, Dataset, DatasenseError, ForecastMethod, ForecastModel, ForecastOptions,
    ForecastReport, MethodDecision, MethodKind, Prediction, Result, SeasonalContext, TaskKind,
};

/// Predictions and confidence produced by one model
#[derive(Debug, Clone)]
pub struct ModelForecast {
    pub model: ForecastModel,
    pub predictions: Vec<Prediction>,
    pub confidence: f64,
}

/// Forecast `horizon` steps of a numeric field
///
/// # Errors
/// Returns error if the dataset is empty, `horizon` is zero, or the
/// requested field does not exist
pub fn forecast(
    dataset: &Dataset,
    horizon: usize,
    options: &ForecastOptions,
    session: &SelectorSession<'_>,
    config: &AnalysisConfig,
) -> Result<ForecastReport> {
    if horizon == 0 {
        return Err(DatasenseError::InvalidArgument(
            "Forecast horizon must be at least 1".into(),
        ));
    }

    let profiles = classify(dataset, None)?;
    let field = match &options.field {
        Some(name) => {
            select_profiles(&profiles, Some(std::slice::from_ref(name)))?;
            Some(name.clone())
        }
        None => default_field(dataset, &profiles.iter().collect::<Vec<_>>()),
    };

    let mut decision = session.select(TaskKind::Forecasting, true);
    let Some(field) = field else {
        tracing::debug!("No numeric field to forecast");
        return Ok(empty_report(None, decision));
    };
    if decision.method == MethodKind::None {
        return Ok(empty_report(Some(field), decision));
    }

    let values = dataset.numeric_series(&field);
    if values.len() < config.min_forecast_points {
        tracing::debug!(field, points = values.len(), "Too few values to forecast");
        return Ok(empty_report(Some(field), decision));
    }

    let mut primary = None;
    if options.method == ForecastMethod::Auto && values.len() >= config.min_points_for_ml {
        primary = forecast_with_models(&values, horizon, &decision, session, config);
    }

    let seasonal = (values.len() >= config.seasonal_period).then(|| {
        let trend = trend_seasonal_forecast(&values, horizon, config);
        (seasonal_context(&values, config), trend)
    });

    let primary = match primary {
        Some(found) => found,
        None => match options.method {
            ForecastMethod::Linear => linear_forecast(&values, horizon, config),
            ForecastMethod::Exponential => exponential_forecast(&values, horizon, config),
            ForecastMethod::Trend => match &seasonal {
                Some((_, trend)) => trend.clone(),
                None => trend_seasonal_forecast(&values, horizon, config),
            },
            ForecastMethod::Auto => {
                let linear = linear_forecast(&values, horizon, config);
                if linear.confidence < config.auto_r2_cutoff {
                    exponential_forecast(&values, horizon, config)
                } else {
                    linear
                }
            }
        },
    };

    let model_backend = matches!(primary.model, ForecastModel::Remote | ForecastModel::LocalModel);
    if !model_backend && decision.method != MethodKind::Statistical {
        let why = if options.method != ForecastMethod::Auto {
            "a statistical model was requested".to_string()
        } else if values.len() < config.min_points_for_ml {
            format!("fewer than {} points", config.min_points_for_ml)
        } else {
            "model backends gave no usable result".to_string()
        };
        decision.reason = format!("{}; used a statistical model since {why}", decision.reason);
    }

    let metrics = backtest(&values, horizon);

    tracing::info!(
        field,
        model = ?primary.model,
        horizon,
        confidence = primary.confidence,
        "Forecast complete"
    );

    Ok(ForecastReport {
        field: Some(field),
        confidence: primary.confidence.clamp(0.0, 1.0),
        method: Some(primary.model),
        predictions: primary.predictions,
        metrics,
        seasonal: seasonal.map(|(context, _)| context),
        decision,
    })
}

fn empty_report(field: Option<String>, decision: MethodDecision) -> ForecastReport {
    ForecastReport {
        field,
        predictions: Vec::new(),
        confidence: 0.0,
        method: None,
        metrics: None,
        seasonal: None,
        decision,
    }
}

/// First numeric column whose every non-null cell is a number
#[must_use]
pub fn default_field(dataset: &Dataset, profiles: &[&crate::structs::FieldProfile]) -> Option<String> {
    profiles
        .iter()
        .filter(|p| p.is_numeric())
        .find(|p| {
            let numeric = dataset.numeric_values(&p.name).len();
            let present = (0..dataset.row_count())
                .filter(|&i| !dataset.value(i, &p.name).is_null())
                .count();
            numeric > 0 && numeric == present
        })
        .map(|p| p.name.clone())
}

fn prediction(
    n: usize,
    step: usize,
    point_estimate: f64,
    bounds: Option<(f64, f64)>,
    confidence: f64,
) -> Prediction {
    Prediction {
        horizon_index: step,
        position: n - 1 + step,
        point_estimate,
        lower_bound: bounds.map(|(lower, _)| lower),
        upper_bound: bounds.map(|(_, upper)| upper),
        confidence,
    }
}

/// Least-squares line on the index with a prediction interval that widens
/// with distance from the centre of the history
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn linear_forecast(values: &[f64], horizon: usize, config: &AnalysisConfig) -> ModelForecast {
    let n = values.len();
    let nf = n as f64;
    let fit = stats::index_regression(values);

    let sd = (values
        .iter()
        .enumerate()
        .map(|(i, v)| (v - fit.predict(i as f64)).powi(2))
        .sum::<f64>()
        / nf)
        .sqrt();
    let x_mean = (nf - 1.0) / 2.0;
    let sxx: f64 = (0..n).map(|i| (i as f64 - x_mean).powi(2)).sum();
    let confidence = fit.r2.clamp(0.0, 1.0);

    let predictions = (1..=horizon)
        .map(|step| {
            let x = (n - 1 + step) as f64;
            let leverage = if sxx > 0.0 { (x - x_mean).powi(2) / sxx } else { 0.0 };
            let error = sd * (1.0 + 1.0 / nf + leverage).sqrt();
            let estimate = fit.predict(x);
            let margin = config.interval_z * error;
            prediction(n, step, estimate, Some((estimate - margin, estimate + margin)), confidence)
        })
        .collect();

    ModelForecast {
        model: ForecastModel::Linear,
        predictions,
        confidence,
    }
}

/// Last smoothed level plus the latest smoothed step, projected linearly
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn exponential_forecast(values: &[f64], horizon: usize, config: &AnalysisConfig) -> ModelForecast {
    let n = values.len();
    let smoothed = stats::exponential_smoothing(values, config.smoothing_alpha);
    let last = smoothed.last().copied().unwrap_or(0.0);
    let step_trend = if n > 1 { last - smoothed[n - 2] } else { 0.0 };

    let sd = if n > 1 {
        (values[1..]
            .iter()
            .zip(&smoothed)
            .map(|(v, s)| (v - s).powi(2))
            .sum::<f64>()
            / (n - 1) as f64)
            .sqrt()
    } else {
        0.0
    };
    let margin = config.interval_z * sd;
    let confidence = config.exponential_confidence;

    let predictions = (1..=horizon)
        .map(|step| {
            let estimate = last + step_trend * step as f64;
            prediction(n, step, estimate, Some((estimate - margin, estimate + margin)), confidence)
        })
        .collect();

    ModelForecast {
        model: ForecastModel::Exponential,
        predictions,
        confidence,
    }
}

/// Extend the moving-average trend by its fitted slope and add the seasonal
/// residual from the same phase of the last observed period
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn trend_seasonal_forecast(values: &[f64], horizon: usize, config: &AnalysisConfig) -> ModelForecast {
    let n = values.len();
    let period = config.seasonal_period;
    let decomposition = stats::decompose(values, period, config.seasonal_variance_ratio);
    let slope = stats::index_regression(&decomposition.trend).slope;
    let last_trend = decomposition.trend.last().copied().unwrap_or(0.0);

    let confidence = if decomposition.has_seasonality {
        config.seasonal_confidence
    } else {
        config.non_seasonal_confidence
    };

    let predictions = (1..=horizon)
        .map(|step| {
            let seasonal = if decomposition.has_seasonality {
                let back = period * step.div_ceil(period);
                (n - 1 + step)
                    .checked_sub(back)
                    .and_then(|i| decomposition.seasonal.get(i))
                    .copied()
                    .unwrap_or(0.0)
            } else {
                0.0
            };
            let estimate = last_trend + slope * step as f64 + seasonal;
            prediction(n, step, estimate, None, confidence)
        })
        .collect();

    ModelForecast {
        model: ForecastModel::TrendSeasonal,
        predictions,
        confidence,
    }
}

/// Decomposition summary reported next to the primary forecast
#[must_use]
pub fn seasonal_context(values: &[f64], config: &AnalysisConfig) -> SeasonalContext {
    let decomposition = stats::decompose(values, config.seasonal_period, config.seasonal_variance_ratio);
    SeasonalContext {
        window: decomposition.window,
        has_seasonality: decomposition.has_seasonality,
        confidence: if decomposition.has_seasonality {
            config.seasonal_confidence
        } else {
            config.non_seasonal_confidence
        },
    }
}

/// Hold out the last `horizon` values, refit a line on the rest and score it
///
/// Needs at least `2 * horizon` values and two training points. Zero actuals
/// are left out of MAPE.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn backtest(values: &[f64], horizon: usize) -> Option<BacktestMetrics> {
    if horizon == 0 || values.len() < 2 * horizon {
        return None;
    }
    let split = values.len() - horizon;
    if split < 2 {
        return None;
    }

    let (train, test) = values.split_at(split);
    let fit = stats::index_regression(train);
    let errors: Vec<(f64, f64)> = test
        .iter()
        .enumerate()
        .map(|(i, actual)| (*actual, actual - fit.predict((split + i) as f64)))
        .collect();

    let count = errors.len() as f64;
    let mse = errors.iter().map(|(_, e)| e * e).sum::<f64>() / count;
    let mae = errors.iter().map(|(_, e)| e.abs()).sum::<f64>() / count;

    let relative: Vec<f64> = errors
        .iter()
        .filter(|(actual, _)| *actual != 0.0)
        .map(|(actual, e)| (e / actual).abs())
        .collect();
    let mape = (!relative.is_empty()).then(|| stats::mean(&relative) * 100.0);

    Some(BacktestMetrics {
        holdout: horizon,
        mse,
        mae,
        mape,
    })
}

/// Reject model output that does not cover the horizon with finite values
fn check_model_output(predicted: &[f64], horizon: usize) -> Result<()> {
    if predicted.len() != horizon {
        return Err(DatasenseError::Backend(format!(
            "Expected {horizon} predictions, got {}",
            predicted.len()
        )));
    }
    if predicted.iter().any(|v| !v.is_finite()) {
        return Err(DatasenseError::Backend(
            "Model returned a non-finite prediction".into(),
        ));
    }
    Ok(())
}

fn model_forecast(n: usize, model: ForecastModel, predicted: &[f64], quality: f64) -> ModelForecast {
    let confidence = quality.clamp(0.0, 1.0);
    ModelForecast {
        model,
        predictions: predicted
            .iter()
            .enumerate()
            .map(|(i, v)| prediction(n, i + 1, *v, None, confidence))
            .collect(),
        confidence,
    }
}

/// Try the selected ML backend, then the local model
fn forecast_with_models(
    values: &[f64],
    horizon: usize,
    decision: &MethodDecision,
    session: &SelectorSession<'_>,
    config: &AnalysisConfig,
) -> Option<ModelForecast> {
    let n = values.len();

    if decision.method == MethodKind::Remote {
        if let Some(remote) = session.remote() {
            let result = remote
                .forecast(values, config.ml_lookback, horizon)
                .and_then(|r| check_model_output(&r.predictions, horizon).map(|()| r));
            match result {
                Ok(r) => {
                    return Some(model_forecast(n, ForecastModel::Remote, &r.predictions, r.confidence))
                }
                Err(e) => tracing::warn!(error = %e, "Remote forecast failed"),
            }
        }
    }

    if matches!(decision.method, MethodKind::Remote | MethodKind::LocalModel) {
        if let Some(runtime) = session.local() {
            let result = runtime
                .train(values, config.ml_lookback)
                .and_then(|model| Ok((model.predict(values, horizon)?, model.fit_quality())))
                .and_then(|(predicted, quality)| {
                    check_model_output(&predicted, horizon).map(|()| (predicted, quality))
                });
            match result {
                Ok((predicted, quality)) => {
                    return Some(model_forecast(n, ForecastModel::LocalModel, &predicted, quality))
                }
                Err(e) => tracing::warn!(error = %e, "Local model forecast failed"),
            }
        }
    }

    None
}
