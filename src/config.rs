//! Tunable constants and environment-driven configuration

use serde::Serialize;
use std::env;
use std::time::Duration;

pub const ZSCORE_THRESHOLD: f64 = 3.0;
pub const IQR_MULTIPLIER: f64 = 1.5;
pub const MAD_MULTIPLIER: f64 = 3.0;
pub const MAD_CONFIDENCE_SCALE: f64 = 5.0;
pub const MIN_DETECTOR_POINTS: usize = 10;

pub const TREND_CHANGE_PERCENT: f64 = 5.0;
pub const CORRELATION_THRESHOLD: f64 = 0.7;
pub const CORRELATION_HIGH: f64 = 0.9;
pub const OUTLIER_HIGH_RATIO: f64 = 0.1;
pub const SEASONAL_PERIOD: usize = 12;
pub const PATTERN_TOLERANCE: f64 = 0.2;
pub const PATTERN_CONFIDENCE: f64 = 0.7;

pub const SMOOTHING_ALPHA: f64 = 0.3;
pub const AUTO_R2_CUTOFF: f64 = 0.7;
pub const SEASONAL_VARIANCE_RATIO: f64 = 0.1;
pub const EXPONENTIAL_CONFIDENCE: f64 = 0.6;
pub const SEASONAL_CONFIDENCE: f64 = 0.7;
pub const NON_SEASONAL_CONFIDENCE: f64 = 0.5;
pub const INTERVAL_Z: f64 = 1.96;
pub const MIN_FORECAST_POINTS: usize = 3;

pub const MIN_POINTS_FOR_ML: usize = 20;
pub const ML_LOOKBACK: usize = 10;
pub const CONTAMINATION: f64 = 0.1;
pub const LOCAL_ERROR_THRESHOLD: f64 = 3.0;

/// Default number of leading rows the field classifier inspects
pub const CLASSIFIER_SAMPLE: usize = 10;

/// Named constants used by the analytical modules
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisConfig {
    pub zscore_threshold: f64,
    pub iqr_multiplier: f64,
    pub mad_multiplier: f64,
    pub mad_confidence_scale: f64,
    pub min_detector_points: usize,
    pub trend_change_percent: f64,
    pub correlation_threshold: f64,
    pub correlation_high: f64,
    pub outlier_high_ratio: f64,
    pub seasonal_period: usize,
    pub pattern_tolerance: f64,
    pub pattern_confidence: f64,
    pub smoothing_alpha: f64,
    pub auto_r2_cutoff: f64,
    pub seasonal_variance_ratio: f64,
    pub exponential_confidence: f64,
    pub seasonal_confidence: f64,
    pub non_seasonal_confidence: f64,
    pub interval_z: f64,
    pub min_forecast_points: usize,
    pub min_points_for_ml: usize,
    pub ml_lookback: usize,
    pub contamination: f64,
    pub local_error_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            zscore_threshold: ZSCORE_THRESHOLD,
            iqr_multiplier: IQR_MULTIPLIER,
            mad_multiplier: MAD_MULTIPLIER,
            mad_confidence_scale: MAD_CONFIDENCE_SCALE,
            min_detector_points: MIN_DETECTOR_POINTS,
            trend_change_percent: TREND_CHANGE_PERCENT,
            correlation_threshold: CORRELATION_THRESHOLD,
            correlation_high: CORRELATION_HIGH,
            outlier_high_ratio: OUTLIER_HIGH_RATIO,
            seasonal_period: SEASONAL_PERIOD,
            pattern_tolerance: PATTERN_TOLERANCE,
            pattern_confidence: PATTERN_CONFIDENCE,
            smoothing_alpha: SMOOTHING_ALPHA,
            auto_r2_cutoff: AUTO_R2_CUTOFF,
            seasonal_variance_ratio: SEASONAL_VARIANCE_RATIO,
            exponential_confidence: EXPONENTIAL_CONFIDENCE,
            seasonal_confidence: SEASONAL_CONFIDENCE,
            non_seasonal_confidence: NON_SEASONAL_CONFIDENCE,
            interval_z: INTERVAL_Z,
            min_forecast_points: MIN_FORECAST_POINTS,
            min_points_for_ml: MIN_POINTS_FOR_ML,
            ml_lookback: ML_LOOKBACK,
            contamination: CONTAMINATION,
            local_error_threshold: LOCAL_ERROR_THRESHOLD,
        }
    }
}

/// Where and how to reach the optional backends
#[derive(Debug, Clone, Serialize)]
pub struct BackendConfig {
    /// Base URL of the remote model server, e.g. `http://127.0.0.1:8000`
    pub remote_url: Option<String>,
    pub probe_timeout: Duration,
    pub request_timeout: Duration,
    /// Enables the local autoregressive model runtime
    pub local_model: bool,
    pub statistical_fallback: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            probe_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            local_model: true,
            statistical_fallback: true,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub backend: BackendConfig,
}

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env_opt(key).map(|v| v.to_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

impl Config {
    /// Build config from `DATASENSE_*` environment variables (call `load_dotenv()` first).
    /// Missing or unparsable values keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let backend = BackendConfig {
            remote_url: env_opt("DATASENSE_REMOTE_URL"),
            probe_timeout: Duration::from_millis(env_parse(
                "DATASENSE_PROBE_TIMEOUT_MS",
                millis(defaults.backend.probe_timeout),
            )),
            request_timeout: Duration::from_millis(env_parse(
                "DATASENSE_REQUEST_TIMEOUT_MS",
                millis(defaults.backend.request_timeout),
            )),
            local_model: env_bool("DATASENSE_LOCAL_MODEL", defaults.backend.local_model),
            statistical_fallback: env_bool(
                "DATASENSE_STATISTICAL_FALLBACK",
                defaults.backend.statistical_fallback,
            ),
        };

        let d = defaults.analysis;
        let analysis = AnalysisConfig {
            zscore_threshold: env_parse("DATASENSE_ZSCORE_THRESHOLD", d.zscore_threshold),
            iqr_multiplier: env_parse("DATASENSE_IQR_MULTIPLIER", d.iqr_multiplier),
            mad_multiplier: env_parse("DATASENSE_MAD_MULTIPLIER", d.mad_multiplier),
            seasonal_period: env_parse("DATASENSE_SEASONAL_PERIOD", d.seasonal_period).max(2),
            smoothing_alpha: env_parse("DATASENSE_SMOOTHING_ALPHA", d.smoothing_alpha)
                .clamp(0.0, 1.0),
            min_points_for_ml: env_parse("DATASENSE_MIN_POINTS_FOR_ML", d.min_points_for_ml),
            ml_lookback: env_parse("DATASENSE_ML_LOOKBACK", d.ml_lookback).max(1),
            contamination: env_parse("DATASENSE_CONTAMINATION", d.contamination),
            ..d
        };

        Self { analysis, backend }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = Config::default();
        assert!((config.analysis.mad_multiplier - 3.0).abs() < f64::EPSILON);
        assert!((config.analysis.smoothing_alpha - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.analysis.seasonal_period, 12);
        assert!(config.backend.statistical_fallback);
        assert!(config.backend.remote_url.is_none());
    }

    #[test]
    fn test_env_bool_parsing() {
        assert!(env_bool("DATASENSE_TEST_UNSET_FLAG", true));
        assert!(!env_bool("DATASENSE_TEST_UNSET_FLAG", false));
    }
}
