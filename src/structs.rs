//! Consolidated public types for the datasense crate
//!
//! This module contains all public structs, enums, and traits used across the crate.

use crate::config;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum DatasenseError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(Box<ureq::Error>),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("ML error: {0}")]
    Ml(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ureq::Error> for DatasenseError {
    fn from(e: ureq::Error) -> Self {
        Self::Http(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, DatasenseError>;

/// Shared flag the host sets to abandon pending backend work
pub type CancelFlag = Arc<AtomicBool>;

// ============================================================================
// Dataset Types
// ============================================================================

/// A dynamically typed cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Temporal(NaiveDateTime),
    Text(String),
}

/// One row: column name to value, in column order
pub type Row = IndexMap<String, Value>;

/// Row-oriented dataset owned by the caller
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dataset {
    pub rows: Vec<Row>,
}

/// Semantic type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Numeric,
    Temporal,
    Categorical,
}

impl FieldKind {
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Temporal => "temporal",
            Self::Categorical => "categorical",
        }
    }
}

/// Inferred type and cardinality metadata for a column
#[derive(Debug, Clone, Serialize)]
pub struct FieldProfile {
    pub name: String,
    pub kind: FieldKind,
    pub sample_size: usize,
    pub distinct_count: usize,
    pub has_nulls: bool,
    /// Few distinct values relative to the row count
    pub low_cardinality: bool,
}

impl FieldProfile {
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.kind == FieldKind::Numeric
    }

    /// Format as a summary string
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {} (sampled {}, {} distinct{})",
            self.name,
            self.kind.display_name(),
            self.sample_size,
            self.distinct_count,
            if self.has_nulls { ", has nulls" } else { "" }
        )
    }
}

// ============================================================================
// ML Types
// ============================================================================

/// Feature matrix extracted from a dataset
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Feature names (column headers)
    pub names: Vec<String>,
    /// Row data as feature vectors
    pub data: Vec<Vec<f64>>,
    /// Original row indices (for mapping back)
    pub row_indices: Vec<usize>,
}

impl FeatureMatrix {
    /// Get number of samples (rows)
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.data.len()
    }

    /// Get number of features (columns)
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    /// Get a feature column by index
    #[must_use]
    pub fn column(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.n_features() {
            return None;
        }
        Some(self.data.iter().map(|row| row[index]).collect())
    }
}

/// Normalized feature matrix with scaling parameters
#[derive(Debug, Clone)]
pub struct NormalizedFeatures {
    pub names: Vec<String>,
    pub data: Vec<Vec<f64>>,
    pub row_indices: Vec<usize>,
    pub mins: Vec<f64>,
    pub maxs: Vec<f64>,
}

impl NormalizedFeatures {
    /// Get number of samples
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.data.len()
    }

    /// Get number of features
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    /// Convert to flat `Vec<f64>` (row-major)
    #[must_use]
    pub fn to_flat(&self) -> Vec<f64> {
        self.data.iter().flatten().copied().collect()
    }

    /// Denormalize a single value
    #[must_use]
    pub fn denormalize(&self, feature_idx: usize, normalized_val: f64) -> f64 {
        let range = self.maxs[feature_idx] - self.mins[feature_idx];
        self.mins[feature_idx] + normalized_val * range
    }
}

/// Descriptive statistics for a numeric column
///
/// Quartiles and the median are positional (index truncation on the sorted
/// values), not interpolated.
#[derive(Debug, Clone)]
pub struct ColumnStats {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub iqr: f64,
    /// Median absolute deviation from `median`
    pub mad: f64,
}

impl ColumnStats {
    /// Tukey fences `[q1 - k*iqr, q3 + k*iqr]`
    #[must_use]
    pub fn iqr_bounds(&self, multiplier: f64) -> (f64, f64) {
        (self.q1 - multiplier * self.iqr, self.q3 + multiplier * self.iqr)
    }

    /// Detect outliers using the IQR fences
    #[must_use]
    pub fn outlier_indices(&self, values: &[f64], multiplier: f64) -> Vec<usize> {
        let (lower_bound, upper_bound) = self.iqr_bounds(multiplier);

        values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v < lower_bound || v > upper_bound)
            .map(|(i, _)| i)
            .collect()
    }

    /// Format as a summary string
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: n={}, mean={:.2}, std={:.2}, min={:.2}, Q1={:.2}, median={:.2}, Q3={:.2}, max={:.2}, IQR={:.2}, MAD={:.2}",
            self.name, self.count, self.mean, self.std_dev, self.min, self.q1, self.median, self.q3, self.max, self.iqr, self.mad
        )
    }
}

/// Ordinary least squares fit of `y` against `x`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r2: f64,
}

impl LinearFit {
    #[must_use]
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Pearson correlation between two fields over the rows where both are numeric
#[derive(Debug, Clone, Serialize)]
pub struct FieldCorrelation {
    pub first: String,
    pub second: String,
    pub r: f64,
    /// Number of paired rows
    pub pairs: usize,
}

/// Moving-average trend plus seasonal residual
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub window: usize,
    pub has_seasonality: bool,
}

/// Result of K-means clustering
#[derive(Debug, Clone, Serialize)]
pub struct ClusterResult {
    pub fields: Vec<String>,
    /// Cluster assignment for each sample
    pub labels: Vec<usize>,
    /// Number of clusters
    pub k: usize,
    /// Cluster sizes
    pub sizes: Vec<usize>,
    /// Original row indices for each cluster
    pub cluster_members: Vec<Vec<usize>>,
    /// Centroids in normalized feature space
    pub centroids: Vec<Vec<f64>>,
}

impl ClusterResult {
    #[must_use]
    pub fn empty(fields: Vec<String>) -> Self {
        Self {
            fields,
            labels: Vec::new(),
            k: 0,
            sizes: Vec::new(),
            cluster_members: Vec::new(),
            centroids: Vec::new(),
        }
    }

    /// Get summary text
    #[must_use]
    pub fn summary(&self) -> String {
        use std::fmt::Write as _;

        let mut s = format!("K-means clustering with k={}\n", self.k);
        for (i, size) in self.sizes.iter().enumerate() {
            let _ = writeln!(s, "  Cluster {i}: {size} samples");
        }
        s
    }

    /// Get row indices for a specific cluster
    #[must_use]
    pub fn get_cluster(&self, cluster_id: usize) -> Option<&Vec<usize>> {
        self.cluster_members.get(cluster_id)
    }
}

/// Options for clustering
#[derive(Debug, Clone, Default)]
pub struct ClusterOptions {
    pub fields: Option<Vec<String>>,
    /// Number of clusters (0 = auto)
    pub k: usize,
}

// ============================================================================
// Method Selection Types
// ============================================================================

/// Task a method decision is made for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    AnomalyDetection,
    Forecasting,
}

/// Backend chosen by the selector, highest priority first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    Remote,
    LocalModel,
    Statistical,
    None,
}

/// Explanation of which backend a task runs on and why
#[derive(Debug, Clone, Serialize)]
pub struct MethodDecision {
    pub task: TaskKind,
    pub method: MethodKind,
    pub available: bool,
    pub reason: String,
}

// ============================================================================
// Anomaly Types
// ============================================================================

/// Algorithm that produced an anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AnomalyMethod {
    #[serde(rename = "zscore")]
    ZScore,
    #[serde(rename = "iqr")]
    Iqr,
    #[serde(rename = "mad")]
    Mad,
    #[serde(rename = "remote")]
    Remote,
    #[serde(rename = "local_model")]
    LocalModel,
}

impl AnomalyMethod {
    /// Tie-break rank when two methods flag a cell with equal confidence (lower wins)
    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            Self::Remote => 0,
            Self::LocalModel => 1,
            Self::ZScore => 2,
            Self::Iqr => 3,
            Self::Mad => 4,
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::ZScore => "zscore",
            Self::Iqr => "iqr",
            Self::Mad => "mad",
            Self::Remote => "remote",
            Self::LocalModel => "local_model",
        }
    }
}

/// Statistical detector selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    ZScore,
    Iqr,
    Isolation,
    #[default]
    All,
}

impl DetectionMethod {
    #[must_use]
    pub fn runs(self, method: AnomalyMethod) -> bool {
        matches!(
            (self, method),
            (Self::All, _)
                | (Self::ZScore, AnomalyMethod::ZScore)
                | (Self::Iqr, AnomalyMethod::Iqr)
                | (Self::Isolation, AnomalyMethod::Mad)
        )
    }
}

/// Options for anomaly detection
#[derive(Debug, Clone)]
pub struct AnomalyOptions {
    pub fields: Option<Vec<String>>,
    pub method: DetectionMethod,
    pub threshold: f64,
}

impl Default for AnomalyOptions {
    fn default() -> Self {
        Self {
            fields: None,
            method: DetectionMethod::All,
            threshold: config::ZSCORE_THRESHOLD,
        }
    }
}

/// Represents an anomalous cell
#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    pub row_index: usize,
    pub field: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<f64>,
    pub deviation_score: f64,
    pub confidence: f64,
    pub method: AnomalyMethod,
}

/// Counts over the surviving anomalies
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnomalySummary {
    pub total: usize,
    pub by_field: BTreeMap<String, usize>,
    pub by_type: BTreeMap<AnomalyMethod, usize>,
}

/// Result of anomaly detection
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<Anomaly>,
    pub confidence: f64,
    pub summary: AnomalySummary,
    pub decision: MethodDecision,
    /// Backend that actually produced the anomalies
    pub method_used: MethodKind,
}

impl AnomalyReport {
    /// False when no detection method was allowed to run
    #[must_use]
    pub fn method_available(&self) -> bool {
        self.method_used != MethodKind::None
    }
}

// ============================================================================
// Insight Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Trend,
    Correlation,
    Outlier,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A ranked, human-readable finding
#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
    pub fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub confidence: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Half-over-half mean comparison for one field
#[derive(Debug, Clone, Serialize)]
pub struct Trend {
    pub field: String,
    pub direction: TrendDirection,
    /// Absolute relative change in percent
    pub change: f64,
}

/// Result of insight generation
#[derive(Debug, Clone, Default, Serialize)]
pub struct InsightReport {
    pub insights: Vec<Insight>,
    pub trends: Vec<Trend>,
    pub anomalies: Vec<Insight>,
}

// ============================================================================
// Forecast Types
// ============================================================================

/// Requested forecasting method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastMethod {
    Linear,
    Exponential,
    Trend,
    #[default]
    Auto,
}

/// Model that produced the returned predictions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastModel {
    Linear,
    Exponential,
    TrendSeasonal,
    Remote,
    LocalModel,
}

/// Options for forecasting
#[derive(Debug, Clone, Default)]
pub struct ForecastOptions {
    pub field: Option<String>,
    pub method: ForecastMethod,
}

/// One forecast step
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    /// 1-based step ahead of the last observation
    pub horizon_index: usize,
    /// Series position (last observed index + step)
    pub position: usize,
    pub point_estimate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,
    pub confidence: f64,
}

/// Hold-out accuracy of a linear refit
#[derive(Debug, Clone, Serialize)]
pub struct BacktestMetrics {
    pub holdout: usize,
    pub mse: f64,
    pub mae: f64,
    /// `None` when every held-out value is zero
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mape: Option<f64>,
}

/// Trend+seasonality decomposition computed alongside the primary forecast
#[derive(Debug, Clone, Serialize)]
pub struct SeasonalContext {
    pub window: usize,
    pub has_seasonality: bool,
    pub confidence: f64,
}

/// Result of forecasting
#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub predictions: Vec<Prediction>,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<ForecastModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BacktestMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seasonal: Option<SeasonalContext>,
    pub decision: MethodDecision,
}

// ============================================================================
// Chart Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Histogram,
    BoxPlot,
    Gauge,
    BarChart,
    PieChart,
    ScatterChart,
    LineChart,
    AreaChart,
    Heatmap,
    PivotTable,
    Treemap,
    Sunburst,
}

impl ChartType {
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Histogram => "Histogram",
            Self::BoxPlot => "Box plot",
            Self::Gauge => "Gauge",
            Self::BarChart => "Bar chart",
            Self::PieChart => "Pie chart",
            Self::ScatterChart => "Scatter chart",
            Self::LineChart => "Line chart",
            Self::AreaChart => "Area chart",
            Self::Heatmap => "Heatmap",
            Self::PivotTable => "Pivot table",
            Self::Treemap => "Treemap",
            Self::Sunburst => "Sunburst",
        }
    }
}

/// Axis and range hints for a suggestion
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bins: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// A scored visualization candidate
#[derive(Debug, Clone, Serialize)]
pub struct ChartSuggestion {
    pub chart: ChartType,
    pub score: f64,
    pub reason: String,
    pub fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ChartConfig>,
}

/// Result of chart advice
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChartReport {
    pub suggestions: Vec<ChartSuggestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended: Option<ChartType>,
}

// ============================================================================
// Pipeline Types
// ============================================================================

/// Everything one top-level analysis call produces
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub row_count: usize,
    pub profiles: Vec<FieldProfile>,
    pub anomalies: AnomalyReport,
    pub insights: InsightReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<ForecastReport>,
    pub charts: ChartReport,
}

// ============================================================================
// Backend Types
// ============================================================================

/// Per-row verdict returned by the remote anomaly endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteScore {
    pub index: usize,
    pub is_anomaly: bool,
    #[serde(default)]
    pub score: f64,
    pub confidence: f64,
}

/// Forecast returned by the remote time-series endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteForecast {
    pub predictions: Vec<f64>,
    #[serde(default)]
    pub confidence: f64,
}

/// Remote model-serving backend
pub trait RemoteBackend: Send + Sync {
    /// Human-readable location of the backend
    fn name(&self) -> String;

    /// Check the health endpoint
    ///
    /// # Errors
    /// Returns error if the backend is unreachable or unhealthy
    fn health(&self) -> Result<()>;

    /// Score every row of a numeric matrix
    ///
    /// # Errors
    /// Returns error if the request fails or the response is malformed
    fn detect_anomalies(&self, matrix: &[Vec<f64>], contamination: f64)
        -> Result<Vec<RemoteScore>>;

    /// Forecast `steps` values after `series`
    ///
    /// # Errors
    /// Returns error if the request fails or the response is malformed
    fn forecast(&self, series: &[f64], lookback: usize, steps: usize) -> Result<RemoteForecast>;
}

/// Optional in-process learned-model runtime
pub trait LocalModelRuntime: Send + Sync {
    /// Capability check; never fails
    fn is_available(&self) -> bool;

    /// Fit a model to a single numeric series
    ///
    /// # Errors
    /// Returns error if the series is too short or fitting fails
    fn train(&self, series: &[f64], lookback: usize) -> Result<Box<dyn LocalModel>>;
}

/// A trained local model; dropping it releases its resources
pub trait LocalModel {
    /// Reconstruction error per point of `series`
    ///
    /// # Errors
    /// Returns error if scoring fails
    fn score(&self, series: &[f64]) -> Result<Vec<f64>>;

    /// Predict `steps` values following `history`
    ///
    /// # Errors
    /// Returns error if `history` is shorter than the model's lookback
    fn predict(&self, history: &[f64], steps: usize) -> Result<Vec<f64>>;

    /// In-sample goodness of fit in `[0, 1]`
    fn fit_quality(&self) -> f64;
}
