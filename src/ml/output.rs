//! Report writers for the analyze command

use crate::structs::{AnalysisReport, Anomaly, ForecastReport, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Write every report file into `output_dir`, returning the paths written
///
/// # Errors
/// Returns error if the directory or a file cannot be written
pub fn write_all(output_dir: &Path, source: &str, report: &AnalysisReport) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;

    let mut written = vec![
        write_summary(output_dir, &build_summary(source, report))?,
        write_anomalies(output_dir, &report.anomalies.anomalies)?,
    ];
    if let Some(forecast) = &report.forecast {
        written.push(write_forecast(output_dir, forecast)?);
    }
    written.push(write_report_json(output_dir, report)?);

    Ok(written)
}

/// Human-readable overview of an analysis
#[must_use]
pub fn build_summary(source: &str, report: &AnalysisReport) -> String {
    let mut s = String::new();

    let _ = writeln!(s, "Analysis of {source}");
    let _ = writeln!(s, "Rows: {}", report.row_count);
    let _ = writeln!(s);

    let _ = writeln!(s, "Fields:");
    for profile in &report.profiles {
        let _ = writeln!(s, "  {}", profile.summary());
    }
    let _ = writeln!(s);

    let anomalies = &report.anomalies;
    let _ = writeln!(
        s,
        "Anomalies: {} (method: {:?}, mean confidence {:.2})",
        anomalies.summary.total, anomalies.method_used, anomalies.confidence
    );
    let _ = writeln!(s, "  Decision: {}", anomalies.decision.reason);
    for (field, count) in &anomalies.summary.by_field {
        let _ = writeln!(s, "  {field}: {count}");
    }
    let _ = writeln!(s);

    let _ = writeln!(s, "Insights:");
    for insight in &report.insights.insights {
        let _ = writeln!(
            s,
            "  [{:?}] {} ({:.2}) - {}",
            insight.severity, insight.title, insight.confidence, insight.description
        );
    }
    let _ = writeln!(s);

    if let Some(forecast) = &report.forecast {
        let _ = writeln!(
            s,
            "Forecast of {}: {} steps, model {:?}, confidence {:.2}",
            forecast.field.as_deref().unwrap_or("-"),
            forecast.predictions.len(),
            forecast.method,
            forecast.confidence
        );
        if let Some(metrics) = &forecast.metrics {
            let _ = writeln!(
                s,
                "  Backtest on last {}: MSE {:.4}, MAE {:.4}",
                metrics.holdout, metrics.mse, metrics.mae
            );
        }
        let _ = writeln!(s);
    }

    if let Some(chart) = report.charts.recommended {
        let _ = writeln!(s, "Recommended chart: {}", chart.display_name());
    }

    s
}

/// Write `summary.txt`
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_summary(output_dir: &Path, content: &str) -> Result<PathBuf> {
    let path = output_dir.join("summary.txt");
    fs::write(&path, content)?;
    Ok(path)
}

/// Write `anomalies.csv`
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_anomalies(output_dir: &Path, anomalies: &[Anomaly]) -> Result<PathBuf> {
    let path = output_dir.join("anomalies.csv");
    let mut content =
        String::from("row_index,field,method,value,expected_value,deviation_score,confidence\n");

    for anomaly in anomalies {
        let expected = anomaly
            .expected_value
            .map(|v| format!("{v:.4}"))
            .unwrap_or_default();
        let escaped_field = anomaly.field.replace('"', "\"\"");
        let _ = writeln!(
            content,
            "{},\"{escaped_field}\",{},{},{expected},{:.4},{:.4}",
            anomaly.row_index,
            anomaly.method.display_name(),
            anomaly.value,
            anomaly.deviation_score,
            anomaly.confidence
        );
    }

    fs::write(&path, content)?;
    Ok(path)
}

/// Write `forecast.csv`
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_forecast(output_dir: &Path, forecast: &ForecastReport) -> Result<PathBuf> {
    let path = output_dir.join("forecast.csv");
    let mut content =
        String::from("horizon_index,position,point_estimate,lower_bound,upper_bound,confidence\n");

    let bound = |b: Option<f64>| b.map(|v| format!("{v:.4}")).unwrap_or_default();
    for p in &forecast.predictions {
        let _ = writeln!(
            content,
            "{},{},{:.4},{},{},{:.4}",
            p.horizon_index,
            p.position,
            p.point_estimate,
            bound(p.lower_bound),
            bound(p.upper_bound),
            p.confidence
        );
    }

    fs::write(&path, content)?;
    Ok(path)
}

/// Write `report.json`
///
/// # Errors
/// Returns error if serialization fails or file cannot be written
pub fn write_report_json(output_dir: &Path, report: &AnalysisReport) -> Result<PathBuf> {
    let path = output_dir.join("report.json");
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MethodSelector;
    use crate::config::AnalysisConfig;
    use crate::ml::pipeline::analyze;
    use crate::structs::{AnomalyMethod, Dataset};
    use tempfile::TempDir;

    fn sample_report() -> AnalysisReport {
        let mut values: Vec<f64> = (0..30).map(|i| f64::from(i % 5) + 10.0).collect();
        values[12] = 900.0;
        let data = Dataset::from_numeric_columns(&[("load", &values)]);
        analyze(&data, 3, &MethodSelector::statistical_only(), &AnalysisConfig::default())
            .expect("analyze")
    }

    #[test]
    fn test_write_summary() {
        let dir = TempDir::new().expect("create temp dir");
        write_summary(dir.path(), "Test summary content").expect("write summary");

        let content = fs::read_to_string(dir.path().join("summary.txt")).expect("read");
        assert_eq!(content, "Test summary content");
    }

    #[test]
    fn test_write_anomalies() {
        let dir = TempDir::new().expect("create temp dir");
        let anomalies = vec![
            Anomaly {
                row_index: 1,
                field: "price".to_string(),
                value: 999.0,
                expected_value: Some(100.0),
                deviation_score: 4.2,
                confidence: 0.95,
                method: AnomalyMethod::ZScore,
            },
            Anomaly {
                row_index: 5,
                field: "rating".to_string(),
                value: 1.0,
                expected_value: None,
                deviation_score: 3.5,
                confidence: 0.87,
                method: AnomalyMethod::LocalModel,
            },
        ];

        write_anomalies(dir.path(), &anomalies).expect("write anomalies");

        let content = fs::read_to_string(dir.path().join("anomalies.csv")).expect("read");
        assert!(content.starts_with("row_index,field,method"));
        assert!(content.contains("1,\"price\",zscore,999,100.0000,4.2000,0.9500"));
        assert!(content.contains("5,\"rating\",local_model,1,,3.5000,0.8700"));
    }

    #[test]
    fn test_write_all() {
        let dir = TempDir::new().expect("create temp dir");
        let out = dir.path().join("nested");
        let report = sample_report();
        let written = write_all(&out, "load.csv", &report).expect("write all");

        assert_eq!(written.len(), 4);
        assert!(written.iter().all(|p| p.exists()));

        let summary = fs::read_to_string(out.join("summary.txt")).expect("read");
        assert!(summary.contains("Analysis of load.csv"));
        assert!(summary.contains("Rows: 30"));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("report.json")).expect("read"))
                .expect("parse");
        assert_eq!(json["row_count"], 30);

        let forecast = fs::read_to_string(out.join("forecast.csv")).expect("read");
        assert_eq!(forecast.lines().count(), 4);
    }
}
