//! Analysis pipeline that runs every analysis over one dataset

use crate::backend::MethodSelector;
use crate::config::AnalysisConfig;
use crate::ml::{anomaly, charts, classify, forecast, insights};
use crate::structs::{
    AnalysisReport, AnomalyOptions, Dataset, DatasenseError, DetectionMethod, ForecastOptions,
    Result,
};

/// Run classification, anomaly detection, insights, a forecast of the default
/// numeric field and chart suggestions
///
/// Every stage shares one selector session, so each backend is probed at
/// most once per call.
///
/// # Errors
/// Returns error if the dataset is empty or `horizon` is zero
pub fn analyze(
    dataset: &Dataset,
    horizon: usize,
    selector: &MethodSelector,
    config: &AnalysisConfig,
) -> Result<AnalysisReport> {
    if horizon == 0 {
        return Err(DatasenseError::InvalidArgument(
            "Forecast horizon must be at least 1".into(),
        ));
    }

    let session = selector.session();
    let profiles = classify::classify(dataset, None)?;
    tracing::info!(
        rows = dataset.row_count(),
        columns = profiles.len(),
        "Classified dataset"
    );

    let anomaly_options = AnomalyOptions {
        fields: None,
        method: DetectionMethod::All,
        threshold: config.zscore_threshold,
    };
    let anomalies = anomaly::detect(dataset, &anomaly_options, &session, config)?;
    let insights = insights::generate(dataset, config)?;

    let profile_refs: Vec<_> = profiles.iter().collect();
    let forecast = match forecast::default_field(dataset, &profile_refs) {
        Some(field) => {
            let options = ForecastOptions {
                field: Some(field),
                ..ForecastOptions::default()
            };
            Some(forecast::forecast(dataset, horizon, &options, &session, config)?)
        }
        None => None,
    };

    let charts = charts::suggest(dataset, None)?;

    Ok(AnalysisReport {
        row_count: dataset.row_count(),
        profiles,
        anomalies,
        insights,
        forecast,
        charts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_support::FakeRemote;
    use crate::structs::{MethodKind, Value};
    use std::io::Write;
    use std::sync::atomic::Ordering;
    use tempfile::NamedTempFile;

    fn create_test_dataset() -> Dataset {
        let content = "name,x,y,z\na,1.0,10.0,100.0\nb,2.0,20.0,200.0\nc,3.0,30.0,300.0\nd,4.0,40.0,400.0\ne,5.0,50.0,500.0\nf,100.0,1.0,1.0";
        let mut file = NamedTempFile::new().expect("create");
        file.write_all(content.as_bytes()).expect("write");
        Dataset::from_csv_path(file.path(), false).expect("parse")
    }

    #[test]
    fn test_full_pipeline() {
        let data = create_test_dataset();
        let selector = MethodSelector::statistical_only();
        let report = analyze(&data, 3, &selector, &AnalysisConfig::default()).expect("analyze");

        assert_eq!(report.row_count, 6);
        assert_eq!(report.profiles.len(), 4);
        assert_eq!(report.anomalies.method_used, MethodKind::Statistical);
        let forecast = report.forecast.expect("forecast");
        assert_eq!(forecast.field.as_deref(), Some("x"));
        assert_eq!(forecast.predictions.len(), 3);
        assert!(report.charts.recommended.is_some());
    }

    #[test]
    fn test_session_probes_once() {
        let remote = FakeRemote::down();
        let probes = remote.probe_counter();
        let selector = MethodSelector::new(Some(Box::new(remote)), None, true);

        let report = analyze(&create_test_dataset(), 2, &selector, &AnalysisConfig::default())
            .expect("analyze");
        assert_eq!(probes.load(Ordering::SeqCst), 1);
        assert_eq!(report.anomalies.decision.method, MethodKind::Statistical);
    }

    #[test]
    fn test_no_numeric_fields() {
        let data = Dataset::from_records(vec![
            vec![("city", Value::Text("Oslo".into()))],
            vec![("city", Value::Text("Rome".into()))],
        ]);
        let selector = MethodSelector::statistical_only();
        let report = analyze(&data, 2, &selector, &AnalysisConfig::default()).expect("analyze");

        assert!(report.forecast.is_none());
        assert!(report.anomalies.anomalies.is_empty());
        assert!(report.insights.insights.is_empty());
    }

    #[test]
    fn test_invalid_arguments() {
        let selector = MethodSelector::statistical_only();
        let config = AnalysisConfig::default();
        assert!(analyze(&create_test_dataset(), 0, &selector, &config).is_err());
        assert!(analyze(&Dataset::default(), 2, &selector, &config).is_err());
    }
}
