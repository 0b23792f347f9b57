use crate::config::BackendConfig;
use crate::structs::{DatasenseError, RemoteBackend, RemoteForecast, RemoteScore, Result};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const API_PREFIX: &str = "/api/v1/ml";
const MODEL_ID: &str = "datasense";

#[derive(Debug, Deserialize)]
struct AnomalyPredictResponse {
    predictions: Vec<RemoteScore>,
}

/// Model server reached over blocking HTTP
pub struct HttpBackend {
    base_url: String,
    probe_timeout: Duration,
    request_timeout: Duration,
}

impl HttpBackend {
    #[must_use]
    pub fn new(base_url: &str, probe_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            probe_timeout,
            request_timeout,
        }
    }

    /// Backend for the configured URL, if any
    #[must_use]
    pub fn from_config(config: &BackendConfig) -> Option<Self> {
        config
            .remote_url
            .as_deref()
            .map(|url| Self::new(url, config.probe_timeout, config.request_timeout))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base_url)
    }

    fn post(&self, path: &str, body: &serde_json::Value) -> Result<ureq::Response> {
        let response = ureq::post(&self.endpoint(path))
            .query("model_id", MODEL_ID)
            .set("Content-Type", "application/json")
            .timeout(self.request_timeout)
            .send_json(body)?;
        Ok(response)
    }
}

impl RemoteBackend for HttpBackend {
    fn name(&self) -> String {
        self.base_url.clone()
    }

    fn health(&self) -> Result<()> {
        let response = ureq::get(&self.endpoint("/models"))
            .timeout(self.probe_timeout)
            .call()?;

        if response.status() == 200 {
            Ok(())
        } else {
            Err(DatasenseError::Backend(format!(
                "Health check returned status {}",
                response.status()
            )))
        }
    }

    fn detect_anomalies(
        &self,
        matrix: &[Vec<f64>],
        contamination: f64,
    ) -> Result<Vec<RemoteScore>> {
        self.post(
            "/anomaly-detection/train",
            &json!({ "data": matrix, "contamination": contamination }),
        )?;

        let parsed: AnomalyPredictResponse = self
            .post("/anomaly-detection/predict", &json!(matrix))?
            .into_json()
            .map_err(|e| DatasenseError::Backend(format!("Failed to parse response: {e}")))?;

        Ok(parsed.predictions)
    }

    fn forecast(&self, series: &[f64], lookback: usize, steps: usize) -> Result<RemoteForecast> {
        let body = json!({ "data": series, "lookback": lookback, "steps": steps });
        self.post("/time-series/train", &body)?;

        let forecast: RemoteForecast = self
            .post("/time-series/predict", &body)?
            .into_json()
            .map_err(|e| DatasenseError::Backend(format!("Failed to parse response: {e}")))?;

        if forecast.predictions.len() != steps {
            return Err(DatasenseError::Backend(format!(
                "Expected {steps} predictions, got {}",
                forecast.predictions.len()
            )));
        }
        Ok(forecast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("local addr").port()
    }

    #[test]
    fn test_endpoint_paths() {
        let backend = HttpBackend::new(
            "http://localhost:8000/",
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        assert_eq!(backend.name(), "http://localhost:8000");
        assert_eq!(
            backend.endpoint("/time-series/train"),
            "http://localhost:8000/api/v1/ml/time-series/train"
        );
    }

    #[test]
    fn test_unreachable_backend_fails_health() {
        let url = format!("http://127.0.0.1:{}", free_port());
        let backend = HttpBackend::new(&url, Duration::from_millis(300), Duration::from_millis(300));
        assert!(backend.health().is_err());
        assert!(backend.forecast(&[1.0, 2.0, 3.0], 2, 1).is_err());
    }

    #[test]
    fn test_from_config_requires_url() {
        assert!(HttpBackend::from_config(&BackendConfig::default()).is_none());
        let config = BackendConfig {
            remote_url: Some("http://ml:9000".into()),
            ..BackendConfig::default()
        };
        assert!(HttpBackend::from_config(&config).is_some());
    }
}
