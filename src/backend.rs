pub mod local;
pub mod remote;
pub mod selector;

pub use local::{AutoregressiveModel, AutoregressiveRuntime};
pub use remote::HttpBackend;
pub use selector::{MethodSelector, SelectorSession};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::backend::local::AutoregressiveModel;
    use crate::structs::{
        DatasenseError, LocalModel, LocalModelRuntime, RemoteBackend, RemoteForecast,
        RemoteScore, Result,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted remote backend
    #[derive(Default)]
    pub struct FakeRemote {
        pub healthy: bool,
        pub scores: Vec<RemoteScore>,
        pub forecast: Option<Vec<f64>>,
        pub probes: Arc<AtomicUsize>,
    }

    impl FakeRemote {
        pub fn healthy() -> Self {
            Self {
                healthy: true,
                ..Self::default()
            }
        }

        pub fn down() -> Self {
            Self::default()
        }

        pub fn probe_counter(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.probes)
        }
    }

    impl RemoteBackend for FakeRemote {
        fn name(&self) -> String {
            "fake://remote".into()
        }

        fn health(&self) -> Result<()> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.healthy {
                Ok(())
            } else {
                Err(DatasenseError::Backend("connection refused".into()))
            }
        }

        fn detect_anomalies(&self, _matrix: &[Vec<f64>], _contamination: f64) -> Result<Vec<RemoteScore>> {
            Ok(self.scores.clone())
        }

        fn forecast(&self, _series: &[f64], _lookback: usize, steps: usize) -> Result<RemoteForecast> {
            match &self.forecast {
                Some(predictions) => Ok(RemoteForecast {
                    predictions: predictions.iter().copied().take(steps).collect(),
                    confidence: 0.8,
                }),
                None => Err(DatasenseError::Backend("no forecast scripted".into())),
            }
        }
    }

    /// Local runtime that can be switched off, or made to fail on series
    /// containing a given value
    pub struct FakeLocal {
        pub available: bool,
        pub fail_on: Option<f64>,
    }

    impl Default for FakeLocal {
        fn default() -> Self {
            Self {
                available: true,
                fail_on: None,
            }
        }
    }

    impl LocalModelRuntime for FakeLocal {
        fn is_available(&self) -> bool {
            self.available
        }

        fn train(&self, series: &[f64], lookback: usize) -> Result<Box<dyn LocalModel>> {
            if let Some(bad) = self.fail_on {
                if series.iter().any(|v| (v - bad).abs() < f64::EPSILON) {
                    return Err(DatasenseError::Ml("training diverged".into()));
                }
            }
            Ok(Box::new(AutoregressiveModel::fit(series, lookback, 1e-3)?))
        }
    }
}
