use crate::backend::local::AutoregressiveRuntime;
use crate::backend::remote::HttpBackend;
use crate::config::BackendConfig;
use crate::structs::{
    CancelFlag, LocalModelRuntime, MethodDecision, MethodKind, RemoteBackend, TaskKind,
};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Chooses the backend for each task: remote, then local model, then
/// statistical methods (when allowed), else none
pub struct MethodSelector {
    remote: Option<Box<dyn RemoteBackend>>,
    local: Option<Box<dyn LocalModelRuntime>>,
    statistical_fallback: bool,
    cancel: CancelFlag,
}

impl MethodSelector {
    #[must_use]
    pub fn new(
        remote: Option<Box<dyn RemoteBackend>>,
        local: Option<Box<dyn LocalModelRuntime>>,
        statistical_fallback: bool,
    ) -> Self {
        Self {
            remote,
            local,
            statistical_fallback,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// No ML backends; statistical methods only
    #[must_use]
    pub fn statistical_only() -> Self {
        Self::new(None, None, true)
    }

    /// Build the backends named by the configuration
    #[must_use]
    pub fn from_config(config: &BackendConfig) -> Self {
        let remote = HttpBackend::from_config(config)
            .map(|b| Box::new(b) as Box<dyn RemoteBackend>);
        let local = config
            .local_model
            .then(|| Box::new(AutoregressiveRuntime::default()) as Box<dyn LocalModelRuntime>);
        Self::new(remote, local, config.statistical_fallback)
    }

    /// Share a cancellation flag with the host
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        Arc::clone(&self.cancel)
    }

    /// Start a session for one top-level call; probe results are cached
    /// inside it and never outlive it
    #[must_use]
    pub fn session(&self) -> SelectorSession<'_> {
        SelectorSession {
            selector: self,
            remote_verdict: Cell::new(None),
            local_verdict: Cell::new(None),
        }
    }

    /// Probe the backends afresh and decide
    #[must_use]
    pub fn select_method(&self, task: TaskKind, allow_statistical_fallback: bool) -> MethodDecision {
        self.session().select(task, allow_statistical_fallback)
    }
}

/// Per-call view of a [`MethodSelector`]
pub struct SelectorSession<'a> {
    selector: &'a MethodSelector,
    remote_verdict: Cell<Option<bool>>,
    local_verdict: Cell<Option<bool>>,
}

impl SelectorSession<'_> {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.selector.cancel.load(Ordering::SeqCst)
    }

    /// Whether the remote backend answered its health probe
    #[must_use]
    pub fn remote_available(&self) -> bool {
        if let Some(verdict) = self.remote_verdict.get() {
            return verdict;
        }
        let Some(remote) = self.selector.remote.as_deref() else {
            self.remote_verdict.set(Some(false));
            return false;
        };
        if self.is_cancelled() {
            // Not cached: a cancelled probe says nothing about the backend
            return false;
        }

        let verdict = match remote.health() {
            Ok(()) => {
                tracing::debug!(backend = %remote.name(), "Remote backend healthy");
                true
            }
            Err(e) => {
                tracing::warn!(backend = %remote.name(), error = %e, "Remote backend unavailable");
                false
            }
        };
        self.remote_verdict.set(Some(verdict));
        verdict
    }

    /// Whether the local model runtime reports itself usable
    #[must_use]
    pub fn local_available(&self) -> bool {
        if let Some(verdict) = self.local_verdict.get() {
            return verdict;
        }
        let verdict = self
            .selector
            .local
            .as_deref()
            .is_some_and(|l| l.is_available());
        self.local_verdict.set(Some(verdict));
        verdict
    }

    /// The remote backend, if healthy and the call is not cancelled
    #[must_use]
    pub fn remote(&self) -> Option<&dyn RemoteBackend> {
        if self.is_cancelled() || !self.remote_available() {
            return None;
        }
        self.selector.remote.as_deref()
    }

    /// The local runtime, if available and the call is not cancelled
    #[must_use]
    pub fn local(&self) -> Option<&dyn LocalModelRuntime> {
        if self.is_cancelled() || !self.local_available() {
            return None;
        }
        self.selector.local.as_deref()
    }

    /// Decide which backend `task` runs on
    ///
    /// Statistical fallback is used only if both the caller and the
    /// configuration allow it.
    #[must_use]
    pub fn select(&self, task: TaskKind, allow_statistical_fallback: bool) -> MethodDecision {
        let (method, reason) = if self.remote_available() {
            let name = self
                .selector
                .remote
                .as_deref()
                .map(|r| r.name())
                .unwrap_or_default();
            (
                MethodKind::Remote,
                format!("Remote backend at {name} is available"),
            )
        } else if self.local_available() {
            (
                MethodKind::LocalModel,
                "Local model runtime is available; remote backend is not".to_string(),
            )
        } else if allow_statistical_fallback && self.selector.statistical_fallback {
            (
                MethodKind::Statistical,
                "No ML backend available; using statistical methods".to_string(),
            )
        } else {
            (
                MethodKind::None,
                "No ML backend available and statistical fallback is disabled".to_string(),
            )
        };

        tracing::info!(?task, ?method, %reason, "Method selected");

        MethodDecision {
            task,
            method,
            available: method != MethodKind::None,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_support::{FakeLocal, FakeRemote};

    #[test]
    fn test_statistical_fallback() {
        let selector = MethodSelector::statistical_only();
        let decision = selector.select_method(TaskKind::AnomalyDetection, true);
        assert_eq!(decision.method, MethodKind::Statistical);
        assert!(decision.available);
        assert!(!decision.reason.is_empty());
    }

    #[test]
    fn test_no_method_without_fallback() {
        let selector = MethodSelector::statistical_only();
        let decision = selector.select_method(TaskKind::Forecasting, false);
        assert_eq!(decision.method, MethodKind::None);
        assert!(!decision.available);
    }

    #[test]
    fn test_config_disables_fallback() {
        let selector = MethodSelector::new(None, None, false);
        let decision = selector.select_method(TaskKind::Forecasting, true);
        assert_eq!(decision.method, MethodKind::None);
    }

    #[test]
    fn test_priority_order() {
        let both = MethodSelector::new(
            Some(Box::new(FakeRemote::healthy())),
            Some(Box::new(FakeLocal::default())),
            true,
        );
        assert_eq!(
            both.select_method(TaskKind::Forecasting, true).method,
            MethodKind::Remote
        );

        let down = MethodSelector::new(
            Some(Box::new(FakeRemote::down())),
            Some(Box::new(FakeLocal::default())),
            true,
        );
        assert_eq!(
            down.select_method(TaskKind::Forecasting, false).method,
            MethodKind::LocalModel
        );
    }

    #[test]
    fn test_session_caches_probe() {
        let remote = FakeRemote::healthy();
        let probes = remote.probe_counter();
        let selector = MethodSelector::new(Some(Box::new(remote)), None, true);

        let session = selector.session();
        let _ = session.select(TaskKind::AnomalyDetection, true);
        let _ = session.select(TaskKind::Forecasting, true);
        assert_eq!(probes.load(Ordering::SeqCst), 1);

        let _ = selector.session().select(TaskKind::Forecasting, true);
        assert_eq!(probes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cancelled_session_skips_remote() {
        let cancel = Arc::new(AtomicBool::new(true));
        let selector = MethodSelector::new(Some(Box::new(FakeRemote::healthy())), None, true)
            .with_cancel_flag(Arc::clone(&cancel));
        let session = selector.session();

        assert!(session.remote().is_none());
        assert_eq!(
            session.select(TaskKind::AnomalyDetection, true).method,
            MethodKind::Statistical
        );
    }
}
