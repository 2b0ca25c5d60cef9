use address_recon::error::AppError;
use address_recon::workflows::reconciliation::BatchSummary;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) runs: Arc<RunCoordinator>,
}

/// Starts one reconciliation batch and reports its summary.
#[async_trait]
pub(crate) trait BatchLauncher: Send + Sync {
    async fn launch(&self, cancel: &CancellationToken) -> Result<BatchSummary, AppError>;
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RunReport {
    pub(crate) run_id: u64,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) summary: Option<BatchSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

/// Serializes batch runs: at most one is active, and the last finished run is kept
/// for the `latest` endpoint.
pub(crate) struct RunCoordinator {
    launcher: Arc<dyn BatchLauncher>,
    active: tokio::sync::Mutex<()>,
    latest: Mutex<Option<RunReport>>,
    next_id: AtomicU64,
    shutdown: CancellationToken,
}

impl RunCoordinator {
    pub(crate) fn new(launcher: Arc<dyn BatchLauncher>, shutdown: CancellationToken) -> Self {
        Self {
            launcher,
            active: tokio::sync::Mutex::new(()),
            latest: Mutex::new(None),
            next_id: AtomicU64::new(1),
            shutdown,
        }
    }

    pub(crate) async fn execute(&self) -> Result<RunReport, AppError> {
        let _running = self
            .active
            .try_lock()
            .map_err(|_| AppError::RunInProgress)?;

        let run_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let started_at = Utc::now();
        info!(run_id, "reconciliation run started");

        let result = self.launcher.launch(&self.shutdown).await;
        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            summary: result.as_ref().ok().cloned(),
            error: result.as_ref().err().map(ToString::to_string),
        };

        match &result {
            Ok(summary) => info!(
                run_id,
                persisted = summary.persisted,
                "reconciliation run finished"
            ),
            Err(err) => error!(run_id, error = %err, "reconciliation run failed"),
        }

        *self.latest.lock().expect("latest run mutex poisoned") = Some(report.clone());
        result.map(|_| report)
    }

    /// Runs a batch on its own task. The handle lets shutdown wait for it to finish.
    pub(crate) fn spawn(self: &Arc<Self>) -> JoinHandle<Result<RunReport, AppError>> {
        let runs = Arc::clone(self);
        tokio::spawn(async move { runs.execute().await })
    }

    /// Resolves once no run is active.
    pub(crate) async fn idle(&self) {
        drop(self.active.lock().await);
    }

    pub(crate) fn latest(&self) -> Option<RunReport> {
        self.latest
            .lock()
            .expect("latest run mutex poisoned")
            .clone()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use address_recon::workflows::reconciliation::{BatchError, SourceError};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tokio::sync::Notify;

    /// Launcher that returns a fixed summary, optionally holding until released.
    #[derive(Default)]
    pub(crate) struct StubLauncher {
        pub(crate) summary: BatchSummary,
        pub(crate) fail: bool,
        pub(crate) gate: Option<Arc<Notify>>,
        pub(crate) started: Arc<Notify>,
        /// Holds until the shutdown token fires, then reports a cancelled batch.
        pub(crate) until_cancelled: bool,
    }

    #[async_trait]
    impl BatchLauncher for StubLauncher {
        async fn launch(&self, cancel: &CancellationToken) -> Result<BatchSummary, AppError> {
            self.started.notify_one();
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.until_cancelled {
                cancel.cancelled().await;
                tokio::task::yield_now().await;
                return Ok(BatchSummary {
                    cancelled: true,
                    ..self.summary.clone()
                });
            }
            if self.fail {
                return Err(AppError::Batch(BatchError::Source(
                    SourceError::Unavailable("export missing".to_string()),
                )));
            }
            Ok(self.summary.clone())
        }
    }

    pub(crate) fn state_with(launcher: StubLauncher) -> AppState {
        let recorder = PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(recorder.handle()),
            runs: Arc::new(RunCoordinator::new(
                Arc::new(launcher),
                CancellationToken::new(),
            )),
        }
    }
}
