use crate::cli::ServeArgs;
use crate::infra::{AppState, RunCoordinator, RunReport};
use crate::routes::router;
use crate::runner::ConfiguredBatch;
use address_recon::config::AppConfig;
use address_recon::error::AppError;
use address_recon::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let shutdown = CancellationToken::new();
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let runs = Arc::new(RunCoordinator::new(
        Arc::new(ConfiguredBatch::new(&config)),
        shutdown.clone(),
    ));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        runs: runs.clone(),
    };

    let app = router()
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "address reconciliation service ready");

    let startup = args.run_on_start.then(|| runs.spawn());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    finish_runs(&runs, startup).await;
    Ok(())
}

/// Waits for the startup batch and any request-driven batch so their checkpoints
/// commit before the process exits.
async fn finish_runs(
    runs: &RunCoordinator,
    startup: Option<JoinHandle<Result<RunReport, AppError>>>,
) {
    if let Some(handle) = startup {
        match handle.await {
            Ok(Ok(report)) => info!(
                run_id = report.run_id,
                "startup reconciliation run finished"
            ),
            Ok(Err(err)) => warn!(error = %err, "startup reconciliation run did not complete"),
            Err(err) => error!(error = %err, "startup reconciliation task aborted"),
        }
    }
    runs.idle().await;
}

/// Resolves on Ctrl-C and cancels any batch in flight so it stops between records.
async fn shutdown_signal(shutdown: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
    shutdown.cancel();
}
