use crate::infra::BatchLauncher;
use address_recon::config::{AppConfig, BatchConfig, VerificationConfig};
use address_recon::error::AppError;
use address_recon::storage::{CsvRecordSource, CsvResultSink, JsonCheckpointLog};
use address_recon::telemetry;
use address_recon::workflows::reconciliation::{
    diff, normalize, BatchDriver, BatchSummary, ChangeStatus, MinIntervalPacer, RawAddressRow,
    RecordKey, ResolvedAddress, Strategy,
};
use address_recon::workflows::usps::UspsClient;
use async_trait::async_trait;
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Runs batches against USPS Web Tools with the file-backed source, sink and log.
pub(crate) struct ConfiguredBatch {
    batch: BatchConfig,
    verification: VerificationConfig,
}

impl ConfiguredBatch {
    pub(crate) fn new(config: &AppConfig) -> Self {
        Self {
            batch: config.batch.clone(),
            verification: config.verification.clone(),
        }
    }
}

#[async_trait]
impl BatchLauncher for ConfiguredBatch {
    async fn launch(&self, cancel: &CancellationToken) -> Result<BatchSummary, AppError> {
        run_batch(&self.batch, &self.verification, cancel).await
    }
}

pub(crate) async fn run_batch(
    batch: &BatchConfig,
    verification: &VerificationConfig,
    cancel: &CancellationToken,
) -> Result<BatchSummary, AppError> {
    let client = Arc::new(UspsClient::new(verification)?);
    let log = Arc::new(JsonCheckpointLog::new(&batch.checkpoint_path));
    let source = CsvRecordSource::new(&batch.source_path).skipping_checked(log.clone());
    let sink = Arc::new(CsvResultSink::open(&batch.output_path)?);

    let pacer = MinIntervalPacer::new(batch.min_interval);
    let mut driver = BatchDriver::new(client, sink, log, pacer);
    Ok(driver.run_source(&source, cancel).await?)
}

#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Address summary export to read (defaults to RECON_SOURCE_PATH)
    #[arg(long)]
    pub(crate) source: Option<PathBuf>,
    /// Validation CSV to append to (defaults to RECON_OUTPUT_PATH)
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Checked log to read and update (defaults to RECON_CHECKPOINT_PATH)
    #[arg(long)]
    pub(crate) checkpoint: Option<PathBuf>,
    /// Minimum milliseconds between record dispatches
    #[arg(long)]
    pub(crate) min_interval_ms: Option<u64>,
}

impl RunArgs {
    fn apply(self, batch: &mut BatchConfig) {
        if let Some(source) = self.source {
            batch.source_path = source;
        }
        if let Some(output) = self.output {
            batch.output_path = output;
        }
        if let Some(checkpoint) = self.checkpoint {
            batch.checkpoint_path = checkpoint;
        }
        if let Some(millis) = self.min_interval_ms {
            batch.min_interval = Duration::from_millis(millis);
        }
    }
}

pub(crate) async fn run_once(args: RunArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    args.apply(&mut config.batch);
    telemetry::init(&config.telemetry)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing the current record");
            on_signal.cancel();
        }
    });

    let summary = run_batch(&config.batch, &config.verification, &cancel).await?;
    println!("{}", render_summary(&summary, &config.batch));
    Ok(())
}

pub(crate) fn render_summary(summary: &BatchSummary, batch: &BatchConfig) -> String {
    let outcome = if summary.cancelled {
        "cancelled"
    } else {
        "complete"
    };
    let mut lines = vec![
        format!("Address reconciliation {outcome}"),
        format!("  Source:       {}", batch.source_path.display()),
        format!("  Output:       {}", batch.output_path.display()),
        format!("  Considered:   {}", summary.considered),
        format!("  Persisted:    {}", summary.persisted),
        format!("  Unchanged:    {}", summary.unchanged),
        format!("  Exhausted:    {}", summary.exhausted),
        format!("  Checkpointed: {}", summary.checkpointed),
    ];

    if !summary.malformed.is_empty() {
        lines.push(format!("  Malformed ({}):", summary.malformed.len()));
        lines.extend(
            summary
                .malformed
                .iter()
                .map(|rejected| format!("    - {}", rejected.reason)),
        );
    }
    if !summary.dropped.is_empty() {
        lines.push(format!(
            "  Dropped after sink failure ({}), retried next run:",
            summary.dropped.len()
        ));
        lines.extend(summary.dropped.iter().map(|key| format!("    - {key}")));
    }

    lines.join("\n")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum StrategyArg {
    #[default]
    Zip,
    Address1,
    Address2,
}

impl From<StrategyArg> for Strategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Zip => Strategy::ZipLookup,
            StrategyArg::Address1 => Strategy::Address1Lookup,
            StrategyArg::Address2 => Strategy::Address2Lookup,
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct DiffArgs {
    /// Original street line
    #[arg(long)]
    pub(crate) address1: String,
    /// Original secondary line
    #[arg(long)]
    pub(crate) address2: Option<String>,
    #[arg(long)]
    pub(crate) city: String,
    #[arg(long)]
    pub(crate) state: String,
    #[arg(long)]
    pub(crate) zip: String,
    /// Lookup the candidate came from
    #[arg(long, value_enum, default_value_t = StrategyArg::Zip)]
    pub(crate) strategy: StrategyArg,
    /// Candidate street line (ignored for zip lookups)
    #[arg(long)]
    pub(crate) candidate_address1: Option<String>,
    /// Candidate secondary line (ignored for zip lookups)
    #[arg(long)]
    pub(crate) candidate_address2: Option<String>,
    #[arg(long)]
    pub(crate) candidate_city: String,
    #[arg(long)]
    pub(crate) candidate_state: String,
    #[arg(long)]
    pub(crate) candidate_zip: String,
}

pub(crate) fn run_diff(args: DiffArgs) -> Result<(), AppError> {
    let status = compare(args)?;
    println!("{}", status.summary());
    Ok(())
}

pub(crate) fn compare(args: DiffArgs) -> Result<ChangeStatus, AppError> {
    let original = normalize(RawAddressRow {
        key: RecordKey::default(),
        address1: Some(args.address1),
        address2: args.address2,
        city: Some(args.city),
        state: Some(args.state),
        zip: Some(args.zip),
    })?;

    let strategy = Strategy::from(args.strategy);
    let street_lines = strategy != Strategy::ZipLookup;
    let candidate = ResolvedAddress {
        address1: args.candidate_address1.filter(|_| street_lines),
        address2: args.candidate_address2.filter(|_| street_lines),
        city: args.candidate_city,
        state: args.candidate_state,
        zip: args.candidate_zip,
        strategy,
    };

    Ok(diff(&original, &candidate))
}
