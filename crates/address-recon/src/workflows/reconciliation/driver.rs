use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::cascade::CascadingResolver;
use super::domain::{RawAddressRow, ReconciliationOutcome, RecordKey};
use super::normalizer::normalize;
use super::pacing::DispatchPacer;
use super::repository::{
    CheckpointError, CheckpointWriter, RecordSource, ResultSink, SinkError, SourceError,
    VerificationClient,
};

/// Row that failed normalization. It is still written to the sink as an error outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
    pub key: RecordKey,
    pub reason: String,
}

/// Tally of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Rows taken from the input before the run stopped.
    pub considered: usize,
    /// Outcomes the sink accepted, malformed rows included.
    pub persisted: usize,
    /// Clean zip matches, which produce no outcome.
    pub unchanged: usize,
    /// Records for which every lookup failed; these are persisted as error outcomes.
    pub exhausted: usize,
    pub malformed: Vec<RejectedRecord>,
    /// Outcomes lost after the sink retry; left unchecked so the next run retries them.
    pub dropped: Vec<RecordKey>,
    pub checkpointed: usize,
    pub cancelled: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Runs the cascade over a batch, one record at a time.
pub struct BatchDriver<V: ?Sized, S: ?Sized, C: ?Sized> {
    resolver: CascadingResolver<V>,
    sink: Arc<S>,
    checkpoint: Arc<C>,
    pacer: Box<dyn DispatchPacer>,
}

impl<V, S, C> BatchDriver<V, S, C>
where
    V: VerificationClient + ?Sized,
    S: ResultSink + ?Sized,
    C: CheckpointWriter + ?Sized,
{
    pub fn new<P>(client: Arc<V>, sink: Arc<S>, checkpoint: Arc<C>, pacer: P) -> Self
    where
        P: DispatchPacer + 'static,
    {
        Self {
            resolver: CascadingResolver::new(client),
            sink,
            checkpoint,
            pacer: Box::new(pacer),
        }
    }

    /// Pulls the unprocessed rows from `source` and runs them. A source failure aborts
    /// before anything is dispatched.
    pub async fn run_source<R>(
        &mut self,
        source: &R,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary, BatchError>
    where
        R: RecordSource + ?Sized,
    {
        let rows = source.unprocessed().await?;
        self.run(rows, cancel).await
    }

    /// Reconciles `rows` in order and commits the checkpoint once at the end.
    ///
    /// Cancellation is honored between records: the in-flight cascade and its sink
    /// write complete, no further record is dispatched, and the keys handled so far
    /// are still checkpointed.
    pub async fn run<I>(
        &mut self,
        rows: I,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary, BatchError>
    where
        I: IntoIterator<Item = RawAddressRow>,
    {
        let mut summary = BatchSummary::default();
        let mut processed = Vec::new();

        info!("address reconciliation batch started");

        for row in rows {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let original = match normalize(row) {
                Ok(original) => original,
                Err(err) => {
                    summary.considered += 1;
                    warn!(
                        key = %err.key,
                        field = err.field,
                        "recording malformed record as an error"
                    );
                    summary.malformed.push(RejectedRecord {
                        key: err.key.clone(),
                        reason: err.to_string(),
                    });
                    self.record(ReconciliationOutcome::from(err), &mut summary, &mut processed)
                        .await;
                    continue;
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                _ = self.pacer.ready() => {}
            }
            summary.considered += 1;

            let result = self.resolver.resolve(&original).await;
            let key = original.key().clone();
            if result.is_exhausted() {
                summary.exhausted += 1;
                warn!(key = %key, "every verification strategy failed");
            }

            match result.into_outcome(original) {
                Some(outcome) => self.record(outcome, &mut summary, &mut processed).await,
                None => {
                    summary.unchanged += 1;
                    processed.push(key);
                }
            }
        }

        if summary.cancelled {
            warn!(
                considered = summary.considered,
                "batch cancelled; remaining records left for the next run"
            );
        }

        self.checkpoint.mark_all_processed(&processed).await?;
        summary.checkpointed = processed.len();

        info!(
            considered = summary.considered,
            persisted = summary.persisted,
            unchanged = summary.unchanged,
            exhausted = summary.exhausted,
            malformed = summary.malformed.len(),
            dropped = summary.dropped.len(),
            "address reconciliation batch finished"
        );

        Ok(summary)
    }

    /// Hands `outcome` to the sink. Its key is checkpointed only once the sink accepts it.
    async fn record(
        &self,
        outcome: ReconciliationOutcome,
        summary: &mut BatchSummary,
        processed: &mut Vec<RecordKey>,
    ) {
        let key = outcome.key().clone();
        match self.persist(&outcome).await {
            Ok(()) => {
                summary.persisted += 1;
                processed.push(key);
            }
            Err(err) => {
                error!(key = %key, error = %err, "dropping outcome after sink failure");
                summary.dropped.push(key);
            }
        }
    }

    async fn persist(&self, outcome: &ReconciliationOutcome) -> Result<(), SinkError> {
        match self.sink.persist(outcome).await {
            Err(err) if err.is_transient() => {
                warn!(key = %outcome.key(), error = %err, "retrying sink write");
                self.sink.persist(outcome).await
            }
            other => other,
        }
    }
}
