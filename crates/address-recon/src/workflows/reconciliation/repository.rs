use async_trait::async_trait;

use super::domain::{
    RawAddressRow, ReconciliationOutcome, RecordKey, StreetCandidate, ZipCandidate,
};

/// Street-level query. `street1` is the primary line; the service has no separate
/// notion of a second line beyond `street2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressQuery {
    pub street1: String,
    pub street2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Outbound verification service. Implementations must not be called concurrently by
/// the engine; the batch driver serializes every call.
#[async_trait]
pub trait VerificationClient: Send + Sync {
    async fn lookup_by_zip(&self, zip5: &str) -> Result<ZipCandidate, VerificationError>;

    async fn lookup_by_address(
        &self,
        query: &AddressQuery,
    ) -> Result<StreetCandidate, VerificationError>;
}

/// Verification failure. Only the message matters to the cascade.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("{0}")]
    Service(String),
    #[error("verification transport failed: {0}")]
    Transport(String),
    #[error("unexpected verification response: {0}")]
    Response(String),
}

impl VerificationError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Yields rows that have not been checked yet.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn unprocessed(&self) -> Result<Vec<RawAddressRow>, SourceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("record source unavailable: {0}")]
    Unavailable(String),
    #[error("record source returned unreadable data: {0}")]
    Decode(String),
}

/// Persists reconciliation outcomes as they are produced.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn persist(&self, outcome: &ReconciliationOutcome) -> Result<(), SinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("result sink temporarily unavailable: {0}")]
    Transient(String),
    #[error("result sink rejected the outcome: {0}")]
    Rejected(String),
}

impl SinkError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Records which source keys a run has consumed so the next run skips them.
#[async_trait]
pub trait CheckpointWriter: Send + Sync {
    async fn mark_all_processed(&self, keys: &[RecordKey]) -> Result<(), CheckpointError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint could not be written: {0}")]
    Write(String),
}
