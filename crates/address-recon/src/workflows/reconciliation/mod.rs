//! Address reconciliation: normalization, cascading verification, change detection
//! and the paced batch driver that ties them to a source, a sink and a checkpoint.

pub mod cascade;
pub mod diff;
pub mod domain;
pub mod driver;
pub mod normalizer;
pub mod pacing;
pub mod repository;

#[cfg(test)]
mod tests;

pub use cascade::{
    transition, CascadeEvent, CascadeResult, CascadeState, CascadingResolver, Resolution,
};
pub use diff::diff;
pub use domain::{
    AddressField, ChangeStatus, OriginalAddress, RawAddressRow, ReconciliationOutcome, RecordKey,
    ResolvedAddress, Strategy, StreetCandidate, ZipCandidate,
};
pub use driver::{BatchDriver, BatchError, BatchSummary, RejectedRecord};
pub use normalizer::{normalize, MalformedRecordError};
pub use pacing::{DispatchPacer, MinIntervalPacer};
pub use repository::{
    AddressQuery, CheckpointError, CheckpointWriter, RecordSource, ResultSink, SinkError,
    SourceError, VerificationClient, VerificationError,
};
