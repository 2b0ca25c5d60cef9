use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::workflows::reconciliation::domain::{
    OriginalAddress, RawAddressRow, ReconciliationOutcome, RecordKey, StreetCandidate,
    ZipCandidate,
};
use crate::workflows::reconciliation::normalizer::normalize;
use crate::workflows::reconciliation::repository::{
    AddressQuery, CheckpointError, CheckpointWriter, RecordSource, ResultSink, SinkError,
    SourceError, VerificationClient, VerificationError,
};

pub(super) fn sf_row(invoice: &str) -> RawAddressRow {
    RawAddressRow {
        key: RecordKey::new(invoice, "SOLD-1"),
        address1: Some("322 3rd St".to_string()),
        address2: Some("Apt 2".to_string()),
        city: Some("San Francisco".to_string()),
        state: Some("CA".to_string()),
        zip: Some("94107".to_string()),
    }
}

pub(super) fn sf_original() -> OriginalAddress {
    normalize(sf_row("INV-1")).expect("fixture is well formed")
}

pub(super) fn zip(city: &str, state: &str, zip: &str) -> ZipCandidate {
    ZipCandidate {
        city: city.to_string(),
        state: state.to_string(),
        zip: zip.to_string(),
    }
}

pub(super) fn street(street1: &str, city: &str, state: &str, zip: &str) -> StreetCandidate {
    StreetCandidate {
        street1: street1.to_string(),
        street2: String::new(),
        city: city.to_string(),
        state: state.to_string(),
        zip: zip.to_string(),
    }
}

pub(super) fn not_found(message: &str) -> VerificationError {
    VerificationError::Service(message.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum VerifierCall {
    Zip(String),
    Address(AddressQuery),
}

/// Answers lookups from fixed tables keyed by zip5 and street line. Anything not
/// scripted fails with "Address Not Found.".
#[derive(Default)]
pub(super) struct ScriptedVerifier {
    zips: HashMap<String, Result<ZipCandidate, VerificationError>>,
    streets: HashMap<String, Result<StreetCandidate, VerificationError>>,
    calls: Mutex<Vec<VerifierCall>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedVerifier {
    pub(super) fn with_zip(
        mut self,
        zip5: &str,
        result: Result<ZipCandidate, VerificationError>,
    ) -> Self {
        self.zips.insert(zip5.to_string(), result);
        self
    }

    pub(super) fn with_street(
        mut self,
        street1: &str,
        result: Result<StreetCandidate, VerificationError>,
    ) -> Self {
        self.streets.insert(street1.to_string(), result);
        self
    }

    pub(super) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub(super) fn calls(&self) -> Vec<VerifierCall> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    pub(super) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: VerifierCall) {
        self.calls.lock().expect("calls mutex poisoned").push(call);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl VerificationClient for ScriptedVerifier {
    async fn lookup_by_zip(&self, zip5: &str) -> Result<ZipCandidate, VerificationError> {
        self.enter(VerifierCall::Zip(zip5.to_string())).await;
        self.zips
            .get(zip5)
            .cloned()
            .unwrap_or_else(|| Err(not_found("Invalid Zip Code.")))
    }

    async fn lookup_by_address(
        &self,
        query: &AddressQuery,
    ) -> Result<StreetCandidate, VerificationError> {
        self.enter(VerifierCall::Address(query.clone())).await;
        self.streets
            .get(&query.street1)
            .cloned()
            .unwrap_or_else(|| Err(not_found("Address Not Found.")))
    }
}

#[derive(Default)]
pub(super) struct MemorySink {
    outcomes: Mutex<Vec<ReconciliationOutcome>>,
    transient_failures: AtomicUsize,
    reject_all: bool,
    attempts: AtomicUsize,
}

impl MemorySink {
    /// Fails the next `count` writes with a transient error.
    pub(super) fn failing_transiently(count: usize) -> Self {
        Self {
            transient_failures: AtomicUsize::new(count),
            ..Self::default()
        }
    }

    pub(super) fn rejecting() -> Self {
        Self {
            reject_all: true,
            ..Self::default()
        }
    }

    pub(super) fn outcomes(&self) -> Vec<ReconciliationOutcome> {
        self.outcomes.lock().expect("sink mutex poisoned").clone()
    }

    pub(super) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn persist(&self, outcome: &ReconciliationOutcome) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.reject_all {
            return Err(SinkError::Rejected("constraint violation".to_string()));
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SinkError::Transient("connection reset".to_string()));
        }
        self.outcomes
            .lock()
            .expect("sink mutex poisoned")
            .push(outcome.clone());
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryCheckpoint {
    commits: Mutex<Vec<Vec<RecordKey>>>,
    fail: bool,
}

impl MemoryCheckpoint {
    pub(super) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(super) fn commits(&self) -> Vec<Vec<RecordKey>> {
        self.commits.lock().expect("checkpoint mutex poisoned").clone()
    }
}

#[async_trait]
impl CheckpointWriter for MemoryCheckpoint {
    async fn mark_all_processed(&self, keys: &[RecordKey]) -> Result<(), CheckpointError> {
        if self.fail {
            return Err(CheckpointError::Write("log table locked".to_string()));
        }
        self.commits
            .lock()
            .expect("checkpoint mutex poisoned")
            .push(keys.to_vec());
        Ok(())
    }
}

pub(super) struct UnavailableSource;

#[async_trait]
impl RecordSource for UnavailableSource {
    async fn unprocessed(&self) -> Result<Vec<RawAddressRow>, SourceError> {
        Err(SourceError::Unavailable("login timeout expired".to_string()))
    }
}
