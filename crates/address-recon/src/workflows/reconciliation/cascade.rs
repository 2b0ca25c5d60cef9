//! Cascading verification: zip lookup, then address 1, then address 2.
//!
//! [`transition`] is the whole policy and is pure. [`CascadingResolver`] only issues the
//! lookup the current state asks for and feeds the result back in.

use std::sync::Arc;

use tracing::debug;

use super::diff::diff;
use super::domain::{
    AddressField, ChangeStatus, OriginalAddress, ReconciliationOutcome, ResolvedAddress, Strategy,
};
use super::repository::{AddressQuery, VerificationClient, VerificationError};

/// Message recorded when the address 2 stage has no line to submit.
pub const EMPTY_ADDRESS2_DETAIL: &str = "Address 2 is empty; nothing to verify";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeState {
    Start,
    ZipLookup,
    Address1Lookup,
    Address2Lookup,
    Resolved(Resolution),
    Exhausted(ChangeStatus),
}

impl CascadeState {
    /// Lookup the state is waiting on, if any.
    pub fn pending(&self) -> Option<Strategy> {
        match self {
            Self::ZipLookup => Some(Strategy::ZipLookup),
            Self::Address1Lookup => Some(Strategy::Address1Lookup),
            Self::Address2Lookup => Some(Strategy::Address2Lookup),
            Self::Start | Self::Resolved(_) | Self::Exhausted(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved(_) | Self::Exhausted(_))
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ZipLookup => "zip_lookup",
            Self::Address1Lookup => "address1_lookup",
            Self::Address2Lookup => "address2_lookup",
            Self::Resolved(_) => "resolved",
            Self::Exhausted(_) => "exhausted",
        }
    }
}

/// Terminal success: the accepted candidate and its diff against the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub resolved: ResolvedAddress,
    pub status: ChangeStatus,
}

impl Resolution {
    /// A clean zip match needs no record; every street-level resolution gets one.
    pub fn is_recordable(&self) -> bool {
        self.resolved.strategy != Strategy::ZipLookup || self.status.has_changes()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeEvent {
    Begin,
    Verified(ResolvedAddress),
    Failed(VerificationError),
}

/// Advances the cascade by one step.
///
/// Terminal states, and events that do not belong to the current state, leave the
/// state unchanged.
pub fn transition(
    state: CascadeState,
    original: &OriginalAddress,
    event: CascadeEvent,
) -> CascadeState {
    match (state, event) {
        (CascadeState::Start, CascadeEvent::Begin) => CascadeState::ZipLookup,
        (CascadeState::ZipLookup, CascadeEvent::Verified(resolved)) => {
            let status = diff(original, &resolved);
            // A state flip on a zip-only answer means the zip itself is suspect.
            if status.contains(AddressField::State) {
                CascadeState::Address1Lookup
            } else {
                CascadeState::Resolved(Resolution { resolved, status })
            }
        }
        (CascadeState::ZipLookup, CascadeEvent::Failed(_)) => CascadeState::Address1Lookup,
        (
            CascadeState::Address1Lookup | CascadeState::Address2Lookup,
            CascadeEvent::Verified(resolved),
        ) => {
            let status = diff(original, &resolved);
            CascadeState::Resolved(Resolution { resolved, status })
        }
        (CascadeState::Address1Lookup, CascadeEvent::Failed(_)) => CascadeState::Address2Lookup,
        (CascadeState::Address2Lookup, CascadeEvent::Failed(err)) => {
            CascadeState::Exhausted(ChangeStatus::error(err.message()))
        }
        (state, _) => state,
    }
}

/// Terminal state of one record's cascade plus the lookups it took to get there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeResult {
    pub terminal: CascadeState,
    pub attempted: Vec<Strategy>,
}

impl CascadeResult {
    /// Converts the terminal state into the outcome the sink should receive, or
    /// `None` when there is nothing to record.
    pub fn into_outcome(self, original: OriginalAddress) -> Option<ReconciliationOutcome> {
        match self.terminal {
            CascadeState::Resolved(resolution) if resolution.is_recordable() => {
                Some(ReconciliationOutcome {
                    original,
                    resolved: Some(resolution.resolved),
                    status: resolution.status,
                })
            }
            CascadeState::Exhausted(status) => Some(ReconciliationOutcome {
                original,
                resolved: None,
                status,
            }),
            _ => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.terminal, CascadeState::Exhausted(_))
    }
}

/// Drives [`transition`] against a verification client.
pub struct CascadingResolver<V: ?Sized> {
    client: Arc<V>,
}

impl<V> CascadingResolver<V>
where
    V: VerificationClient + ?Sized,
{
    pub fn new(client: Arc<V>) -> Self {
        Self { client }
    }

    pub async fn resolve(&self, original: &OriginalAddress) -> CascadeResult {
        let mut attempted = Vec::with_capacity(Strategy::ordered().len());
        let mut state = transition(CascadeState::Start, original, CascadeEvent::Begin);

        while let Some(strategy) = state.pending() {
            attempted.push(strategy);
            let event = self.lookup(strategy, original).await;
            let next = transition(state, original, event);
            debug!(
                key = %original.key(),
                stage = strategy.label(),
                next = next.label(),
                "cascade transition"
            );
            state = next;
        }

        CascadeResult {
            terminal: state,
            attempted,
        }
    }

    async fn lookup(&self, strategy: Strategy, original: &OriginalAddress) -> CascadeEvent {
        let result = match strategy {
            Strategy::ZipLookup => self
                .client
                .lookup_by_zip(original.zip5())
                .await
                .map(ResolvedAddress::from_zip),
            Strategy::Address1Lookup => {
                let query = street_query(original.address1(), original);
                self.client
                    .lookup_by_address(&query)
                    .await
                    .map(|candidate| ResolvedAddress::from_street(candidate, strategy))
            }
            Strategy::Address2Lookup => match original.address2() {
                Some(line) => {
                    let query = street_query(line, original);
                    self.client
                        .lookup_by_address(&query)
                        .await
                        .map(|candidate| ResolvedAddress::from_street(candidate, strategy))
                }
                None => Err(VerificationError::Service(EMPTY_ADDRESS2_DETAIL.to_string())),
            },
        };

        match result {
            Ok(resolved) => CascadeEvent::Verified(resolved),
            Err(err) => {
                debug!(
                    key = %original.key(),
                    stage = strategy.label(),
                    error = %err,
                    "lookup failed"
                );
                CascadeEvent::Failed(err)
            }
        }
    }
}

fn street_query(street: &str, original: &OriginalAddress) -> AddressQuery {
    AddressQuery {
        street1: street.to_string(),
        street2: String::new(),
        city: original.city().to_string(),
        state: original.state().to_string(),
        zip: original.zip().to_string(),
    }
}
