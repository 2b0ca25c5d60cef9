use serde::{Deserialize, Serialize};
use std::fmt;

use super::normalizer::MalformedRecordError;

/// Identifies a source row: the invoice / sold-to pair from the summary export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub invoice_number: String,
    pub sold_to: String,
}

impl RecordKey {
    pub fn new(invoice_number: impl Into<String>, sold_to: impl Into<String>) -> Self {
        Self {
            invoice_number: invoice_number.into(),
            sold_to: sold_to.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.invoice_number, self.sold_to)
    }
}

/// A row as yielded by the record source, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAddressRow {
    pub key: RecordKey,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

/// Trimmed snapshot of a source record. Only the normalizer builds these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginalAddress {
    key: RecordKey,
    address1: String,
    address2: Option<String>,
    city: String,
    state: String,
    zip: String,
}

impl OriginalAddress {
    pub(crate) fn new(
        key: RecordKey,
        address1: String,
        address2: Option<String>,
        city: String,
        state: String,
        zip: String,
    ) -> Self {
        Self {
            key,
            address1,
            address2,
            city,
            state,
            zip,
        }
    }

    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    pub fn address1(&self) -> &str {
        &self.address1
    }

    pub fn address2(&self) -> Option<&str> {
        self.address2.as_deref()
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn zip(&self) -> &str {
        &self.zip
    }

    /// First five characters of the zip, the form the zip lookup accepts.
    pub fn zip5(&self) -> &str {
        zip5(&self.zip)
    }
}

pub(crate) fn zip5(zip: &str) -> &str {
    match zip.char_indices().nth(5) {
        Some((idx, _)) => &zip[..idx],
        None => zip,
    }
}

/// Cascade stage that produced a resolution, in the order the cascade tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ZipLookup,
    Address1Lookup,
    Address2Lookup,
}

impl Strategy {
    pub const fn ordered() -> [Self; 3] {
        [Self::ZipLookup, Self::Address1Lookup, Self::Address2Lookup]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::ZipLookup => "Zipcode lookup",
            Self::Address1Lookup => "Address 1 lookup",
            Self::Address2Lookup => "Address 2 lookup",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Candidate address returned by the verification service.
///
/// Street lines are optional: a zip lookup only confirms city/state/zip, and an
/// address 2 lookup reports its street line in `address2` with `address1` empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAddress {
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub strategy: Strategy,
}

impl ResolvedAddress {
    pub fn from_zip(candidate: ZipCandidate) -> Self {
        Self {
            address1: None,
            address2: None,
            city: candidate.city,
            state: candidate.state,
            zip: candidate.zip,
            strategy: Strategy::ZipLookup,
        }
    }

    /// Builds the resolution for a street-level lookup. `Address2Lookup` places the
    /// verified street line in `address2`, since that is the line that was submitted.
    pub fn from_street(candidate: StreetCandidate, strategy: Strategy) -> Self {
        let StreetCandidate {
            street1,
            street2,
            city,
            state,
            zip,
        } = candidate;

        let (address1, address2) = match strategy {
            Strategy::Address2Lookup => (None, non_blank(street1)),
            _ => (non_blank(street1), non_blank(street2)),
        };

        Self {
            address1,
            address2,
            city,
            state,
            zip,
            strategy,
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

/// City/state/zip triple returned by a zip lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipCandidate {
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Normalized address returned by a street-level lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreetCandidate {
    pub street1: String,
    pub street2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Compared fields in their reporting precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressField {
    Address1,
    Address2,
    City,
    State,
    Zip,
}

impl AddressField {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Address1,
            Self::Address2,
            Self::City,
            Self::State,
            Self::Zip,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Address1 => "Address 1",
            Self::Address2 => "Address 2",
            Self::City => "City",
            Self::State => "State",
            Self::Zip => "Zip",
        }
    }
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of comparing an original address with a resolution, or of an exhausted
/// cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeStatus {
    changed_fields: Vec<AddressField>,
    summary: String,
    is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_detail: Option<String>,
}

impl ChangeStatus {
    /// Fields are sorted into precedence order and deduplicated.
    pub fn changes(strategy: Strategy, mut fields: Vec<AddressField>) -> Self {
        fields.sort();
        fields.dedup();

        let summary = if fields.is_empty() {
            format!("{}: no fields changed", strategy.label())
        } else {
            let joined = fields
                .iter()
                .map(|field| field.label())
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}: {} changed", strategy.label(), joined)
        };

        Self {
            changed_fields: fields,
            summary,
            is_error: false,
            error_detail: None,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            changed_fields: Vec::new(),
            summary: format!("Error: Address validation {detail}"),
            is_error: true,
            error_detail: Some(detail),
        }
    }

    /// Error for a row that never reached the cascade.
    pub fn rejected(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            changed_fields: Vec::new(),
            summary: format!("Error: {detail}"),
            is_error: true,
            error_detail: Some(detail),
        }
    }

    pub fn changed_fields(&self) -> &[AddressField] {
        &self.changed_fields
    }

    pub fn has_changes(&self) -> bool {
        !self.changed_fields.is_empty()
    }

    pub fn contains(&self, field: AddressField) -> bool {
        self.changed_fields.contains(&field)
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }
}

/// Unit handed to the result sink: one per reconciled source row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationOutcome {
    pub original: OriginalAddress,
    pub resolved: Option<ResolvedAddress>,
    pub status: ChangeStatus,
}

impl ReconciliationOutcome {
    pub fn key(&self) -> &RecordKey {
        self.original.key()
    }

    pub fn strategy(&self) -> Option<Strategy> {
        self.resolved.as_ref().map(|resolved| resolved.strategy)
    }
}

impl From<MalformedRecordError> for ReconciliationOutcome {
    fn from(err: MalformedRecordError) -> Self {
        let status = ChangeStatus::rejected(err.to_string());
        Self {
            original: err.snapshot,
            resolved: None,
            status,
        }
    }
}
