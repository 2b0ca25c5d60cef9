use super::domain::{OriginalAddress, RawAddressRow, RecordKey};

/// Raised when a source row lacks a field the cascade cannot work without.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("record {key} is missing required field `{field}`")]
pub struct MalformedRecordError {
    pub key: RecordKey,
    pub field: &'static str,
    /// The trimmed row with missing fields left blank, so the failure can still be
    /// written alongside the other outcomes.
    pub snapshot: OriginalAddress,
}

/// Builds the canonical [`OriginalAddress`] for a raw row, trimming every field.
pub fn normalize(row: RawAddressRow) -> Result<OriginalAddress, MalformedRecordError> {
    let RawAddressRow {
        key,
        address1,
        address2,
        city,
        state,
        zip,
    } = row;

    let key = RecordKey::new(key.invoice_number.trim(), key.sold_to.trim());
    let required = [
        ("address1", trimmed(address1)),
        ("city", trimmed(city)),
        ("state", trimmed(state)),
        ("zip", trimmed(zip)),
    ];
    let missing = required
        .iter()
        .find_map(|(field, value)| value.is_none().then_some(*field));

    let [address1, city, state, zip] = required.map(|(_, value)| value.unwrap_or_default());
    let original = OriginalAddress::new(key, address1, trimmed(address2), city, state, zip);

    match missing {
        None => Ok(original),
        Some(field) => Err(MalformedRecordError {
            key: original.key().clone(),
            field,
            snapshot: original,
        }),
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Comparison form of a field: trimmed and upper-cased.
pub(crate) fn comparable(value: &str) -> String {
    value.trim().to_uppercase()
}
