use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use super::{JsonCheckpointLog, StorageError};
use crate::workflows::reconciliation::{RawAddressRow, RecordKey, RecordSource, SourceError};

/// Reads the address summary export and yields the rows not yet checked.
#[derive(Debug)]
pub struct CsvRecordSource {
    path: PathBuf,
    checkpoint: Option<Arc<JsonCheckpointLog>>,
}

impl CsvRecordSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            checkpoint: None,
        }
    }

    /// Also skips rows whose key is already in `log`.
    pub fn skipping_checked(mut self, log: Arc<JsonCheckpointLog>) -> Self {
        self.checkpoint = Some(log);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSource for CsvRecordSource {
    async fn unprocessed(&self) -> Result<Vec<RawAddressRow>, SourceError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|source| {
            SourceError::Unavailable(
                StorageError::Io {
                    path: self.path.clone(),
                    source,
                }
                .to_string(),
            )
        })?;

        let rows = parse_rows(bytes.as_slice()).map_err(|source| {
            SourceError::Decode(
                StorageError::Csv {
                    path: self.path.clone(),
                    source,
                }
                .to_string(),
            )
        })?;

        let checked = match &self.checkpoint {
            Some(log) => log
                .processed_keys()
                .await
                .map_err(|err| SourceError::Unavailable(err.to_string()))?,
            None => Default::default(),
        };

        let total = rows.len();
        let pending: Vec<RawAddressRow> = rows
            .into_iter()
            .filter(|row| !row.is_checked())
            .map(SummaryRow::into_raw)
            .filter(|row| !checked.contains(&row.key))
            .collect();

        debug!(
            path = %self.path.display(),
            total,
            pending = pending.len(),
            "loaded address summary"
        );
        Ok(pending)
    }
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<SummaryRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    csv_reader.deserialize::<SummaryRow>().collect()
}

#[derive(Debug, Deserialize)]
pub(crate) struct SummaryRow {
    #[serde(rename = "InvoiceNumber", default)]
    invoice_number: String,
    #[serde(rename = "SoldTo", default)]
    sold_to: String,
    #[serde(
        rename = "DirecttoStoreAddress1",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    address1: Option<String>,
    #[serde(
        rename = "DirecttoStoreAddress2",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    address2: Option<String>,
    #[serde(
        rename = "DirecttoStoreCity",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    city: Option<String>,
    #[serde(
        rename = "DirecttoStoreState",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    state: Option<String>,
    #[serde(
        rename = "DirecttoStoreZip",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    zip: Option<String>,
    #[serde(
        rename = "CheckedFlag",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    checked_flag: Option<String>,
}

impl SummaryRow {
    fn is_checked(&self) -> bool {
        self.checked_flag
            .as_deref()
            .is_some_and(|flag| flag.eq_ignore_ascii_case("y"))
    }

    fn into_raw(self) -> RawAddressRow {
        RawAddressRow {
            key: RecordKey::new(self.invoice_number, self.sold_to),
            address1: self.address1,
            address2: self.address2,
            city: self.city,
            state: self.state,
            zip: self.zip,
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
