use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;

use super::StorageError;
use crate::workflows::reconciliation::{ReconciliationOutcome, ResultSink, SinkError};

pub const OUTPUT_HEADERS: [&str; 13] = [
    "SoldTo",
    "InvoiceNumber",
    "originalAddress1",
    "originalAddress2",
    "originalCity",
    "originalState",
    "originalZip",
    "updatedAddress1",
    "updatedAddress2",
    "updatedCity",
    "updatedState",
    "updatedZip",
    "status",
];

/// Appends one validation row per outcome.
///
/// Each row is encoded on its own and written to `out` unbuffered on the blocking
/// pool, so a failed write leaves nothing behind for a retry to repeat.
#[derive(Debug)]
pub struct CsvResultSink<W = File> {
    path: PathBuf,
    out: Arc<Mutex<W>>,
}

impl CsvResultSink {
    /// Opens `path` for appending, writing the header row only when the file is new.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let io_error = |source| StorageError::Io {
            path: path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_error)?;
        if file.metadata().map_err(io_error)?.len() == 0 {
            let header = encode(OUTPUT_HEADERS.as_slice()).map_err(|source| StorageError::Csv {
                path: path.clone(),
                source,
            })?;
            file.write_all(&header).map_err(io_error)?;
        }

        Ok(Self::with_writer(path, file))
    }
}

impl<W> CsvResultSink<W> {
    fn with_writer(path: PathBuf, out: W) -> Self {
        Self {
            path,
            out: Arc::new(Mutex::new(out)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Encodes one record into a standalone buffer.
fn encode<T: Serialize>(record: T) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.serialize(record)?;
    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputRow<'a> {
    #[serde(rename = "SoldTo")]
    sold_to: &'a str,
    #[serde(rename = "InvoiceNumber")]
    invoice_number: &'a str,
    original_address1: &'a str,
    original_address2: &'a str,
    original_city: &'a str,
    original_state: &'a str,
    original_zip: &'a str,
    updated_address1: &'a str,
    updated_address2: &'a str,
    updated_city: &'a str,
    updated_state: &'a str,
    updated_zip: &'a str,
    status: &'a str,
}

impl<'a> From<&'a ReconciliationOutcome> for OutputRow<'a> {
    fn from(outcome: &'a ReconciliationOutcome) -> Self {
        let original = &outcome.original;
        let resolved = outcome.resolved.as_ref();
        Self {
            sold_to: &original.key().sold_to,
            invoice_number: &original.key().invoice_number,
            original_address1: original.address1(),
            original_address2: original.address2().unwrap_or_default(),
            original_city: original.city(),
            original_state: original.state(),
            original_zip: original.zip(),
            updated_address1: resolved
                .and_then(|address| address.address1.as_deref())
                .unwrap_or_default(),
            updated_address2: resolved
                .and_then(|address| address.address2.as_deref())
                .unwrap_or_default(),
            updated_city: resolved.map(|address| address.city.as_str()).unwrap_or_default(),
            updated_state: resolved.map(|address| address.state.as_str()).unwrap_or_default(),
            updated_zip: resolved.map(|address| address.zip.as_str()).unwrap_or_default(),
            status: outcome.status.summary(),
        }
    }
}

#[async_trait]
impl<W> ResultSink for CsvResultSink<W>
where
    W: Write + Send + 'static,
{
    async fn persist(&self, outcome: &ReconciliationOutcome) -> Result<(), SinkError> {
        let row = encode(OutputRow::from(outcome)).map_err(|err| classify(&self.path, err))?;
        let out = Arc::clone(&self.out);

        let written = tokio::task::spawn_blocking(move || {
            let mut out = out
                .lock()
                .map_err(|_| SinkError::Rejected("validation writer poisoned".to_string()))?;
            out.write_all(&row)
                .and_then(|()| out.flush())
                .map_err(|err| SinkError::Transient(err.to_string()))
        })
        .await
        .map_err(|err| SinkError::Rejected(format!("validation write aborted: {err}")))?;

        written.map_err(|err| match err {
            SinkError::Transient(detail) => {
                SinkError::Transient(format!("{}: {detail}", self.path.display()))
            }
            other => other,
        })
    }
}

fn classify(path: &Path, err: csv::Error) -> SinkError {
    if err.is_io_error() {
        SinkError::Transient(format!("{}: {err}", path.display()))
    } else {
        SinkError::Rejected(format!("{}: {err}", path.display()))
    }
}
