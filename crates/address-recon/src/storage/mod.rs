//! File-backed collaborators for batch runs: the summary export, the validation
//! output and the checked log.

mod checkpoint;
mod csv_sink;
mod csv_source;

use std::path::{Path, PathBuf};

pub use checkpoint::JsonCheckpointLog;
pub use csv_sink::{CsvResultSink, OUTPUT_HEADERS};
pub use csv_source::CsvRecordSource;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: invalid CSV: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{}: invalid JSON: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

async fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            }),
        _ => Ok(()),
    }
}
