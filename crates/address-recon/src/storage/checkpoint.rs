use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::{ensure_parent, StorageError};
use crate::workflows::reconciliation::{CheckpointError, CheckpointWriter, RecordKey};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointFile {
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    processed: BTreeSet<RecordKey>,
}

/// JSON file listing every key a run has consumed. Commits merge into the existing
/// set and replace the file atomically, so a crash mid-write keeps the previous log.
#[derive(Debug)]
pub struct JsonCheckpointLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonCheckpointLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keys already checkpointed. A missing log means nothing has been processed.
    pub async fn processed_keys(&self) -> Result<BTreeSet<RecordKey>, StorageError> {
        Ok(self.load().await?.processed)
    }

    pub async fn updated_at(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self.load().await?.updated_at)
    }

    async fn load(&self) -> Result<CheckpointFile, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(CheckpointFile::default()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StorageError::Json {
                path: self.path.clone(),
                source,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(CheckpointFile::default()),
            Err(source) => Err(StorageError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    async fn commit(&self, keys: &[RecordKey]) -> Result<usize, StorageError> {
        let _guard = self.write_lock.lock().await;

        let mut file = self.load().await?;
        file.processed.extend(keys.iter().cloned());
        file.updated_at = Some(Utc::now());

        let body = serde_json::to_vec_pretty(&file).map_err(|source| StorageError::Json {
            path: self.path.clone(),
            source,
        })?;

        ensure_parent(&self.path).await?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, body)
            .await
            .map_err(|source| StorageError::Io {
                path: staging.clone(),
                source,
            })?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|source| StorageError::Io {
                path: self.path.clone(),
                source,
            })?;

        Ok(file.processed.len())
    }
}

#[async_trait]
impl CheckpointWriter for JsonCheckpointLog {
    async fn mark_all_processed(&self, keys: &[RecordKey]) -> Result<(), CheckpointError> {
        let total = self
            .commit(keys)
            .await
            .map_err(|err| CheckpointError::Write(err.to_string()))?;
        debug!(added = keys.len(), total, path = %self.path.display(), "checkpoint committed");
        Ok(())
    }
}
