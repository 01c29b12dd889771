use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{Snapshot, SnapshotStore};
use crate::error::{RidedeskError, RidedeskResult};

/// Stores the snapshot as a single JSON document on disk.
///
/// Saves write a sibling `.tmp` file and rename it over the target, so a
/// crash mid-write leaves the previous snapshot intact.
pub struct JsonFileStore {
    path: PathBuf,
    pretty: bool,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty: true,
        }
    }

    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn save_error(&self, message: impl std::fmt::Display) -> RidedeskError {
        RidedeskError::SnapshotSaveFailed {
            location: self.location(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn load_snapshot(&self) -> RidedeskResult<Option<Snapshot>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.location(), "No snapshot on disk yet");
                return Ok(None);
            }
            Err(e) => {
                return Err(RidedeskError::SnapshotLoadFailed {
                    location: self.location(),
                    message: e.to_string(),
                })
            }
        };

        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(None);
        }

        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            RidedeskError::SnapshotCorrupt(format!("{}: {}", self.location(), e))
        })?;

        Ok(Some(snapshot))
    }

    async fn save_snapshot(&self, snapshot: &Snapshot) -> RidedeskResult<()> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(snapshot)?
        } else {
            serde_json::to_vec(snapshot)?
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.save_error(e))?;
            }
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| self.save_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.save_error(e))?;

        debug!(
            path = %self.location(),
            revision = snapshot.revision,
            bytes = bytes.len(),
            "Snapshot written"
        );

        Ok(())
    }
}
