//! Durable per-target session state.
//!
//! One JSON file per target, named from the target's base name so that a
//! later run against the same path finds it. Writes go to a temporary file
//! that is renamed into place; a reader never sees a half-written record.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rapidup_protocol::ObjectLocation;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::TransferError;
use crate::policy::PartLayout;
use crate::types::{PartTag, Session};

/// Serialized snapshot of a [`Session`] plus where its bytes are going.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub target_path: String,
    pub target_size: u64,
    /// Modification time of the target when the transaction was opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_modified: Option<SystemTime>,
    pub upload_id: String,
    pub part_size: u64,
    pub total_parts: u32,
    #[serde(default)]
    pub completed_parts: Vec<PartTag>,
    pub location: ObjectLocation,
}

impl Checkpoint {
    /// Snapshots `session`.
    pub fn from_session(session: &Session, target_path: &Path, location: &ObjectLocation) -> Self {
        Self {
            target_path: target_path.to_string_lossy().into_owned(),
            target_size: session.target_size,
            target_modified: None,
            upload_id: session.upload_id.clone(),
            part_size: session.layout.part_size,
            total_parts: session.layout.total_parts,
            completed_parts: session.completed_parts().to_vec(),
            location: location.clone(),
        }
    }

    pub fn with_target_modified(mut self, modified: Option<SystemTime>) -> Self {
        self.target_modified = modified;
        self
    }

    /// Rebuilds the session, re-checking the layout and the completed prefix.
    pub fn to_session(&self, key: &str) -> Result<Session, TransferError> {
        if self.upload_id.is_empty() {
            return Err(TransferError::CorruptCheckpoint("empty upload id".into()));
        }
        let layout = PartLayout::restore(self.part_size, self.total_parts, self.target_size)?;
        Session::restore(
            key.to_string(),
            self.upload_id.clone(),
            layout,
            self.target_size,
            self.completed_parts.clone(),
        )
    }
}

/// Checkpoint key for a target: its base name.
pub fn session_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Directory of checkpoint files.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds the checkpoint for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub fn exists(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    /// Atomically replaces the checkpoint for `key`.
    pub fn save(&self, key: &str, checkpoint: &Checkpoint) -> Result<(), TransferError> {
        let path = self.path_for(key);
        let json = serde_json::to_string_pretty(checkpoint)?;
        std::fs::create_dir_all(&self.dir)?;

        let tmp = self
            .dir
            .join(format!(".{key}.json.tmp.{}", std::process::id()));
        std::fs::write(&tmp, json)?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(
            key,
            parts = checkpoint.completed_parts.len(),
            path = %path.display(),
            "checkpoint saved"
        );
        Ok(())
    }

    /// Loads the checkpoint for `key`.
    pub fn load(&self, key: &str) -> Result<Checkpoint, TransferError> {
        let path = self.path_for(key);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransferError::CheckpointNotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let checkpoint: Checkpoint = serde_json::from_str(&data)
            .map_err(|e| TransferError::CorruptCheckpoint(format!("{}: {e}", path.display())))?;
        debug!(key, path = %path.display(), "checkpoint loaded");
        Ok(checkpoint)
    }

    /// Removes the checkpoint for `key`; a missing file is not an error.
    pub fn delete(&self, key: &str) -> Result<(), TransferError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => {
                debug!(key, "checkpoint deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
