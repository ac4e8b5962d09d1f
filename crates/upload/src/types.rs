//! Engine configuration, targets and per-target outcomes.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rapidup_protocol::constants::MAX_PARTS;
use rapidup_protocol::{Credentials, ObjectLocation};
use rapidup_transfer::{FingerprintSet, PartPolicy};
use serde::{Deserialize, Serialize};

use crate::error::UploadError;

/// One file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub path: PathBuf,
    pub size: u64,
    /// Remote container (directory) id the file is stored under.
    pub container_id: u64,
    /// Last modification time, where the platform reports one.
    pub modified: Option<SystemTime>,
}

impl Target {
    /// Stats `path` and builds a target for it.
    pub fn from_path(path: impl Into<PathBuf>, container_id: u64) -> Result<Self, UploadError> {
        let path = path.into();
        let metadata = std::fs::metadata(&path)?;
        if !metadata.is_file() {
            return Err(UploadError::InvalidConfiguration(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        Ok(Self {
            path,
            size: metadata.len(),
            container_id,
            modified: metadata.modified().ok(),
        })
    }

    /// Base name sent to the metadata service.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Account identity used to sign registration requests.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    pub user_id: String,
    pub user_key: String,
}

impl std::fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("user_id", &self.user_id)
            .field("user_key", &"<redacted>")
            .finish()
    }
}

/// What the metadata service hands back when bytes must be transferred.
#[derive(Debug, Clone)]
pub struct UploadToken {
    pub location: ObjectLocation,
    pub credentials: Credentials,
    pub fingerprint: FingerprintSet,
}

/// Result of dedup negotiation.
#[derive(Debug, Clone)]
pub enum NegotiationOutcome {
    DedupHit { pick_code: String },
    UploadRequired(UploadToken),
}

/// How far the engine goes when the content is not already stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// Dedup only; a miss fails the target.
    Fast,
    /// Dedup, then a single-request upload.
    Normal,
    /// Dedup, then a resumable multipart transfer.
    #[default]
    Multipart,
}

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub part_policy: PartPolicy,
    pub part_cap: u32,
    pub checkpoint_dir: PathBuf,
    pub mode: UploadMode,
    /// Delete the local file once it is stored remotely.
    pub remove_after_upload: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            part_policy: PartPolicy::Auto,
            part_cap: MAX_PARTS,
            checkpoint_dir: PathBuf::from("checkpoints"),
            mode: UploadMode::default(),
            remove_after_upload: false,
        }
    }
}

impl EngineConfig {
    /// Rejects a part cap outside `[1, 10000]` and explicit part counts
    /// outside `[1, part_cap]`.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.part_cap == 0 || self.part_cap > MAX_PARTS {
            return Err(UploadError::InvalidConfiguration(format!(
                "part cap {} outside [1, {MAX_PARTS}]",
                self.part_cap
            )));
        }
        self.part_policy.validate(self.part_cap)?;
        Ok(())
    }
}

/// Terminal state of one target that is not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    /// Identical content was already stored; nothing was transferred.
    DedupHit { pick_code: String },
    /// Bytes were transferred and the remote object finalized.
    Uploaded,
    /// Paused by a cancellation request; a checkpoint was kept.
    Stopped,
}

impl TargetOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TargetOutcome::DedupHit { .. } | TargetOutcome::Uploaded)
    }
}

/// Caller-owned tally of per-target results.
#[derive(Debug, Clone, Default)]
pub struct ResultSummary {
    pub success: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    /// Paused targets whose checkpoint was kept.
    pub saved: Vec<PathBuf>,
}

impl ResultSummary {
    /// Records the result of one target.
    pub fn record(&mut self, path: &Path, result: &Result<TargetOutcome, UploadError>) {
        match result {
            Ok(outcome) if outcome.is_success() => self.success.push(path.to_path_buf()),
            Ok(_) => self.saved.push(path.to_path_buf()),
            Err(e) => self.failed.push((path.to_path_buf(), e.to_string())),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.success.len() + self.failed.len() + self.saved.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn explicit_part_count_outside_cap_rejected() {
        let config = EngineConfig {
            part_policy: PartPolicy::Fixed(20_000),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(UploadError::InvalidConfiguration(_))
        ));

        let config = EngineConfig {
            part_cap: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn target_from_path_stats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"12345").unwrap();

        let target = Target::from_path(&path, 7).unwrap();
        assert_eq!(target.size, 5);
        assert_eq!(target.container_id, 7);
        assert_eq!(target.file_name(), "a.bin");

        assert!(matches!(
            Target::from_path(dir.path(), 0),
            Err(UploadError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Target::from_path(dir.path().join("missing"), 0),
            Err(UploadError::Io(_))
        ));
    }

    #[test]
    fn summary_buckets_results() {
        let mut summary = ResultSummary::default();
        summary.record(
            Path::new("a"),
            &Ok(TargetOutcome::DedupHit {
                pick_code: "p".into(),
            }),
        );
        summary.record(Path::new("b"), &Ok(TargetOutcome::Uploaded));
        summary.record(Path::new("c"), &Ok(TargetOutcome::Stopped));
        summary.record(
            Path::new("d"),
            &Err(UploadError::PartUploadFailed {
                part: 2,
                reason: "503".into(),
            }),
        );

        assert_eq!(summary.success.len(), 2);
        assert_eq!(summary.saved, vec![PathBuf::from("c")]);
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.has_failures());
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&UploadMode::Multipart).unwrap(),
            "\"multipart\""
        );
        let mode: UploadMode = serde_json::from_str("\"fast\"").unwrap();
        assert_eq!(mode, UploadMode::Fast);
    }
}
