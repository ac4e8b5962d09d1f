//! Upload error types.

use rapidup_transfer::TransferError;

/// Errors produced while uploading one target.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// A request kept failing after every retry.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The remote side answered in a way the protocol does not allow.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("negotiation failed: {0}")]
    NegotiationFailed(String),

    #[error("range {offset}+{length} exceeds file size {size}")]
    RangeOutOfBounds { offset: u64, length: u64, size: u64 },

    #[error("checkpoint mismatch: {0}")]
    CheckpointMismatch(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("part {part} upload failed: {reason}")]
    PartUploadFailed { part: u32, reason: String },

    #[error("finalization failed: {0}")]
    FinalizationFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cooperative pause; not a failure.
    #[error("stopped")]
    Stopped,
}

impl UploadError {
    /// Returns `true` if a checkpoint remains usable for a later run.
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            UploadError::PartUploadFailed { .. }
                | UploadError::FinalizationFailed(_)
                | UploadError::Stopped
        )
    }
}

impl From<TransferError> for UploadError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Io(e) => UploadError::Io(e),
            TransferError::Json(e) => UploadError::Io(std::io::Error::other(e)),
            TransferError::RangeOutOfBounds {
                offset,
                length,
                size,
            } => UploadError::RangeOutOfBounds {
                offset,
                length,
                size,
            },
            TransferError::InvalidConfiguration(msg) => UploadError::InvalidConfiguration(msg),
            e @ (TransferError::CheckpointNotFound(_) | TransferError::CorruptCheckpoint(_)) => {
                UploadError::CheckpointMismatch(e.to_string())
            }
            e @ TransferError::OutOfOrderPart { .. } => UploadError::ProtocolViolation(e.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for UploadError {
    fn from(e: tokio::task::JoinError) -> Self {
        UploadError::Io(std::io::Error::other(format!("task join error: {e}")))
    }
}
