//! Content fingerprints, part layout and resumable session checkpoints.
//!
//! Everything here is local: hashing files, planning how a file is split
//! into parts, reading those parts back, tracking which parts the remote
//! side has accepted, and persisting that state between runs.

mod checkpoint;
mod chunked;
mod fingerprint;
mod policy;
mod progress;
mod types;

pub use checkpoint::{Checkpoint, CheckpointStore, session_key};
pub use chunked::PartReader;
pub use fingerprint::{FingerprintSet, challenge_hash, fingerprint_file, fingerprint_reader};
pub use policy::{PART_GRANULARITY, PartLayout, PartPolicy};
pub use progress::{SpeedCalculator, format_rate};
pub use types::{PartTag, Session, SessionStatus};

/// Buffer size used for streaming hashes and part reads.
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("range {offset}+{length} exceeds file size {size}")]
    RangeOutOfBounds { offset: u64, length: u64, size: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),

    #[error("corrupt checkpoint: {0}")]
    CorruptCheckpoint(String),

    #[error("part {got} recorded out of order (expected {expected})")]
    OutOfOrderPart { expected: u32, got: u32 },
}
