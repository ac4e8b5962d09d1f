//! Wire protocol types for the rapidup metadata service and object store.
//!
//! The metadata service speaks form-encoded requests with JSON replies; the
//! object store speaks an S3-like REST dialect with XML bodies. This crate
//! only describes the payloads and the request signatures. Transport lives
//! in `rapidup-remote`.

pub mod constants;
pub mod messages;
pub mod oss;
pub mod signature;

// Re-export primary types for convenience.
pub use messages::{
    ByteRange, CallbackDescriptor, CallbackReply, Challenge, Credentials, InitUploadForm,
    InitUploadResponse, ObjectLocation, RegistrationOutcome, UserInfo,
};
pub use oss::{CompleteMultipartUpload, CompletedPart, InitiateMultipartUploadResult};

/// Errors produced while interpreting protocol payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid byte range: {0}")]
    InvalidRange(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("unexpected status {status}/{status_code}: {message}")]
    UnexpectedStatus {
        status: i64,
        status_code: i64,
        message: String,
    },
}

impl ProtocolError {
    /// Returns `true` when the payload itself was malformed or incomplete.
    ///
    /// Malformed replies are treated like transport failures and retried;
    /// an explicit rejection by the server is not.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, ProtocolError::UnexpectedStatus { .. })
    }
}
