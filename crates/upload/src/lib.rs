//! Resumable content-addressed upload engine.
//!
//! This crate holds the upload **business logic** and has no HTTP
//! dependencies. The binary provides [`MetadataService`] and [`ObjectStore`]
//! implementations backed by the real clients.
//!
//! # Pipeline
//!
//! 1. **Fingerprint**: hash the whole file and its first 128 KiB
//! 2. **Negotiate**: register the hashes, answering one range challenge
//! 3. **Transfer**: upload parts in order, checkpointing after each one
//! 4. **Finalize**: complete the multipart transaction and drop the checkpoint

pub mod error;
pub mod interrupt;
pub mod negotiator;
pub mod service;
pub mod session;
pub mod types;
pub mod uploader;

pub use error::UploadError;
pub use interrupt::InterruptCoordinator;
pub use negotiator::DedupNegotiator;
pub use service::{MetadataService, ObjectStore, ServiceFuture};
pub use session::{SessionContext, TransferSession};
pub use types::{
    CredentialBundle, EngineConfig, NegotiationOutcome, ResultSummary, Target, TargetOutcome,
    UploadMode, UploadToken,
};
pub use uploader::Uploader;
