//! Remote service seams.
//!
//! The binary implements these on top of the HTTP clients; tests implement
//! them with recording mocks. Implementations retry transport failures
//! themselves and report what is left as [`UploadError`].

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use rapidup_protocol::{Credentials, InitUploadForm, ObjectLocation, RegistrationOutcome};
use rapidup_transfer::PartTag;

use crate::error::UploadError;

/// Boxed future returned by the service traits.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, UploadError>> + Send + 'a>>;

/// The metadata service: registration and temporary credentials.
pub trait MetadataService: Send + Sync {
    /// Sends one registration round.
    fn register<'a>(&'a self, form: &'a InitUploadForm) -> ServiceFuture<'a, RegistrationOutcome>;

    /// Fetches fresh object-store credentials.
    fn fetch_credentials(&self) -> ServiceFuture<'_, Credentials>;
}

/// The object store: multipart transactions and single-request uploads.
pub trait ObjectStore: Send + Sync {
    /// Opens a multipart transaction and returns its upload id.
    fn open_transaction<'a>(
        &'a self,
        location: &'a ObjectLocation,
        credentials: &'a Credentials,
    ) -> ServiceFuture<'a, String>;

    /// Uploads one part and returns its integrity tag.
    fn upload_part<'a>(
        &'a self,
        location: &'a ObjectLocation,
        upload_id: &'a str,
        part_number: u32,
        data: Vec<u8>,
        credentials: &'a Credentials,
    ) -> ServiceFuture<'a, String>;

    /// Completes a transaction; `parts` are in ascending part-number order.
    fn complete_transaction<'a>(
        &'a self,
        location: &'a ObjectLocation,
        upload_id: &'a str,
        parts: &'a [PartTag],
        credentials: &'a Credentials,
    ) -> ServiceFuture<'a, ()>;

    /// Uploads the `size`-byte file at `path` as one object in one request.
    ///
    /// Implementations stream the body rather than buffering the file.
    fn put_object<'a>(
        &'a self,
        location: &'a ObjectLocation,
        path: &'a Path,
        size: u64,
        credentials: &'a Credentials,
    ) -> ServiceFuture<'a, ()>;
}
