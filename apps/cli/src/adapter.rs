//! Bridges the HTTP clients to the engine's service traits.

use std::path::Path;

use rapidup_protocol::{
    CompletedPart, Credentials, InitUploadForm, ObjectLocation, RegistrationOutcome,
};
use rapidup_remote::{ApiClient, OssClient};
use rapidup_transfer::PartTag;
use rapidup_upload::{MetadataService, ObjectStore, ServiceFuture, UploadError};
use tracing::debug;

/// Metadata service backed by [`ApiClient`].
pub struct RemoteMetadata {
    api: ApiClient,
}

impl RemoteMetadata {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

impl MetadataService for RemoteMetadata {
    fn register<'a>(&'a self, form: &'a InitUploadForm) -> ServiceFuture<'a, RegistrationOutcome> {
        Box::pin(async move { self.api.register(form).await.map_err(into_upload_error) })
    }

    fn fetch_credentials(&self) -> ServiceFuture<'_, Credentials> {
        Box::pin(async move { self.api.oss_token().await.map_err(into_upload_error) })
    }
}

/// Object store backed by [`OssClient`].
pub struct RemoteStore {
    oss: OssClient,
}

impl RemoteStore {
    pub fn new(oss: OssClient) -> Self {
        Self { oss }
    }
}

impl ObjectStore for RemoteStore {
    fn open_transaction<'a>(
        &'a self,
        location: &'a ObjectLocation,
        credentials: &'a Credentials,
    ) -> ServiceFuture<'a, String> {
        Box::pin(async move {
            self.oss
                .initiate_multipart(&location.bucket, &location.object, credentials)
                .await
                .map_err(into_upload_error)
        })
    }

    fn upload_part<'a>(
        &'a self,
        location: &'a ObjectLocation,
        upload_id: &'a str,
        part_number: u32,
        data: Vec<u8>,
        credentials: &'a Credentials,
    ) -> ServiceFuture<'a, String> {
        Box::pin(async move {
            self.oss
                .upload_part(
                    &location.bucket,
                    &location.object,
                    upload_id,
                    part_number,
                    &data,
                    credentials,
                )
                .await
                .map_err(into_upload_error)
        })
    }

    fn complete_transaction<'a>(
        &'a self,
        location: &'a ObjectLocation,
        upload_id: &'a str,
        parts: &'a [PartTag],
        credentials: &'a Credentials,
    ) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            let parts: Vec<CompletedPart> = parts
                .iter()
                .map(|p| CompletedPart {
                    part_number: p.part_number,
                    etag: p.tag.clone(),
                })
                .collect();
            let reply = self
                .oss
                .complete_multipart(
                    &location.bucket,
                    &location.object,
                    upload_id,
                    &parts,
                    &location.callback,
                    credentials,
                )
                .await
                .map_err(into_upload_error)?;
            debug!(message = %reply.message, "completion callback accepted");
            Ok(())
        })
    }

    fn put_object<'a>(
        &'a self,
        location: &'a ObjectLocation,
        path: &'a Path,
        size: u64,
        credentials: &'a Credentials,
    ) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            let reply = self
                .oss
                .put_object(
                    &location.bucket,
                    &location.object,
                    path,
                    size,
                    &location.callback,
                    credentials,
                )
                .await
                .map_err(into_upload_error)?;
            debug!(message = %reply.message, "upload callback accepted");
            Ok(())
        })
    }
}

/// Malformed or rejected replies are protocol violations; the rest is transport.
fn into_upload_error(e: rapidup_remote::Error) -> UploadError {
    use rapidup_remote::Error;
    match e {
        Error::Protocol(_)
        | Error::Json(_)
        | Error::Xml(_)
        | Error::MissingHeader(_)
        | Error::CallbackRejected(_) => UploadError::ProtocolViolation(e.to_string()),
        Error::InvalidHeader(_) | Error::InvalidEndpoint(_) => {
            UploadError::InvalidConfiguration(e.to_string())
        }
        Error::Http(_) | Error::Api { .. } => UploadError::Transport(e.to_string()),
        Error::Io(e) => UploadError::Io(e),
    }
}
