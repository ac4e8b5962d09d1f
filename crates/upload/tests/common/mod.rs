//! Recording mocks shared by the engine scenario tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use rapidup_protocol::{
    CallbackDescriptor, Credentials, InitUploadForm, ObjectLocation, RegistrationOutcome,
};
use rapidup_transfer::{PartPolicy, PartTag};
use rapidup_upload::{
    CredentialBundle, EngineConfig, InterruptCoordinator, MetadataService, ObjectStore,
    ServiceFuture, UploadError, UploadMode, Uploader,
};

pub const MIB: usize = 1024 * 1024;

pub fn location() -> ObjectLocation {
    ObjectLocation {
        bucket: "fhnfile".into(),
        object: "abc/def".into(),
        callback: CallbackDescriptor {
            callback: "{\"callbackUrl\":\"https://uplb.example/callback\"}".into(),
            callback_var: "{\"x:user\":\"42\"}".into(),
        },
    }
}

pub fn bundle() -> CredentialBundle {
    CredentialBundle {
        user_id: "42".into(),
        user_key: "USERKEY".into(),
    }
}

/// Writes `len` bytes of a repeating pattern to `dir/name`.
pub fn write_file(dir: &Path, name: &str, len: usize) -> PathBuf {
    let path = dir.join(name);
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, data).unwrap();
    path
}

pub fn config(checkpoint_dir: &Path, policy: PartPolicy, mode: UploadMode) -> EngineConfig {
    EngineConfig {
        part_policy: policy,
        checkpoint_dir: checkpoint_dir.to_path_buf(),
        mode,
        ..Default::default()
    }
}

pub fn uploader(
    metadata: MockMetadata,
    store: MockStore,
    config: EngineConfig,
    interrupt: InterruptCoordinator,
) -> Uploader<MockMetadata, MockStore> {
    Uploader::new(metadata, store, bundle(), config, interrupt).unwrap()
}

// ---------------------------------------------------------------------------
// MockMetadata
// ---------------------------------------------------------------------------

/// Replays queued registration outcomes, defaulting to "upload required".
pub struct MockMetadata {
    replies: Mutex<VecDeque<RegistrationOutcome>>,
    pub forms: Mutex<Vec<InitUploadForm>>,
    pub credential_fetches: Mutex<u32>,
    credential_lifetime: chrono::Duration,
}

impl MockMetadata {
    pub fn new() -> Self {
        Self::with_replies(Vec::new())
    }

    pub fn with_replies(replies: Vec<RegistrationOutcome>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            forms: Mutex::new(Vec::new()),
            credential_fetches: Mutex::new(0),
            credential_lifetime: chrono::Duration::hours(1),
        }
    }

    /// Hands out credentials that expire within the refresh margin.
    pub fn short_lived(mut self) -> Self {
        self.credential_lifetime = chrono::Duration::seconds(60);
        self
    }

    pub fn registrations(&self) -> usize {
        self.forms.lock().unwrap().len()
    }

    pub fn fetches(&self) -> u32 {
        *self.credential_fetches.lock().unwrap()
    }
}

impl MetadataService for MockMetadata {
    fn register<'a>(&'a self, form: &'a InitUploadForm) -> ServiceFuture<'a, RegistrationOutcome> {
        Box::pin(async move {
            self.forms.lock().unwrap().push(form.clone());
            let reply = self.replies.lock().unwrap().pop_front();
            Ok(reply.unwrap_or_else(|| RegistrationOutcome::UploadRequired(location())))
        })
    }

    fn fetch_credentials(&self) -> ServiceFuture<'_, Credentials> {
        Box::pin(async move {
            *self.credential_fetches.lock().unwrap() += 1;
            Ok(Credentials {
                access_key_id: "STS.id".into(),
                access_key_secret: "secret".into(),
                security_token: "token".into(),
                expiration: Utc::now() + self.credential_lifetime,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Open,
    Part { number: u32, len: usize },
    Complete { tags: Vec<PartTag> },
    Put { len: usize },
}

/// Records every object-store call; parts get tag `etag-<n>`.
#[derive(Default)]
pub struct MockStore {
    pub calls: Mutex<Vec<StoreCall>>,
    pub received: Mutex<Vec<u8>>,
    fail_part: Option<u32>,
    fail_complete: bool,
    cancel_after: Option<(u32, InterruptCoordinator)>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects `part` with a transport error.
    pub fn failing_part(mut self, part: u32) -> Self {
        self.fail_part = Some(part);
        self
    }

    pub fn failing_complete(mut self) -> Self {
        self.fail_complete = true;
        self
    }

    /// Requests cancellation right after `part` is accepted.
    pub fn cancel_after(mut self, part: u32, interrupt: InterruptCoordinator) -> Self {
        self.cancel_after = Some((part, interrupt));
        self
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn part_numbers(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::Part { number, .. } => Some(number),
                _ => None,
            })
            .collect()
    }
}

impl ObjectStore for MockStore {
    fn open_transaction<'a>(
        &'a self,
        _location: &'a ObjectLocation,
        _credentials: &'a Credentials,
    ) -> ServiceFuture<'a, String> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(StoreCall::Open);
            Ok("UPLOAD-1".to_string())
        })
    }

    fn upload_part<'a>(
        &'a self,
        _location: &'a ObjectLocation,
        upload_id: &'a str,
        part_number: u32,
        data: Vec<u8>,
        _credentials: &'a Credentials,
    ) -> ServiceFuture<'a, String> {
        Box::pin(async move {
            assert_eq!(upload_id, "UPLOAD-1");
            self.calls.lock().unwrap().push(StoreCall::Part {
                number: part_number,
                len: data.len(),
            });
            if self.fail_part == Some(part_number) {
                return Err(UploadError::Transport("HTTP 503".into()));
            }
            self.received.lock().unwrap().extend_from_slice(&data);
            if let Some((after, interrupt)) = &self.cancel_after {
                if *after == part_number {
                    interrupt.request_cancellation();
                }
            }
            Ok(format!("etag-{part_number}"))
        })
    }

    fn complete_transaction<'a>(
        &'a self,
        _location: &'a ObjectLocation,
        _upload_id: &'a str,
        parts: &'a [PartTag],
        _credentials: &'a Credentials,
    ) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(StoreCall::Complete {
                tags: parts.to_vec(),
            });
            if self.fail_complete {
                return Err(UploadError::ProtocolViolation("callback state false".into()));
            }
            Ok(())
        })
    }

    fn put_object<'a>(
        &'a self,
        _location: &'a ObjectLocation,
        path: &'a Path,
        size: u64,
        _credentials: &'a Credentials,
    ) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            let data = std::fs::read(path)?;
            assert_eq!(data.len() as u64, size);
            self.calls.lock().unwrap().push(StoreCall::Put { len: data.len() });
            self.received.lock().unwrap().extend_from_slice(&data);
            Ok(())
        })
    }
}
