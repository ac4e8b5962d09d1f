//! Dedup negotiation.
//!
//! Registers a target's fingerprints with the metadata service. The server
//! either already holds the content, asks for one proof-of-possession hash
//! over a byte range, or hands back where the bytes must go.

use std::fs::File;

use chrono::Utc;
use rapidup_protocol::constants::target_for;
use rapidup_protocol::{Challenge, InitUploadForm, ObjectLocation, RegistrationOutcome};
use rapidup_transfer::{FingerprintSet, challenge_hash, fingerprint_reader};
use tracing::{debug, info};

use crate::error::UploadError;
use crate::service::MetadataService;
use crate::types::{CredentialBundle, NegotiationOutcome, Target, UploadToken};

/// Runs the registration state machine for one target at a time.
pub struct DedupNegotiator<'a> {
    service: &'a dyn MetadataService,
    credentials: &'a CredentialBundle,
}

impl<'a> DedupNegotiator<'a> {
    pub fn new(service: &'a dyn MetadataService, credentials: &'a CredentialBundle) -> Self {
        Self {
            service,
            credentials,
        }
    }

    /// Fingerprints `target` and registers it, answering at most one challenge.
    pub async fn negotiate(&self, target: &Target) -> Result<NegotiationOutcome, UploadError> {
        let fingerprint = fingerprint(target).await?;
        debug!(
            path = %target.path.display(),
            size = fingerprint.size,
            full_hash = %fingerprint.full_hash,
            quick_hash = %fingerprint.quick_hash,
            "fingerprinted"
        );

        let form = InitUploadForm::new(
            &self.credentials.user_id,
            &self.credentials.user_key,
            &target.file_name(),
            fingerprint.size,
            &fingerprint.full_hash,
            &fingerprint.quick_hash,
            &target_for(target.container_id),
            Utc::now().timestamp(),
        );

        let (fingerprint, outcome) = match self.register(&form).await? {
            RegistrationOutcome::Challenge(challenge) => {
                let (fingerprint, answer) = self.answer(target, fingerprint, &form, &challenge).await?;
                match self.register(&answer).await? {
                    RegistrationOutcome::Challenge(_) => {
                        return Err(UploadError::ProtocolViolation(
                            "second challenge round after a challenge answer".into(),
                        ));
                    }
                    outcome => (fingerprint, outcome),
                }
            }
            outcome => (fingerprint, outcome),
        };

        match outcome {
            RegistrationOutcome::DedupHit { pick_code } => {
                info!(path = %target.path.display(), pick_code = %pick_code, "dedup hit");
                Ok(NegotiationOutcome::DedupHit { pick_code })
            }
            RegistrationOutcome::UploadRequired(location) => {
                self.upload_token(target, fingerprint, location).await
            }
            RegistrationOutcome::Challenge(_) => Err(UploadError::ProtocolViolation(
                "unexpected challenge".into(),
            )),
        }
    }

    async fn register(&self, form: &InitUploadForm) -> Result<RegistrationOutcome, UploadError> {
        self.service.register(form).await.map_err(negotiation_failed)
    }

    /// Hashes the challenged range and builds the answering form.
    async fn answer(
        &self,
        target: &Target,
        fingerprint: FingerprintSet,
        form: &InitUploadForm,
        challenge: &Challenge,
    ) -> Result<(FingerprintSet, InitUploadForm), UploadError> {
        debug!(
            path = %target.path.display(),
            offset = challenge.range.offset,
            length = challenge.range.length,
            "challenge requested"
        );
        let path = target.path.clone();
        let range = challenge.range;
        let sign_val = tokio::task::spawn_blocking(move || challenge_hash(&path, range)).await??;
        let answer = form.answer_challenge(&challenge.sign_key, &sign_val);
        Ok((fingerprint.with_challenge(sign_val), answer))
    }

    async fn upload_token(
        &self,
        target: &Target,
        fingerprint: FingerprintSet,
        location: ObjectLocation,
    ) -> Result<NegotiationOutcome, UploadError> {
        let credentials = self
            .service
            .fetch_credentials()
            .await
            .map_err(negotiation_failed)?;
        info!(
            path = %target.path.display(),
            bucket = %location.bucket,
            object = %location.object,
            "upload required"
        );
        Ok(NegotiationOutcome::UploadRequired(UploadToken {
            location,
            credentials,
            fingerprint,
        }))
    }
}

/// Fingerprints exactly `target.size` bytes off the blocking pool.
async fn fingerprint(target: &Target) -> Result<FingerprintSet, UploadError> {
    let path = target.path.clone();
    let size = target.size;
    let fingerprint = tokio::task::spawn_blocking(move || {
        let file = File::open(&path)?;
        fingerprint_reader(file, size)
    })
    .await??;
    Ok(fingerprint)
}

/// Service failures surface as `NegotiationFailed`; violations keep their kind.
fn negotiation_failed(e: UploadError) -> UploadError {
    match e {
        e @ (UploadError::ProtocolViolation(_) | UploadError::Stopped) => e,
        other => UploadError::NegotiationFailed(other.to_string()),
    }
}
