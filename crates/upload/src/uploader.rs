//! Per-target orchestration.

use rapidup_transfer::{CheckpointStore, session_key};
use tracing::{error, info, warn};

use crate::error::UploadError;
use crate::interrupt::InterruptCoordinator;
use crate::negotiator::DedupNegotiator;
use crate::service::{MetadataService, ObjectStore};
use crate::session::{SessionContext, TransferSession};
use crate::types::{
    CredentialBundle, EngineConfig, NegotiationOutcome, ResultSummary, Target, TargetOutcome,
    UploadMode, UploadToken,
};

/// Uploads targets one at a time against a metadata service and object store.
pub struct Uploader<M, S> {
    metadata: M,
    store: S,
    credentials: CredentialBundle,
    config: EngineConfig,
    checkpoints: CheckpointStore,
    interrupt: InterruptCoordinator,
}

impl<M: MetadataService, S: ObjectStore> Uploader<M, S> {
    pub fn new(
        metadata: M,
        store: S,
        credentials: CredentialBundle,
        config: EngineConfig,
        interrupt: InterruptCoordinator,
    ) -> Result<Self, UploadError> {
        config.validate()?;
        let checkpoints = CheckpointStore::new(config.checkpoint_dir.clone());
        Ok(Self {
            metadata,
            store,
            credentials,
            config,
            checkpoints,
            interrupt,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    pub fn interrupt(&self) -> &InterruptCoordinator {
        &self.interrupt
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn context(&self) -> SessionContext<'_> {
        SessionContext {
            metadata: &self.metadata,
            store: &self.store,
            checkpoints: &self.checkpoints,
            interrupt: &self.interrupt,
        }
    }

    /// Uploads one target.
    ///
    /// In multipart mode an existing checkpoint for the target is resumed
    /// without renegotiating. Otherwise the target is negotiated first and
    /// only transferred on a dedup miss.
    pub async fn upload(&self, target: &Target) -> Result<TargetOutcome, UploadError> {
        let key = session_key(&target.path);
        if self.config.mode == UploadMode::Multipart && self.checkpoints.exists(&key) {
            let checkpoint = self.checkpoints.load(&key)?;
            let session = TransferSession::open_resumed(self.context(), checkpoint, target).await?;
            return drive(session).await;
        }

        let outcome = DedupNegotiator::new(&self.metadata, &self.credentials)
            .negotiate(target)
            .await?;
        let token = match outcome {
            NegotiationOutcome::DedupHit { pick_code } => {
                return Ok(TargetOutcome::DedupHit { pick_code });
            }
            NegotiationOutcome::UploadRequired(token) => token,
        };

        match self.config.mode {
            UploadMode::Fast => Err(UploadError::NegotiationFailed(format!(
                "{} is not stored remotely and fast mode transfers no bytes",
                target.path.display()
            ))),
            UploadMode::Normal => self.put_whole(target, token).await,
            UploadMode::Multipart => {
                let session = TransferSession::open_fresh(
                    self.context(),
                    token,
                    target,
                    self.config.part_policy,
                    self.config.part_cap,
                )
                .await?;
                drive(session).await
            }
        }
    }

    /// Uploads each target in order and tallies the results.
    ///
    /// A paused target stops the batch; targets after it are not attempted.
    pub async fn upload_all(&self, targets: &[Target]) -> ResultSummary {
        let mut summary = ResultSummary::default();
        for target in targets {
            if self.interrupt.cancellation_requested() {
                info!(remaining = targets.len() - summary.total(), "batch stopped");
                break;
            }

            let result = self.upload(target).await;
            match &result {
                Ok(TargetOutcome::DedupHit { pick_code }) => {
                    info!(path = %target.path.display(), pick_code = %pick_code, "fast upload succeeded");
                }
                Ok(TargetOutcome::Uploaded) => {
                    info!(path = %target.path.display(), size = target.size, "upload succeeded");
                }
                Ok(TargetOutcome::Stopped) => {
                    info!(path = %target.path.display(), "upload paused, checkpoint saved");
                }
                Err(e) => {
                    error!(
                        path = %target.path.display(),
                        resumable = e.is_resumable(),
                        error = %e,
                        "upload failed"
                    );
                }
            }

            if self.config.remove_after_upload && matches!(&result, Ok(o) if o.is_success()) {
                if let Err(e) = std::fs::remove_file(&target.path) {
                    warn!(path = %target.path.display(), error = %e, "failed to remove uploaded file");
                }
            }

            let stopped = matches!(result, Ok(TargetOutcome::Stopped));
            summary.record(&target.path, &result);
            if stopped {
                break;
            }
        }
        summary
    }

    async fn put_whole(
        &self,
        target: &Target,
        token: UploadToken,
    ) -> Result<TargetOutcome, UploadError> {
        let actual = tokio::fs::metadata(&target.path).await?.len();
        if actual != target.size {
            return Err(UploadError::RangeOutOfBounds {
                offset: 0,
                length: target.size,
                size: actual,
            });
        }

        self.store
            .put_object(&token.location, &target.path, target.size, &token.credentials)
            .await
            .map_err(|e| UploadError::FinalizationFailed(e.to_string()))?;
        Ok(TargetOutcome::Uploaded)
    }
}

/// Runs a session to completion, mapping a pause to [`TargetOutcome::Stopped`].
async fn drive(mut session: TransferSession<'_>) -> Result<TargetOutcome, UploadError> {
    match session.run().await {
        Ok(()) => {}
        Err(UploadError::Stopped) => return Ok(TargetOutcome::Stopped),
        Err(e) => return Err(e),
    }
    session.finalize().await?;
    Ok(TargetOutcome::Uploaded)
}
