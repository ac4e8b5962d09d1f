//! Resumable multipart transfer of one target.
//!
//! A session moves a target's bytes part by part into the object named by
//! its upload token. Progress is persisted after every accepted part, so an
//! interrupted run resumes from the first part the store has not accepted.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rapidup_protocol::{Credentials, ObjectLocation};
use rapidup_transfer::{
    Checkpoint, CheckpointStore, PartLayout, PartPolicy, PartReader, Session, SpeedCalculator,
    format_rate, session_key,
};
use tracing::{debug, error, info, warn};

use crate::error::UploadError;
use crate::interrupt::InterruptCoordinator;
use crate::service::{MetadataService, ObjectStore};
use crate::types::{Target, UploadToken};

/// Credentials expiring sooner than this are refreshed before use.
const CREDENTIAL_REFRESH_MARGIN_SECS: i64 = 300;

/// Collaborators a session talks to.
#[derive(Clone, Copy)]
pub struct SessionContext<'a> {
    pub metadata: &'a dyn MetadataService,
    pub store: &'a dyn ObjectStore,
    pub checkpoints: &'a CheckpointStore,
    pub interrupt: &'a InterruptCoordinator,
}

/// An open multipart transfer.
pub struct TransferSession<'a> {
    ctx: SessionContext<'a>,
    target: Target,
    /// Canonical target path, as written into checkpoints.
    recorded_path: PathBuf,
    location: ObjectLocation,
    credentials: Credentials,
    session: Session,
    speed: SpeedCalculator,
}

impl<'a> TransferSession<'a> {
    /// Opens a new multipart transaction and persists an initial checkpoint.
    pub async fn open_fresh(
        ctx: SessionContext<'a>,
        token: UploadToken,
        target: &Target,
        policy: PartPolicy,
        part_cap: u32,
    ) -> Result<Self, UploadError> {
        let layout = PartLayout::plan(target.size, policy, part_cap)?;
        let upload_id = ctx
            .store
            .open_transaction(&token.location, &token.credentials)
            .await?;

        let session = Session::new(
            session_key(&target.path),
            upload_id,
            layout,
            target.size,
        );
        let this = Self {
            ctx,
            target: target.clone(),
            recorded_path: canonical(&target.path),
            location: token.location,
            credentials: token.credentials,
            session,
            speed: SpeedCalculator::new(None, None),
        };
        this.persist()?;

        info!(
            path = %target.path.display(),
            upload_id = %this.session.upload_id,
            part_size = layout.part_size,
            total_parts = layout.total_parts,
            "session opened"
        );
        Ok(this)
    }

    /// Restores a session from its checkpoint.
    ///
    /// The checkpoint must name the same file, at the same size and
    /// modification time; on a mismatch nothing is sent to the network.
    /// Credentials are always fetched fresh.
    pub async fn open_resumed(
        ctx: SessionContext<'a>,
        checkpoint: Checkpoint,
        target: &Target,
    ) -> Result<Self, UploadError> {
        let recorded_path = canonical(&target.path);
        if let Some(reason) = mismatch(&checkpoint, target, &recorded_path) {
            let file = ctx.checkpoints.path_for(&session_key(&target.path));
            return Err(UploadError::CheckpointMismatch(format!(
                "{reason}; remove {} to start over",
                file.display()
            )));
        }
        let session = checkpoint.to_session(&session_key(&target.path))?;
        let credentials = ctx.metadata.fetch_credentials().await?;

        info!(
            path = %target.path.display(),
            upload_id = %session.upload_id,
            completed = session.completed_count(),
            total_parts = session.layout.total_parts,
            "session resumed"
        );
        Ok(Self {
            ctx,
            target: target.clone(),
            recorded_path,
            location: checkpoint.location,
            credentials,
            session,
            speed: SpeedCalculator::new(None, None),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Uploads the remaining parts in ascending order.
    ///
    /// Returns [`UploadError::Stopped`] when cancellation is observed at a
    /// part boundary; the checkpoint then holds every part accepted so far.
    pub async fn run(&mut self) -> Result<(), UploadError> {
        let mut reader = Some(PartReader::open(&self.target.path)?);

        while let Some(part) = self.session.next_part() {
            if self.ctx.interrupt.cancellation_requested() {
                self.persist()?;
                self.session.pause();
                info!(
                    path = %self.target.path.display(),
                    completed = self.session.completed_count(),
                    total_parts = self.session.layout.total_parts,
                    "session paused"
                );
                return Err(UploadError::Stopped);
            }

            if let Err(e) = self.refresh_credentials().await {
                self.session.fail();
                return Err(UploadError::PartUploadFailed {
                    part,
                    reason: e.to_string(),
                });
            }

            let Some((offset, length)) = self.session.part_range(part) else {
                break;
            };
            let data = match read_part(&mut reader, offset, length).await {
                Ok(data) => data,
                Err(e) => {
                    self.session.fail();
                    return Err(e);
                }
            };

            let uploaded = self
                .ctx
                .store
                .upload_part(
                    &self.location,
                    &self.session.upload_id,
                    part,
                    data,
                    &self.credentials,
                )
                .await;
            let tag = match uploaded {
                Ok(tag) => tag,
                Err(e) => {
                    self.session.fail();
                    error!(part, error = %e, "part upload failed");
                    return Err(UploadError::PartUploadFailed {
                        part,
                        reason: e.to_string(),
                    });
                }
            };

            self.session.record_part(part, tag)?;
            self.persist()?;
            self.speed.add_sample(length);
            let remaining = self.session.target_size - self.session.bytes_completed();
            debug!(
                part,
                total_parts = self.session.layout.total_parts,
                bytes = length,
                rate = %format_rate(self.speed.bytes_per_second()),
                eta_secs = self.speed.eta(remaining).map(|d| d.as_secs()),
                "part accepted"
            );
        }
        Ok(())
    }

    /// Completes the remote transaction with every tag in part order.
    ///
    /// On success the checkpoint is deleted. On failure it is kept and the
    /// session can be resumed later.
    pub async fn finalize(&mut self) -> Result<(), UploadError> {
        if !self.session.is_complete() {
            return Err(UploadError::FinalizationFailed(format!(
                "{} of {} parts uploaded",
                self.session.completed_count(),
                self.session.layout.total_parts
            )));
        }

        if let Err(e) = self.refresh_credentials().await {
            return Err(UploadError::FinalizationFailed(e.to_string()));
        }

        let completed = self
            .ctx
            .store
            .complete_transaction(
                &self.location,
                &self.session.upload_id,
                self.session.completed_parts(),
                &self.credentials,
            )
            .await;
        if let Err(e) = completed {
            self.session.fail();
            error!(
                path = %self.target.path.display(),
                error = %e,
                "finalization failed"
            );
            return Err(UploadError::FinalizationFailed(e.to_string()));
        }

        self.session.complete();
        if let Err(e) = self.ctx.checkpoints.delete(&self.session.key) {
            warn!(key = %self.session.key, error = %e, "failed to delete checkpoint");
        }
        info!(
            path = %self.target.path.display(),
            parts = self.session.layout.total_parts,
            "upload completed"
        );
        Ok(())
    }

    fn persist(&self) -> Result<(), UploadError> {
        let checkpoint = Checkpoint::from_session(&self.session, &self.recorded_path, &self.location)
            .with_target_modified(self.target.modified);
        self.ctx.checkpoints.save(&self.session.key, &checkpoint)?;
        Ok(())
    }

    async fn refresh_credentials(&mut self) -> Result<(), UploadError> {
        let margin = chrono::Duration::seconds(CREDENTIAL_REFRESH_MARGIN_SECS);
        if self.credentials.expires_within(Utc::now(), margin) {
            debug!(expires = %self.credentials.expiration, "refreshing object-store credentials");
            self.credentials = self.ctx.metadata.fetch_credentials().await?;
        }
        Ok(())
    }
}

/// Why `checkpoint` cannot continue an upload of `target`, if it cannot.
fn mismatch(checkpoint: &Checkpoint, target: &Target, recorded_path: &Path) -> Option<String> {
    let checkpointed = canonical(Path::new(&checkpoint.target_path));
    if checkpointed.as_path() != recorded_path {
        return Some(format!(
            "checkpoint belongs to {}, not {}",
            checkpointed.display(),
            recorded_path.display()
        ));
    }
    if checkpoint.target_size != target.size {
        return Some(format!(
            "{} was {} bytes when checkpointed, now {} bytes",
            target.path.display(),
            checkpoint.target_size,
            target.size
        ));
    }
    match (checkpoint.target_modified, target.modified) {
        (Some(then), Some(now)) if then != now => Some(format!(
            "{} was modified after it was checkpointed",
            target.path.display()
        )),
        _ => None,
    }
}

/// Resolves `path` to an absolute path with symlinks followed. A file that
/// can no longer be resolved compares by its path as written.
fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Reads one part off the blocking pool, handing the reader back afterwards.
async fn read_part(
    reader: &mut Option<PartReader>,
    offset: u64,
    length: u64,
) -> Result<Vec<u8>, UploadError> {
    let Some(mut r) = reader.take() else {
        return Err(UploadError::Io(std::io::Error::other("part reader unavailable")));
    };
    let (r, data) = tokio::task::spawn_blocking(move || {
        let data = r.read_range(offset, length);
        (r, data)
    })
    .await?;
    *reader = Some(r);
    Ok(data?)
}
