//! The single upload worker.
//!
//! Tasks arrive over the channel one at a time. For each task the worker
//! marks the shared slot as loading, publishes the file to Drive (or reuses
//! an already-uploaded copy with the same content), and writes the terminal
//! outcome back to the slot. Failures never poison the loop; the next task
//! starts fresh.

use chrono::{DateTime, Local, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::auth::AuthStrategy;
use crate::drive::{direct_download_link, folder_link, DriveClient, DriveError, RemoteFolder};
use crate::error::UploadErrorKind;

use super::{DedupIndex, LatestUpload, SharedLatest, UploadResult, UploadTask};

pub struct UploadWorker {
    queue: mpsc::UnboundedReceiver<UploadTask>,
    drive: DriveClient,
    auth: AuthStrategy,
    dedup: DedupIndex,
    folder_name: String,
    folder: Option<RemoteFolder>,
    latest: SharedLatest,
}

impl UploadWorker {
    pub fn new(
        queue: mpsc::UnboundedReceiver<UploadTask>,
        auth: AuthStrategy,
        folder_name: String,
        latest: SharedLatest,
    ) -> Self {
        Self {
            queue,
            drive: DriveClient::new(),
            auth,
            dedup: DedupIndex::new(),
            folder_name,
            folder: None,
            latest,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                task = self.queue.recv() => {
                    let Some(task) = task else { break };
                    self.process(task).await;
                }
            }
        }

        debug!("upload worker stopped");
    }

    async fn process(&mut self, task: UploadTask) {
        let queued_for = Utc::now() - task.enqueued_at;
        info!("📤 Uploading {}", task.display_name);
        debug!(
            "claimed {} after {}ms in queue",
            task.display_name,
            queued_for.num_milliseconds()
        );
        *self.latest.write().await = LatestUpload::Loading { since: Utc::now() };

        let result = match self.publish(&task).await {
            Ok(result) => result,
            Err(kind) => UploadResult::failed(kind),
        };

        match (&result.success, &result.download_link) {
            (true, Some(link)) => {
                info!("✅ {} published: {link}", task.display_name);
                if let Some(id) = &result.remote_file_id {
                    debug!("remote file id {}", id);
                }
            }
            _ => error!(
                "❌ Upload of {} failed ({})",
                task.display_name,
                result.error_kind.unwrap_or(UploadErrorKind::TransientUpload)
            ),
        }

        *self.latest.write().await = LatestUpload::Done(result);
    }

    async fn publish(&mut self, task: &UploadTask) -> Result<UploadResult, UploadErrorKind> {
        let token = match self.auth.valid_credential().await {
            Ok(token) => token,
            Err(err) => {
                error!("could not obtain a Drive credential: {err}");
                return Err(UploadErrorKind::from(&err));
            }
        };

        let folder = match &self.folder {
            Some(folder) => folder.clone(),
            None => {
                let ensured = self.drive.ensure_folder(&token, &self.folder_name).await;
                match ensured {
                    Ok(folder) => {
                        info!(
                            "📁 Drive folder '{}' ready: {}",
                            folder.name,
                            folder_link(&folder.id)
                        );
                        self.folder = Some(folder.clone());
                        folder
                    }
                    Err(err) => {
                        return Err(self.note_drive_failure("preparing the Drive folder", &err))
                    }
                }
            }
        };

        // Same bytes already uploaded this run: point the link at the remote
        // copy instead of sending them again.
        let known_id = self
            .dedup
            .lookup(&task.content_digest)
            .map(str::to_string);
        if let Some(known_id) = known_id {
            debug!("digest previously published as {}", known_id);
            match self
                .drive
                .find_in_folder(&token, &task.display_name, &folder.id)
                .await
            {
                Ok(Some(existing)) => {
                    info!(
                        "duplicate content, republishing existing file {}",
                        existing.id
                    );
                    self.share_best_effort(&token, &existing.id).await;
                    return Ok(UploadResult::published(
                        direct_download_link(&existing.id),
                        existing.web_view_link.clone(),
                        existing.id,
                    ));
                }
                Ok(None) => {
                    debug!("known digest but no matching remote file, uploading again");
                }
                Err(err) => {
                    warn!("duplicate lookup failed, uploading again: {err}");
                }
            }
        }

        let remote_name = remote_name_for(&task.display_name, Local::now());
        let uploaded = match self
            .drive
            .upload_file(&token, &task.path, &remote_name, &folder.id)
            .await
        {
            Ok(file) => file,
            Err(err) => return Err(self.note_drive_failure("upload", &err)),
        };

        self.share_best_effort(&token, &uploaded.id).await;

        // Only a completed upload makes the digest a duplicate.
        self.dedup
            .record(task.content_digest.clone(), uploaded.id.clone());

        Ok(UploadResult::published(
            direct_download_link(&uploaded.id),
            uploaded.web_view_link.clone(),
            uploaded.id,
        ))
    }

    /// Sharing is best effort. A private link still works for the owner, so
    /// a permission failure downgrades the result instead of failing it.
    async fn share_best_effort(&self, token: &str, file_id: &str) {
        if let Err(err) = self.drive.share_public(token, file_id).await {
            warn!("⚠️ Could not make the file public, the link may require sign-in: {err}");
        }
    }

    fn note_drive_failure(&mut self, what: &str, err: &DriveError) -> UploadErrorKind {
        error!("{what} failed: {err}");
        if matches!(err, DriveError::Auth { .. }) {
            self.auth.invalidate();
        }
        UploadErrorKind::from(err)
    }
}

/// Remote name carrying a local timestamp ahead of the original filename.
fn remote_name_for(file_name: &str, when: DateTime<Local>) -> String {
    format!("veo_{}_{}", when.format("%Y%m%d_%H%M%S"), file_name)
}
