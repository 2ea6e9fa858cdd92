//! Downloads-directory polling and completion detection.
//!
//! Detection is poll-based by design. Each tick lists the directory and
//! diffs it against everything already handled; new video files go through a
//! two-sample size check before they are hashed and queued. A file that is
//! still being written is left untracked so the next tick looks at it again.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::digest::file_digest;
use super::UploadTask;

/// Extensions treated as video downloads.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm", "mkv", "gif"];

/// Verdict of a single stability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Size held steady across both samples.
    Settled(u64),
    /// Size differed between samples, likely still downloading.
    Changing,
    /// The file disappeared between samples.
    Vanished,
}

/// Samples a file's size twice with a delay to infer that writing finished.
///
/// A slow but steady writer can fool this check; the delay and the poll
/// interval are both tunable to trade latency against that risk.
#[derive(Debug, Clone)]
pub struct StabilityProbe {
    delay: Duration,
}

impl StabilityProbe {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub async fn observe(&self, path: &Path) -> Stability {
        let first = match file_len(path).await {
            Some(len) => len,
            None => return Stability::Vanished,
        };

        tokio::time::sleep(self.delay).await;

        match file_len(path).await {
            Some(second) if second == first => Stability::Settled(second),
            Some(_) => Stability::Changing,
            None => Stability::Vanished,
        }
    }
}

async fn file_len(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
}

fn has_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            VIDEO_EXTENSIONS.iter().any(|known| *known == ext)
        })
        .unwrap_or(false)
}

/// Polls the downloads directory and feeds finished videos into the queue.
pub struct FileWatcher {
    dir: PathBuf,
    poll_interval: Duration,
    probe: StabilityProbe,
    seen: HashSet<PathBuf>,
    queue: mpsc::UnboundedSender<UploadTask>,
}

impl FileWatcher {
    pub fn new(
        dir: PathBuf,
        poll_interval: Duration,
        stability_delay: Duration,
        queue: mpsc::UnboundedSender<UploadTask>,
    ) -> Self {
        Self {
            dir,
            poll_interval,
            probe: StabilityProbe::new(stability_delay),
            seen: HashSet::new(),
            queue,
        }
    }

    /// Run the poll loop until shutdown is signalled.
    ///
    /// Files already present at startup are treated as handled, so only
    /// downloads that finish while the service is running get uploaded.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("👀 Watching {} for new videos", self.dir.display());
        self.prime_existing().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.poll_interval) => self.tick().await,
            }
        }

        debug!("watcher loop stopped");
    }

    /// Record the current directory contents without enqueuing anything.
    async fn prime_existing(&mut self) {
        for path in self.list_dir().await {
            self.seen.insert(path);
        }
        debug!("primed {} pre-existing entries", self.seen.len());
    }

    /// One poll cycle: diff the listing, probe new video files, queue the
    /// ones that are complete.
    pub(crate) async fn tick(&mut self) {
        for path in self.list_dir().await {
            if self.seen.contains(&path) {
                continue;
            }

            if !has_video_extension(&path) {
                self.seen.insert(path);
                continue;
            }

            self.consider(path).await;
        }
    }

    async fn consider(&mut self, path: PathBuf) {
        match self.probe.observe(&path).await {
            Stability::Settled(size) => match file_digest(&path).await {
                Ok(content_digest) => {
                    let display_name = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "download".to_string());

                    info!(
                        "🎬 New video detected: {} ({:.1} MB)",
                        display_name,
                        size as f64 / (1024.0 * 1024.0)
                    );

                    let task = UploadTask {
                        path: path.clone(),
                        display_name,
                        content_digest,
                        enqueued_at: Utc::now(),
                    };

                    if self.queue.send(task).is_err() {
                        warn!("upload queue is closed, dropping detection");
                    }
                    self.seen.insert(path);
                }
                // Dropped without being marked handled. If the file is
                // recreated it shows up as new again on a later tick.
                Err(err) => {
                    debug!("could not hash {}: {}", path.display(), err);
                }
            },
            Stability::Changing => {
                debug!("{} still changing, will re-check", path.display());
            }
            Stability::Vanished => {
                debug!("{} vanished during stability check", path.display());
            }
        }
    }

    async fn list_dir(&self) -> Vec<PathBuf> {
        let mut entries = Vec::new();
        let mut listing = match tokio::fs::read_dir(&self.dir).await {
            Ok(listing) => listing,
            Err(err) => {
                warn!("cannot list {}: {}", self.dir.display(), err);
                return entries;
            }
        };

        loop {
            match listing.next_entry().await {
                Ok(Some(entry)) => entries.push(entry.path()),
                Ok(None) => break,
                Err(err) => {
                    warn!("directory listing interrupted: {}", err);
                    break;
                }
            }
        }

        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn watcher_with_queue(
        dir: &Path,
        delay_ms: u64,
    ) -> (FileWatcher, mpsc::UnboundedReceiver<UploadTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = FileWatcher::new(
            dir.to_path_buf(),
            Duration::from_millis(10),
            Duration::from_millis(delay_ms),
            tx,
        );
        (watcher, rx)
    }

    #[test]
    fn test_video_extension_filter() {
        assert!(has_video_extension(Path::new("clip.mp4")));
        assert!(has_video_extension(Path::new("CLIP.MP4")));
        assert!(has_video_extension(Path::new("anim.gif")));
        assert!(!has_video_extension(Path::new("notes.txt")));
        assert!(!has_video_extension(Path::new("archive.mp4.part")));
        assert!(!has_video_extension(Path::new("noextension")));
    }

    #[tokio::test]
    async fn test_stable_file_is_settled() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("clip.mp4");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        let probe = StabilityProbe::new(Duration::from_millis(5));
        assert_eq!(probe.observe(&path).await, Stability::Settled(2048));
    }

    #[tokio::test]
    async fn test_missing_file_is_vanished() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gone.mp4");

        let probe = StabilityProbe::new(Duration::from_millis(5));
        assert_eq!(probe.observe(&path).await, Stability::Vanished);
    }

    #[tokio::test]
    async fn test_growing_file_is_changing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("partial.mp4");
        std::fs::write(&path, b"start").unwrap();

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let mut f = tokio::fs::OpenOptions::new()
                .append(true)
                .open(&writer_path)
                .await
                .unwrap();
            f.write_all(b" more bytes").await.unwrap();
            f.flush().await.unwrap();
        });

        let probe = StabilityProbe::new(Duration::from_millis(250));
        let verdict = probe.observe(&path).await;
        writer.await.unwrap();

        assert_eq!(verdict, Stability::Changing);
    }

    #[tokio::test]
    async fn test_new_stable_video_is_enqueued() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut watcher, mut rx) = watcher_with_queue(tmp.path(), 5);
        watcher.prime_existing().await;

        std::fs::write(tmp.path().join("clip.mp4"), b"finished video bytes").unwrap();
        watcher.tick().await;

        let task = rx.try_recv().expect("expected a queued task");
        assert_eq!(task.display_name, "clip.mp4");
        assert_eq!(task.content_digest.len(), 64);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_preexisting_files_are_not_enqueued() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("old.mp4"), b"already there").unwrap();

        let (mut watcher, mut rx) = watcher_with_queue(tmp.path(), 5);
        watcher.prime_existing().await;
        watcher.tick().await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_non_video_files_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut watcher, mut rx) = watcher_with_queue(tmp.path(), 5);
        watcher.prime_existing().await;

        std::fs::write(tmp.path().join("report.pdf"), b"not a video").unwrap();
        watcher.tick().await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_enqueued_file_is_not_requeued() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut watcher, mut rx) = watcher_with_queue(tmp.path(), 5);
        watcher.prime_existing().await;

        std::fs::write(tmp.path().join("clip.mp4"), b"bytes").unwrap();
        watcher.tick().await;
        assert!(rx.try_recv().is_ok());

        watcher.tick().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_growing_file_deferred_then_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut watcher, mut rx) = watcher_with_queue(tmp.path(), 200);
        watcher.prime_existing().await;

        let path = tmp.path().join("slow.mp4");
        std::fs::write(&path, b"first half").unwrap();

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let mut f = tokio::fs::OpenOptions::new()
                .append(true)
                .open(&writer_path)
                .await
                .unwrap();
            f.write_all(b" second half").await.unwrap();
        });

        watcher.tick().await;
        writer.await.unwrap();
        assert!(rx.try_recv().is_err(), "growing file must be deferred");

        watcher.tick().await;
        let task = rx.try_recv().expect("settled file should be enqueued");
        assert_eq!(task.display_name, "slow.mp4");
    }
}
