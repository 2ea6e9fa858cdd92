//! Service lifecycle.
//!
//! Start spawns the three long-running tasks and wires them together with a
//! shutdown signal; stop flips the signal and waits briefly for each task,
//! aborting stragglers. A status endpoint that fails to bind is logged and
//! forfeited while uploads keep running.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::auth::AuthStrategy;
use crate::config::ServiceConfig;
use crate::pipeline::{shared_latest, FileWatcher, UploadWorker};
use crate::web;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub struct DriveUploadService {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl DriveUploadService {
    /// Spawn the watcher, the upload worker and the status endpoint.
    ///
    /// Credential configuration is resolved before anything is spawned so a
    /// missing client secret or key file fails the start instead of the
    /// first upload.
    pub fn start(config: ServiceConfig) -> Result<Self> {
        let auth = AuthStrategy::from_config(&config.auth)?;
        let latest = shared_latest();
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);

        let watcher = FileWatcher::new(
            config.downloads_dir.clone(),
            config.poll_interval,
            config.stability_delay,
            queue_tx,
        );
        let watcher_task = tokio::spawn(watcher.run(shutdown.subscribe()));

        let worker = UploadWorker::new(queue_rx, auth, config.folder_name.clone(), latest.clone());
        let worker_task = tokio::spawn(worker.run(shutdown.subscribe()));

        let status_shutdown = shutdown.subscribe();
        let status_port = config.status_port;
        let status_task = tokio::spawn(async move {
            if let Err(err) = web::serve(latest, status_port, status_shutdown).await {
                error!("status endpoint failed, uploads continue without it: {err:#}");
            }
        });

        Ok(Self {
            shutdown,
            tasks: vec![
                ("watcher", watcher_task),
                ("upload worker", worker_task),
                ("status endpoint", status_task),
            ],
        })
    }

    /// Signal shutdown and wait up to the grace period for each task.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for (name, mut task) in self.tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("{name} task ended abnormally: {err}"),
                Err(_) => {
                    warn!("{name} task did not stop in time, aborting it");
                    task.abort();
                }
            }
        }
        info!("service stopped");
    }
}

/// Run the service until Ctrl-C.
pub async fn run(config: ServiceConfig) -> Result<()> {
    info!(
        "🎬 Watching {} and publishing to '{}'",
        config.downloads_dir.display(),
        config.folder_name
    );
    let service = DriveUploadService::start(config)?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("shutdown requested");
    service.stop().await;
    Ok(())
}
