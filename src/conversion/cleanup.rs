//! Deferred removal of the storage a conversion replaced.
//!
//! Conversions hand [`CleanupTask`]s to a [`CleanupScheduler`] and move on.
//! A bounded queue feeds a fixed set of workers; each task runs on the
//! blocking pool under the principal that performed the conversion. Cleanup
//! failures are logged and never reach the conversion that scheduled them.

use std::io::ErrorKind;
use std::sync::Arc;

use mediashift_common::{BlobId, ConversionDirection, MediaVersion, Principal};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::paths::MediaPaths;
use super::storage::PriorStorage;
use super::ConversionError;
use crate::config::CleanupConfig;
use crate::repository::{ContentRepository, MediaEdit};

/// Storage to reclaim after a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupTask {
    pub version: MediaVersion,
    pub prior: PriorStorage,
    pub direction: ConversionDirection,
    pub principal: Principal,
}

/// Sending side of the cleanup queue.
#[derive(Clone)]
pub struct CleanupScheduler {
    tx: mpsc::Sender<CleanupTask>,
}

impl CleanupScheduler {
    /// Start the cleanup workers on `runtime`.
    ///
    /// Workers exit once every scheduler clone is dropped and the queue is
    /// drained.
    pub fn start(
        runtime: &Handle,
        repository: Arc<dyn ContentRepository>,
        paths: MediaPaths,
        config: &CleanupConfig,
    ) -> (Self, CleanupWorkers) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let cleaner = Arc::new(Cleaner { repository, paths });

        let handles = (0..config.workers.max(1))
            .map(|id| runtime.spawn(worker(id, rx.clone(), cleaner.clone())))
            .collect();

        (Self { tx }, CleanupWorkers { handles })
    }

    /// Queue a task without waiting. Returns false if it was dropped.
    pub fn schedule(&self, task: CleanupTask) -> bool {
        match self.tx.try_send(task) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(task)) => {
                warn!(
                    "Cleanup queue is full, leaving prior storage of {} in place",
                    task.version
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(task)) => {
                warn!(
                    "Cleanup workers have stopped, leaving prior storage of {} in place",
                    task.version
                );
                false
            }
        }
    }
}

/// Running cleanup workers.
pub struct CleanupWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl CleanupWorkers {
    /// Wait for the workers to drain the queue and exit.
    ///
    /// Only completes after every [`CleanupScheduler`] has been dropped.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!("Cleanup worker ended abnormally: {}", e);
            }
        }
    }
}

async fn worker(id: usize, rx: Arc<Mutex<mpsc::Receiver<CleanupTask>>>, cleaner: Arc<Cleaner>) {
    debug!("Cleanup worker {} started", id);
    loop {
        let task = rx.lock().await.recv().await;
        let Some(task) = task else {
            break;
        };

        let cleaner = cleaner.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || cleaner.run(task)).await {
            warn!("Cleanup task panicked on worker {}: {}", id, e);
        }
    }
    debug!("Cleanup worker {} stopped", id);
}

struct Cleaner {
    repository: Arc<dyn ContentRepository>,
    paths: MediaPaths,
}

impl Cleaner {
    fn run(&self, task: CleanupTask) {
        let result = match &task.prior {
            PriorStorage::File(path) => self.remove_file(path),
            PriorStorage::Blob(blob_id) => self.clear_blob(&task, *blob_id),
        };

        if let Err(e) = result {
            warn!("Cleanup after converting {} failed: {}", task.version, e);
        }
    }

    /// Delete a converted file unless a media unit still references it.
    ///
    /// The reference check and the delete are not atomic. A batch that points
    /// a unit at `path` in between leaves that unit referencing a deleted file,
    /// so batches converting the same records must not overlap.
    fn remove_file(&self, path: &str) -> Result<(), ConversionError> {
        if self.repository.file_path_in_use(path)? {
            debug!("Keeping {}: still referenced by a media item", path);
            return Ok(());
        }

        let physical = self.paths.to_physical(path)?;
        match std::fs::remove_file(&physical) {
            Ok(()) => {
                info!("Removed converted file {}", path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Converted file {} was already gone", path);
                Ok(())
            }
            Err(e) => Err(ConversionError::io(path, e)),
        }
    }

    fn clear_blob(&self, task: &CleanupTask, blob_id: BlobId) -> Result<(), ConversionError> {
        let still_referenced = self
            .repository
            .media_fields(&task.version)?
            .is_some_and(|fields| fields.blob_id == Some(blob_id));
        if !still_referenced {
            debug!("Blob field of {} changed since conversion, leaving it", task.version);
            return Ok(());
        }

        let edit = MediaEdit::new(task.version.clone(), task.principal.clone())
            .clear_blob()
            .expect_blob(blob_id);
        match self.repository.commit_edit(edit) {
            Ok(()) => {
                info!("Blob field of {} was cleared", task.version);
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                debug!("Blob field of {} changed while cleaning up: {}", task.version, e);
                Ok(())
            }
            Err(e) => Err(ConversionError::Commit {
                version: task.version.to_string(),
                source: e,
            }),
        }
    }
}
