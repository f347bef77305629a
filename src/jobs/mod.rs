//! In-process background jobs with progress reporting.
//!
//! A job runs its entry point on the blocking thread pool. While it runs, the
//! entry reports progress through its [`JobContext`]; callers poll a
//! [`JobHandle`] or await it.

mod types;

pub use types::*;

use std::collections::HashMap;
use std::sync::Arc;

use mediashift_common::{JobId, Principal};
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error};

type JobTable = Arc<RwLock<HashMap<JobId, Job>>>;

/// Registry and launcher for background jobs.
#[derive(Clone)]
pub struct JobManager {
    jobs: JobTable,
    runtime: Handle,
}

impl JobManager {
    /// Create a manager that runs jobs on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            runtime,
        }
    }

    /// Start a job. An error returned by `entry` marks the job failed.
    pub fn start<F>(&self, name: &str, principal: Principal, entry: F) -> JobHandle
    where
        F: FnOnce(JobContext) -> anyhow::Result<()> + Send + 'static,
    {
        let job = Job::new(name, principal.clone());
        let id = job.id;
        self.jobs.write().insert(id, job);

        let (done_tx, done_rx) = watch::channel(false);
        let context = JobContext {
            id,
            principal,
            jobs: self.jobs.clone(),
        };
        let jobs = self.jobs.clone();

        self.runtime.spawn_blocking(move || {
            if let Some(job) = jobs.write().get_mut(&id) {
                job.start();
            }
            debug!("Job {} started", id);

            let result = entry(context);

            if let Some(job) = jobs.write().get_mut(&id) {
                match result {
                    Ok(()) => job.complete(),
                    Err(e) => {
                        error!("Job {} ({}) failed: {:#}", id, job.name, e);
                        job.fail(&format!("{:#}", e));
                    }
                }
            }
            let _ = done_tx.send(true);
        });

        JobHandle {
            id,
            jobs: self.jobs.clone(),
            done: done_rx,
        }
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.jobs.read().get(&id).cloned()
    }

    /// Drop a finished job from the registry. Running and queued jobs stay.
    pub fn remove_finished(&self, id: JobId) -> Option<Job> {
        let mut jobs = self.jobs.write();
        if !jobs.get(&id)?.state.is_finished() {
            return None;
        }
        jobs.remove(&id)
    }

    /// All known jobs, oldest first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }
}

/// Progress surface handed to a running job.
#[derive(Clone)]
pub struct JobContext {
    id: JobId,
    principal: Principal,
    jobs: JobTable,
}

impl JobContext {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// The principal the job runs on behalf of.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn add_message(&self, message: impl Into<String>) {
        if let Some(job) = self.jobs.write().get_mut(&self.id) {
            job.messages.push(message.into());
        }
    }

    pub fn increment_processed(&self) {
        if let Some(job) = self.jobs.write().get_mut(&self.id) {
            job.processed += 1;
        }
    }
}

/// Caller's view of a started job.
#[derive(Clone)]
pub struct JobHandle {
    id: JobId,
    jobs: JobTable,
    done: watch::Receiver<bool>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Current state of the job.
    pub fn snapshot(&self) -> Option<Job> {
        self.jobs.read().get(&self.id).cloned()
    }

    pub fn is_done(&self) -> bool {
        // A closed channel means the worker is gone, even if it panicked.
        *self.done.borrow() || self.done.has_changed().is_err()
    }

    pub fn latest_message(&self) -> Option<String> {
        self.snapshot()
            .and_then(|job| job.latest_message().map(str::to_string))
    }

    /// Human-readable progress line for the job.
    pub fn progress_text(&self) -> String {
        let Some(job) = self.snapshot() else {
            return format!("Job {} not found", self.id);
        };

        match job.state {
            JobState::Queued => "Waiting to start".to_string(),
            JobState::Running => format!("Converting items, processed {} versions", job.processed),
            JobState::Done => format!(
                "Conversion finished, {} versions were processed",
                job.processed
            ),
            JobState::Failed => format!(
                "Conversion failed after {} versions: {}",
                job.processed,
                job.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    /// Wait until the job has finished.
    pub async fn wait(&self) {
        let mut done = self.done.clone();
        let _ = done.wait_for(|finished| *finished).await;
    }
}
