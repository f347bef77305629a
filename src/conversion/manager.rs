//! Conversion management.
//!
//! [`MediaConversionManager`] owns the collaborators a batch needs, builds a
//! fresh pipeline per batch from the configuration, and runs batches as
//! background jobs.

use std::collections::HashMap;
use std::sync::Arc;

use mediashift_common::{JobId, Principal};
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::info;

use super::batch::{BatchConversionPipeline, BatchSummary};
use super::cleanup::{CleanupScheduler, CleanupWorkers};
use super::compare::ContentEqualityChecker;
use super::item::ItemConversionPipeline;
use super::paths::MediaPaths;
use super::queue::{CandidateQueue, ConversionRequest};
use super::statistics::CircuitBreaker;
use super::storage::StorageConverter;
use super::ConversionOptions;
use crate::config::Config;
use crate::jobs::{JobHandle, JobManager};
use crate::repository::ContentRepository;
use crate::security::Authorizer;

/// Name under which conversion batches appear in the job list.
pub const CONVERSION_JOB_NAME: &str = "MediaConversion";

/// Starts conversion batches and keeps their results.
pub struct MediaConversionManager {
    repository: Arc<dyn ContentRepository>,
    authorizer: Arc<dyn Authorizer>,
    config: Config,
    jobs: JobManager,
    scheduler: CleanupScheduler,
    workers: CleanupWorkers,
    summaries: Arc<RwLock<HashMap<JobId, BatchSummary>>>,
}

impl MediaConversionManager {
    /// Create a manager. Jobs and cleanup workers run on `runtime`.
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        authorizer: Arc<dyn Authorizer>,
        config: Config,
        runtime: Handle,
    ) -> Self {
        let paths = MediaPaths::new(&config.media.root, &config.media.folder);
        let (scheduler, workers) =
            CleanupScheduler::start(&runtime, repository.clone(), paths, &config.cleanup);

        Self {
            repository,
            authorizer,
            config,
            jobs: JobManager::new(runtime),
            scheduler,
            workers,
            summaries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build a batch pipeline from the current configuration.
    pub fn build_pipeline(&self) -> BatchConversionPipeline {
        let conversion = &self.config.conversion;
        let converter = StorageConverter::new(
            self.repository.clone(),
            MediaPaths::new(&self.config.media.root, &self.config.media.folder),
            ContentEqualityChecker::new(conversion.compare_chunk_size),
            self.config.media.max_inline_size,
        );
        let items = ItemConversionPipeline::new(
            self.repository.clone(),
            self.authorizer.clone(),
            converter,
            Some(self.scheduler.clone()),
            conversion.clone(),
        );

        BatchConversionPipeline::new(
            self.repository.clone(),
            items,
            CircuitBreaker::new(conversion.consecutive_error_limit),
            conversion.detailed_logging,
        )
    }

    /// Start converting `requests` in the background.
    ///
    /// # Arguments
    ///
    /// * `requests` - Roots to convert, processed in the given order
    /// * `options` - Target direction and the stop signal for the batch
    /// * `principal` - Account the conversion and its cleanup run as
    ///
    /// # Returns
    ///
    /// A handle to poll for progress. The batch summary is available from
    /// [`Self::summary`] once the job is done.
    pub fn start_conversion(
        &self,
        requests: Vec<ConversionRequest>,
        options: ConversionOptions,
        principal: Principal,
    ) -> JobHandle {
        info!(
            "Queuing {} conversion of {} roots for {}",
            options.direction,
            requests.len(),
            principal
        );

        let pipeline = self.build_pipeline();
        let queue = CandidateQueue::new(requests, self.repository.clone());
        let summaries = self.summaries.clone();

        self.jobs
            .start(CONVERSION_JOB_NAME, principal, move |ctx| {
                let principal = ctx.principal().clone();
                let (_, summary) = pipeline.run(&queue, &options, &principal, Some(&ctx));
                let error = summary.error.clone();
                summaries.write().insert(ctx.id(), summary);

                match error {
                    Some(e) => anyhow::bail!(e),
                    None => Ok(()),
                }
            })
    }

    /// Convert `requests` on the calling thread, without a job.
    pub fn run_conversion(
        &self,
        requests: Vec<ConversionRequest>,
        options: &ConversionOptions,
        principal: &Principal,
    ) -> BatchSummary {
        let queue = CandidateQueue::new(requests, self.repository.clone());
        let (_, summary) = self.build_pipeline().run(&queue, options, principal, None);
        summary
    }

    /// Summary of a finished conversion job.
    pub fn summary(&self, id: JobId) -> Option<BatchSummary> {
        self.summaries.read().get(&id).cloned()
    }

    /// Drop a finished conversion job and return its summary.
    ///
    /// Jobs and summaries are kept until forgotten; a long-lived host should
    /// call this once it has reported a batch. Running jobs are left alone.
    pub fn forget(&self, id: JobId) -> Option<BatchSummary> {
        self.jobs.remove_finished(id)?;
        self.summaries.write().remove(&id)
    }

    /// Stop accepting cleanup work and wait for pending cleanup to finish.
    pub async fn shutdown(self) {
        let Self {
            scheduler, workers, ..
        } = self;
        drop(scheduler);
        workers.join().await;
    }
}
