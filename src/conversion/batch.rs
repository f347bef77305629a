//! Draining a candidate queue through the item pipeline.

use std::sync::Arc;

use mediashift_common::size::friendly_size;
use mediashift_common::{Principal, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::item::ItemConversionPipeline;
use super::queue::{CandidateQueue, ConversionCandidate};
use super::statistics::{CircuitBreaker, ConversionStatistics, StatisticsReport};
use super::versions::versions_with_media;
use super::ConversionOptions;
use crate::jobs::JobContext;
use crate::repository::ContentRepository;

/// Final state of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub statistics: StatisticsReport,
    /// Whether the batch ended before the queue was drained.
    pub stopped: bool,
    /// Unexpected error that ended the batch.
    pub error: Option<String>,
    pub messages: Vec<String>,
}

pub struct BatchConversionPipeline {
    repository: Arc<dyn ContentRepository>,
    items: ItemConversionPipeline,
    breaker: CircuitBreaker,
    detailed_logging: bool,
}

impl BatchConversionPipeline {
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        items: ItemConversionPipeline,
        breaker: CircuitBreaker,
        detailed_logging: bool,
    ) -> Self {
        Self {
            repository,
            items,
            breaker,
            detailed_logging,
        }
    }

    /// Convert everything in the queue, in submission order, depth first.
    pub fn run(
        &self,
        queue: &CandidateQueue,
        options: &ConversionOptions,
        principal: &Principal,
        job: Option<&JobContext>,
    ) -> (ConversionStatistics, BatchSummary) {
        info!(
            "Starting {} conversion of {} roots",
            options.direction,
            queue.len()
        );

        let mut statistics = ConversionStatistics::default();
        let result = self.drain(queue, options, principal, job, &mut statistics);
        if let Err(e) = &result {
            error!("Media conversion aborted: {}", e);
        }

        let mut messages = Vec::new();
        if let Err(e) = &result {
            messages.push(format!("Conversion aborted: {}", e));
        }
        if statistics.consecutive_errors >= self.breaker.limit() {
            messages.push(format!(
                "Conversion was stopped after {} consecutive errors",
                statistics.consecutive_errors
            ));
        } else if options.force_stop.is_set() {
            messages.push("Conversion was stopped before all items were processed".to_string());
        }
        messages.extend(statistics.summary_messages());
        if let Some(job) = job {
            for message in &messages {
                job.add_message(message.clone());
            }
        }

        statistics.log_failures(self.detailed_logging);
        info!(
            "Conversion finished: {} processed, {} skipped, {} failed, {} converted",
            statistics.processed,
            statistics.skipped,
            statistics.failed_count(),
            friendly_size(statistics.bytes_converted)
        );

        let summary = BatchSummary {
            statistics: statistics.report(),
            stopped: options.force_stop.is_set(),
            error: result.err().map(|e| e.to_string()),
            messages,
        };
        (statistics, summary)
    }

    fn drain(
        &self,
        queue: &CandidateQueue,
        options: &ConversionOptions,
        principal: &Principal,
        job: Option<&JobContext>,
        statistics: &mut ConversionStatistics,
    ) -> Result<()> {
        for group in queue.groups() {
            for candidate in group {
                if self.should_stop(statistics, options) {
                    info!("Conversion stopped, skipping remaining items");
                    return Ok(());
                }

                let candidate = candidate?;
                self.process_candidate(&candidate, options, principal, job, statistics)?;
            }
        }
        Ok(())
    }

    fn should_stop(&self, statistics: &ConversionStatistics, options: &ConversionOptions) -> bool {
        self.breaker.check(statistics, &options.force_stop) || options.force_stop.is_set()
    }

    fn process_candidate(
        &self,
        candidate: &ConversionCandidate,
        options: &ConversionOptions,
        principal: &Principal,
        job: Option<&JobContext>,
        statistics: &mut ConversionStatistics,
    ) -> Result<()> {
        let reference = candidate.reference();
        self.repository.reload(reference)?;
        let Some(item) = self.repository.get_item(reference)? else {
            warn!("Item {} no longer exists, skipping it", reference);
            return Ok(());
        };

        if let Some(job) = job {
            job.add_message(format!(
                "Current item is {}: {}",
                reference.database, item.path
            ));
        }

        for version in versions_with_media(self.repository.as_ref(), &item)? {
            if self.should_stop(statistics, options) {
                break;
            }
            self.items
                .process(&item, &version, options, principal, statistics, job);
        }

        self.breaker.check(statistics, &options.force_stop);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::conversion::{ContentEqualityChecker, ConversionRequest, MediaPaths, StorageConverter};
    use crate::repository::MemoryRepository;
    use crate::security::AllowAll;
    use mediashift_common::{ConversionDirection, ItemId, MediaReference, MediaVersion};
    use mediashift_db::queries::items::NewItem;

    fn pipeline(
        repo: &Arc<MemoryRepository>,
        dir: &std::path::Path,
        limit: u32,
    ) -> BatchConversionPipeline {
        let converter = StorageConverter::new(
            repo.clone(),
            MediaPaths::new(dir, "/media"),
            ContentEqualityChecker::default(),
            1024,
        );
        let items = ItemConversionPipeline::new(
            repo.clone(),
            Arc::new(AllowAll),
            converter,
            None,
            ConversionConfig::default(),
        );
        BatchConversionPipeline::new(repo.clone(), items, CircuitBreaker::new(limit), false)
    }

    fn inline(repo: &MemoryRepository, new_item: NewItem, data: &[u8]) -> MediaReference {
        let reference = repo.create_item(&new_item).unwrap();
        repo.store_inline(&MediaVersion::shared(reference.clone()), data)
            .unwrap();
        reference
    }

    #[test]
    fn test_recursive_batch_converts_tree() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(MemoryRepository::new());
        let root = repo.create_item(&NewItem::new("master", "media")).unwrap();
        inline(&repo, NewItem::new("master", "a").parent(root.item_id), b"a");
        inline(&repo, NewItem::new("master", "b").parent(root.item_id), b"b");

        let queue = CandidateQueue::new(vec![ConversionRequest::new(root, true)], repo.clone());
        let options = ConversionOptions::new(ConversionDirection::ToExternal);
        let (stats, summary) =
            pipeline(&repo, dir.path(), 20).run(&queue, &options, &Principal::new("admin"), None);

        assert_eq!(stats.processed, 2);
        assert_eq!(stats.skipped, 0);
        assert!(!summary.stopped);
        assert!(summary.error.is_none());
        assert!(summary.messages.contains(&"Items processed: 2".to_string()));
    }

    #[test]
    fn test_force_stop_before_start_processes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(MemoryRepository::new());
        let a = inline(&repo, NewItem::new("master", "a"), b"a");

        let queue = CandidateQueue::new(vec![ConversionRequest::new(a, false)], repo.clone());
        let options = ConversionOptions::new(ConversionDirection::ToExternal);
        options.force_stop.set();
        let (stats, summary) =
            pipeline(&repo, dir.path(), 20).run(&queue, &options, &Principal::new("admin"), None);

        assert_eq!(stats.processed, 0);
        assert!(summary.stopped);
    }

    #[test]
    fn test_missing_root_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(MemoryRepository::new());
        let missing = MediaReference::new(ItemId::new(), "master");

        let queue = CandidateQueue::new(vec![ConversionRequest::new(missing, true)], repo.clone());
        let options = ConversionOptions::new(ConversionDirection::ToInline);
        let (stats, summary) =
            pipeline(&repo, dir.path(), 20).run(&queue, &options, &Principal::new("admin"), None);

        assert_eq!(stats.processed + stats.skipped + stats.failed_count(), 0);
        assert!(summary.error.is_none());
    }
}
