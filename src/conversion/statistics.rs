//! Batch counters and the consecutive-failure circuit breaker.

use std::collections::{BTreeMap, HashMap};

use mediashift_common::size::friendly_size;
use mediashift_common::MediaVersion;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ConversionOutcome, ForceStop};

/// Running counters of one batch.
#[derive(Debug, Clone, Default)]
pub struct ConversionStatistics {
    pub processed: u64,
    pub skipped: u64,
    /// Failure reason per media unit.
    pub failed: HashMap<MediaVersion, String>,
    pub consecutive_errors: u32,
    pub bytes_converted: u64,
}

impl ConversionStatistics {
    /// Record the outcome of one media unit.
    pub fn record(&mut self, version: &MediaVersion, outcome: &ConversionOutcome, bytes: u64) {
        match outcome {
            ConversionOutcome::None(_) | ConversionOutcome::Skipped(_) => self.skipped += 1,
            ConversionOutcome::Processed(_) => {
                self.processed += 1;
                self.consecutive_errors = 0;
                self.bytes_converted += bytes;
            }
            ConversionOutcome::Failed(reason) => {
                self.failed.insert(version.clone(), reason.clone());
                self.consecutive_errors += 1;
            }
        }
    }

    pub fn failed_count(&self) -> u64 {
        self.failed.len() as u64
    }

    /// Human-readable summary lines for the job's progress record.
    pub fn summary_messages(&self) -> Vec<String> {
        vec![
            format!("Items processed: {}", self.processed),
            format!("Items skipped: {}", self.skipped),
            format!("Items failed: {}", self.failed_count()),
            format!("Content converted: {}", friendly_size(self.bytes_converted)),
        ]
    }

    /// Log every failure; reasons are included only with detailed logging.
    pub fn log_failures(&self, detailed: bool) {
        if self.failed.is_empty() {
            return;
        }

        warn!("{} media items failed to convert", self.failed.len());
        let mut failures: Vec<_> = self.failed.iter().collect();
        failures.sort_by_key(|(version, _)| version.to_string());
        for (version, reason) in failures {
            if detailed {
                info!("Failed: {} ({})", version, reason);
            } else {
                info!("Failed: {}", version);
            }
        }
    }

    /// Serializable snapshot.
    pub fn report(&self) -> StatisticsReport {
        StatisticsReport {
            processed: self.processed,
            skipped: self.skipped,
            failed: self.failed_count(),
            consecutive_errors: self.consecutive_errors,
            bytes_converted: self.bytes_converted,
            failures: self
                .failed
                .iter()
                .map(|(version, reason)| (version.to_string(), reason.clone()))
                .collect(),
        }
    }
}

/// Snapshot of [`ConversionStatistics`] keyed by display strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub consecutive_errors: u32,
    pub bytes_converted: u64,
    pub failures: BTreeMap<String, String>,
}

/// Stops a batch once too many units failed in a row.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreaker {
    limit: u32,
}

impl CircuitBreaker {
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Set `stop` when the limit is reached. Returns whether it tripped.
    pub fn check(&self, statistics: &ConversionStatistics, stop: &ForceStop) -> bool {
        if statistics.consecutive_errors < self.limit {
            return false;
        }

        if !stop.is_set() {
            warn!(
                "Conversion stopped after {} consecutive errors",
                statistics.consecutive_errors
            );
            stop.set();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediashift_common::{ItemId, MediaReference};

    fn unit() -> MediaVersion {
        MediaVersion::shared(MediaReference::new(ItemId::new(), "master"))
    }

    #[test]
    fn test_record_outcomes() {
        let mut stats = ConversionStatistics::default();
        stats.record(&unit(), &ConversionOutcome::None("empty".into()), 0);
        stats.record(&unit(), &ConversionOutcome::Skipped("clone".into()), 0);
        stats.record(&unit(), &ConversionOutcome::Failed("io".into()), 0);
        stats.record(&unit(), &ConversionOutcome::Failed("io".into()), 0);
        assert_eq!(stats.consecutive_errors, 2);

        stats.record(&unit(), &ConversionOutcome::Processed("ok".into()), 2048);
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.failed_count(), 2);
        assert_eq!(stats.consecutive_errors, 0);
        assert_eq!(stats.bytes_converted, 2048);
    }

    #[test]
    fn test_skips_do_not_reset_consecutive_errors() {
        let mut stats = ConversionStatistics::default();
        stats.record(&unit(), &ConversionOutcome::Failed("io".into()), 0);
        stats.record(&unit(), &ConversionOutcome::Skipped("clone".into()), 0);
        assert_eq!(stats.consecutive_errors, 1);
    }

    #[test]
    fn test_summary_messages() {
        let mut stats = ConversionStatistics::default();
        stats.record(&unit(), &ConversionOutcome::Processed("ok".into()), 1500);
        assert_eq!(
            stats.summary_messages(),
            vec![
                "Items processed: 1",
                "Items skipped: 0",
                "Items failed: 0",
                "Content converted: 1 kb",
            ]
        );
    }

    #[test]
    fn test_breaker_trips_at_limit() {
        let breaker = CircuitBreaker::new(2);
        let stop = ForceStop::new();
        let mut stats = ConversionStatistics::default();

        stats.record(&unit(), &ConversionOutcome::Failed("io".into()), 0);
        assert!(!breaker.check(&stats, &stop));
        assert!(!stop.is_set());

        stats.record(&unit(), &ConversionOutcome::Failed("io".into()), 0);
        assert!(breaker.check(&stats, &stop));
        assert!(stop.is_set());
    }

    #[test]
    fn test_report_is_serializable() {
        let mut stats = ConversionStatistics::default();
        let failed = unit();
        stats.record(&failed, &ConversionOutcome::Failed("disk full".into()), 0);

        let report = stats.report();
        assert_eq!(report.failures[&failed.to_string()], "disk full");
        assert!(serde_json::to_string(&report).is_ok());
    }
}
