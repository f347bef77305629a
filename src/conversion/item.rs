//! Conversion of a single media unit.
//!
//! Steps run in a fixed order and any of them may end the unit early with
//! its outcome: clone check, security check, applicability check, storage
//! conversion, cleanup scheduling. Statistics are updated for every unit,
//! however it ended.

use std::sync::Arc;

use mediashift_common::{AccessRight, ConversionDirection, MediaVersion, Principal};
use tracing::{debug, info};

use super::cleanup::{CleanupScheduler, CleanupTask};
use super::statistics::ConversionStatistics;
use super::storage::{Converted, StorageConverter, StorageResult};
use super::{ConversionOptions, ConversionOutcome};
use crate::config::ConversionConfig;
use crate::jobs::JobContext;
use crate::repository::{ContentRepository, MediaItem};
use crate::security::Authorizer;

/// `Err` ends the unit with the carried outcome.
type Step<T> = Result<T, ConversionOutcome>;

pub struct ItemConversionPipeline {
    repository: Arc<dyn ContentRepository>,
    authorizer: Arc<dyn Authorizer>,
    converter: StorageConverter,
    cleanup: Option<CleanupScheduler>,
    config: ConversionConfig,
}

impl ItemConversionPipeline {
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        authorizer: Arc<dyn Authorizer>,
        converter: StorageConverter,
        cleanup: Option<CleanupScheduler>,
        config: ConversionConfig,
    ) -> Self {
        Self {
            repository,
            authorizer,
            converter,
            cleanup,
            config,
        }
    }

    /// Run one media unit through every step and record the outcome.
    pub fn process(
        &self,
        item: &MediaItem,
        version: &MediaVersion,
        options: &ConversionOptions,
        principal: &Principal,
        statistics: &mut ConversionStatistics,
        job: Option<&JobContext>,
    ) -> ConversionOutcome {
        let (outcome, bytes) = match self.run(item, version, options.direction, principal) {
            Ok(converted) => {
                self.schedule_cleanup(&converted, version, options.direction, principal);
                (ConversionOutcome::Processed(converted.detail), converted.bytes)
            }
            Err(outcome) => (outcome, 0),
        };

        self.update_statistics(version, &outcome, bytes, statistics, job);
        outcome
    }

    fn run(
        &self,
        item: &MediaItem,
        version: &MediaVersion,
        direction: ConversionDirection,
        principal: &Principal,
    ) -> Step<Converted> {
        self.check_clone(item)?;
        self.check_security(item, principal)?;
        self.check_applicability(version, direction)?;
        self.convert(item, version, direction, principal)
    }

    fn check_clone(&self, item: &MediaItem) -> Step<()> {
        if item.is_clone {
            return Err(ConversionOutcome::Skipped(
                "item is a clone and is converted with its source".to_string(),
            ));
        }
        Ok(())
    }

    fn check_security(&self, item: &MediaItem, principal: &Principal) -> Step<()> {
        let allowed = [AccessRight::Read, AccessRight::Write]
            .into_iter()
            .all(|right| self.authorizer.is_allowed(item, right, principal));
        if !allowed {
            return Err(ConversionOutcome::Skipped(format!(
                "{} lacks read and write access",
                principal
            )));
        }
        Ok(())
    }

    fn check_applicability(&self, version: &MediaVersion, direction: ConversionDirection) -> Step<()> {
        let fields = self
            .repository
            .media_fields(version)
            .map_err(|e| ConversionOutcome::Failed(e.to_string()))?
            .filter(|fields| fields.has_content())
            .ok_or_else(|| ConversionOutcome::None("no media content".to_string()))?;

        match direction {
            ConversionDirection::ToExternal if fields.is_external() => {
                Err(ConversionOutcome::Skipped(format!(
                    "media is already stored in file '{}'",
                    fields.file_path
                )))
            }
            ConversionDirection::ToInline if fields.is_inline() => Err(ConversionOutcome::Skipped(
                "media is already stored in the database".to_string(),
            )),
            ConversionDirection::ToInline if !fields.has_blob_field => {
                Err(ConversionOutcome::Skipped(
                    "item has no binary field to store media in".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    fn convert(
        &self,
        item: &MediaItem,
        version: &MediaVersion,
        direction: ConversionDirection,
        principal: &Principal,
    ) -> Step<Converted> {
        match self.converter.convert(item, version, direction, principal) {
            Ok(StorageResult::Converted(converted)) => Ok(converted),
            Ok(StorageResult::Skipped(reason)) => Err(ConversionOutcome::Skipped(reason)),
            Err(e) => Err(ConversionOutcome::Failed(e.to_string())),
        }
    }

    fn schedule_cleanup(
        &self,
        converted: &Converted,
        version: &MediaVersion,
        direction: ConversionDirection,
        principal: &Principal,
    ) {
        if !self.config.deletes_prior(direction) {
            return;
        }
        let (Some(cleanup), Some(prior)) = (&self.cleanup, &converted.previous) else {
            return;
        };

        cleanup.schedule(CleanupTask {
            version: version.clone(),
            prior: prior.clone(),
            direction,
            principal: principal.clone(),
        });
    }

    fn update_statistics(
        &self,
        version: &MediaVersion,
        outcome: &ConversionOutcome,
        bytes: u64,
        statistics: &mut ConversionStatistics,
        job: Option<&JobContext>,
    ) {
        statistics.record(version, outcome, bytes);

        if let Some(job) = job {
            if !matches!(outcome, ConversionOutcome::None(_)) {
                job.increment_processed();
            }
        }

        if self.config.detailed_logging {
            info!("{}: {} ({})", version, outcome.action(), outcome.message());
        } else {
            debug!("{}: {} ({})", version, outcome.action(), outcome.message());
        }
    }
}
