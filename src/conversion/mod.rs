//! Media storage conversion.
//!
//! A batch expands the submitted references into candidates
//! ([`queue`]), resolves the media units of each record ([`versions`]), and
//! runs every unit through the item pipeline ([`item`]). Successful
//! conversions hand the storage they replaced to background cleanup
//! ([`cleanup`]). [`manager`] wires these together and runs batches as jobs.

pub mod batch;
pub mod cleanup;
pub mod compare;
pub mod item;
pub mod manager;
pub mod paths;
pub mod queue;
pub mod statistics;
pub mod storage;
pub mod versions;

pub use batch::{BatchConversionPipeline, BatchSummary};
pub use cleanup::{CleanupScheduler, CleanupTask, CleanupWorkers};
pub use compare::ContentEqualityChecker;
pub use item::ItemConversionPipeline;
pub use manager::MediaConversionManager;
pub use paths::MediaPaths;
pub use queue::{CandidateGroup, CandidateQueue, ConversionCandidate, ConversionRequest};
pub use statistics::{CircuitBreaker, ConversionStatistics, StatisticsReport};
pub use storage::{Converted, PriorStorage, StorageConverter, StorageResult};
pub use versions::versions_with_media;

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mediashift_common::ConversionDirection;
use serde::{Deserialize, Serialize};

/// Errors raised while converting a single media unit.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Repository(#[from] mediashift_common::Error),

    #[error("Cannot find media data for {0}")]
    MissingMedia(String),

    #[error("Failed to save fields of {version}: {source}")]
    Commit {
        version: String,
        #[source]
        source: mediashift_common::Error,
    },

    #[error("Invalid media path: {0}")]
    InvalidPath(String),
}

impl ConversionError {
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Cooperative stop signal shared by everything taking part in a batch.
#[derive(Debug, Clone, Default)]
pub struct ForceStop(Arc<AtomicBool>);

impl ForceStop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for one batch.
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    pub direction: ConversionDirection,
    pub force_stop: ForceStop,
}

impl ConversionOptions {
    pub fn new(direction: ConversionDirection) -> Self {
        Self {
            direction,
            force_stop: ForceStop::new(),
        }
    }
}

/// Result of running one media unit through the item pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "message", rename_all = "lowercase")]
pub enum ConversionOutcome {
    /// Nothing to do for this unit.
    None(String),
    Skipped(String),
    Processed(String),
    Failed(String),
}

impl ConversionOutcome {
    pub fn action(&self) -> &'static str {
        match self {
            Self::None(_) => "none",
            Self::Skipped(_) => "skipped",
            Self::Processed(_) => "processed",
            Self::Failed(_) => "failed",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::None(m) | Self::Skipped(m) | Self::Processed(m) | Self::Failed(m) => m,
        }
    }
}

impl fmt::Display for ConversionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.action(), self.message())
    }
}
