//! Internal Rust models matching the database schema.
//!
//! This module provides strongly-typed Rust structures that map to database tables.
//! All models use types from mediashift-common where appropriate.

use chrono::{DateTime, Utc};
use mediashift_common::{BlobId, ItemId, VersionKey};
use serde::{Deserialize, Serialize};

/// Content record in the repository tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub database: String,
    pub parent_id: Option<ItemId>,
    pub name: String,
    pub extension: String,
    pub sort_order: i64,
    /// Clones mirror another record and must not be converted independently.
    pub is_clone: bool,
    /// Whether all versions share one media unit.
    pub shared_media: bool,
    pub created_at: DateTime<Utc>,
}

/// Media fields of one media unit (a version, or the shared unit).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaFieldRow {
    pub item_id: ItemId,
    pub version: VersionKey,
    /// Virtual path of the external file; empty when content is inline.
    pub file_path: String,
    /// Inline binary value referenced by the blob field.
    pub blob_id: Option<BlobId>,
    /// False for records whose template has no binary field at all.
    pub has_blob_field: bool,
    pub updated_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Stored inline binary value (metadata only).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlobInfo {
    pub id: BlobId,
    pub size: u64,
}
