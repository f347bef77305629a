//! Content repository access.
//!
//! The conversion engine only talks to the repository through
//! [`ContentRepository`]. Field mutations go through a [`MediaEdit`], which
//! buffers changes and is applied all-or-nothing by [`ContentRepository::commit_edit`].
//! An edit that is dropped without being committed changes nothing.

mod memory;
mod sqlite;
mod stream;

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;
pub use stream::{MediaStream, ReadSeek};

use mediashift_common::{BlobId, MediaReference, MediaVersion, Principal, Result};
use serde::{Deserialize, Serialize};

/// A repository record as seen by the conversion engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub reference: MediaReference,
    pub name: String,
    pub extension: String,
    /// Slash-separated path from the tree root.
    pub path: String,
    pub is_clone: bool,
    pub shared_media: bool,
}

/// Media fields of one media unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFields {
    /// Virtual path of the external file; empty when there is none.
    pub file_path: String,
    pub blob_id: Option<BlobId>,
    /// False when the record has no binary field at all.
    pub has_blob_field: bool,
}

impl MediaFields {
    pub fn is_external(&self) -> bool {
        !self.file_path.is_empty()
    }

    pub fn is_inline(&self) -> bool {
        self.blob_id.is_some()
    }

    pub fn has_content(&self) -> bool {
        self.is_external() || self.is_inline()
    }
}

/// Pending change to the binary field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobChange {
    Set(Vec<u8>),
    Clear,
}

/// Buffered mutation of one media unit's fields.
#[derive(Debug, Clone)]
pub struct MediaEdit {
    version: MediaVersion,
    principal: Principal,
    file_path: Option<String>,
    blob: Option<BlobChange>,
    expected_blob: Option<BlobId>,
}

impl MediaEdit {
    /// Begin an edit made on behalf of `principal`.
    pub fn new(version: MediaVersion, principal: Principal) -> Self {
        Self {
            version,
            principal,
            file_path: None,
            blob: None,
            expected_blob: None,
        }
    }

    pub fn set_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn set_blob(mut self, bytes: Vec<u8>) -> Self {
        self.blob = Some(BlobChange::Set(bytes));
        self
    }

    pub fn clear_blob(mut self) -> Self {
        self.blob = Some(BlobChange::Clear);
        self
    }

    /// Only commit if the binary field still references `blob_id`.
    pub fn expect_blob(mut self, blob_id: BlobId) -> Self {
        self.expected_blob = Some(blob_id);
        self
    }

    pub fn version(&self) -> &MediaVersion {
        &self.version
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    pub fn blob(&self) -> Option<&BlobChange> {
        self.blob.as_ref()
    }

    pub fn expected_blob(&self) -> Option<BlobId> {
        self.expected_blob
    }
}

/// Tree, version and field access needed by the conversion engine.
pub trait ContentRepository: Send + Sync {
    /// Get a record; `None` if it does not exist in the reference's database.
    fn get_item(&self, reference: &MediaReference) -> Result<Option<MediaItem>>;

    /// Direct children in traversal order (sort order, then name).
    fn children(&self, reference: &MediaReference) -> Result<Vec<MediaReference>>;

    /// All language/numbered versions of a record.
    fn versions(&self, reference: &MediaReference) -> Result<Vec<MediaVersion>>;

    /// Media fields of one unit; `None` when the unit has no fields.
    fn media_fields(&self, version: &MediaVersion) -> Result<Option<MediaFields>>;

    /// Whether the unit holds content in either representation.
    fn has_media_content(&self, version: &MediaVersion) -> Result<bool>;

    /// Read the binary field directly.
    fn blob_stream(&self, version: &MediaVersion) -> Result<Option<MediaStream>>;

    /// Read media content through the repository's media cache, if it has one.
    fn media_stream(&self, _version: &MediaVersion) -> Result<Option<MediaStream>> {
        Ok(None)
    }

    /// Apply an edit all-or-nothing.
    fn commit_edit(&self, edit: MediaEdit) -> Result<()>;

    /// Whether any media unit references the virtual file path.
    fn file_path_in_use(&self, path: &str) -> Result<bool>;

    /// Drop any cached state for a record.
    fn reload(&self, _reference: &MediaReference) -> Result<()> {
        Ok(())
    }
}
