//! SQLite-backed content repository.

use mediashift_common::{Error, MediaReference, MediaVersion, Result, VersionKey};
use mediashift_db::models::Item;
use mediashift_db::pool::{get_conn, DbPool};
use mediashift_db::queries::items::{self, NewItem};
use mediashift_db::queries::media_fields::{self, BlobWrite, FieldEdit, StorageCounts};
use mediashift_db::queries::{blobs, versions};
use tracing::debug;

use super::{BlobChange, ContentRepository, MediaEdit, MediaFields, MediaItem, MediaStream};

/// Content repository stored in the mediashift database.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Create a record and return its reference.
    pub fn create_item(&self, new_item: &NewItem) -> Result<MediaReference> {
        let conn = get_conn(&self.pool)?;
        let item = items::create_item(&conn, new_item)?;
        Ok(MediaReference::new(item.id, item.database))
    }

    /// Add a version to a record.
    pub fn add_version(&self, reference: &MediaReference, key: VersionKey) -> Result<MediaVersion> {
        let conn = get_conn(&self.pool)?;
        versions::add_version(&conn, reference.item_id, &key)?;
        Ok(MediaVersion::new(reference.clone(), key))
    }

    /// Store content inline, with no external path.
    pub fn store_inline(&self, version: &MediaVersion, data: &[u8]) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        let blob_id = blobs::insert_blob(&conn, data)?;
        media_fields::upsert_media_fields(
            &conn,
            version.item_id(),
            &version.version,
            "",
            Some(blob_id),
            true,
        )
    }

    /// Point a unit at an external file, with an empty binary field.
    pub fn store_external(&self, version: &MediaVersion, path: &str) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        media_fields::upsert_media_fields(&conn, version.item_id(), &version.version, path, None, true)
    }

    /// Point a unit at an external file on a record that has no binary field.
    pub fn store_without_blob_field(&self, version: &MediaVersion, path: &str) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        media_fields::upsert_media_fields(
            &conn,
            version.item_id(),
            &version.version,
            path,
            None,
            false,
        )
    }

    /// Delete blobs that no media field references.
    pub fn remove_orphaned_blobs(&self) -> Result<usize> {
        let conn = get_conn(&self.pool)?;
        let removed = blobs::remove_orphaned_blobs(&conn)?;
        debug!("Removed {} orphaned blobs", removed);
        Ok(removed)
    }

    /// Count media units per storage representation.
    pub fn storage_counts(&self) -> Result<StorageCounts> {
        let conn = get_conn(&self.pool)?;
        media_fields::storage_counts(&conn)
    }

    fn load_item(&self, reference: &MediaReference) -> Result<Option<Item>> {
        let conn = get_conn(&self.pool)?;
        Ok(items::get_item(&conn, reference.item_id)?
            .filter(|item| item.database == reference.database))
    }
}

impl ContentRepository for SqliteRepository {
    fn get_item(&self, reference: &MediaReference) -> Result<Option<MediaItem>> {
        let Some(item) = self.load_item(reference)? else {
            return Ok(None);
        };

        let conn = get_conn(&self.pool)?;
        let path = items::item_path(&conn, item.id)?;

        Ok(Some(MediaItem {
            reference: reference.clone(),
            name: item.name,
            extension: item.extension,
            path,
            is_clone: item.is_clone,
            shared_media: item.shared_media,
        }))
    }

    fn children(&self, reference: &MediaReference) -> Result<Vec<MediaReference>> {
        let conn = get_conn(&self.pool)?;
        let children = items::list_children(&conn, reference.item_id)?;
        Ok(children
            .into_iter()
            .map(|child| MediaReference::new(child.id, child.database))
            .collect())
    }

    fn versions(&self, reference: &MediaReference) -> Result<Vec<MediaVersion>> {
        let conn = get_conn(&self.pool)?;
        let keys = versions::list_versions(&conn, reference.item_id)?;
        Ok(keys
            .into_iter()
            .map(|key| MediaVersion::new(reference.clone(), key))
            .collect())
    }

    fn media_fields(&self, version: &MediaVersion) -> Result<Option<MediaFields>> {
        let conn = get_conn(&self.pool)?;
        let row = media_fields::get_media_fields(&conn, version.item_id(), &version.version)?;
        Ok(row.map(|row| MediaFields {
            file_path: row.file_path,
            blob_id: row.blob_id,
            has_blob_field: row.has_blob_field,
        }))
    }

    fn has_media_content(&self, version: &MediaVersion) -> Result<bool> {
        let conn = get_conn(&self.pool)?;
        media_fields::has_media_content(&conn, version.item_id(), &version.version)
    }

    fn blob_stream(&self, version: &MediaVersion) -> Result<Option<MediaStream>> {
        let conn = get_conn(&self.pool)?;
        let row = media_fields::get_media_fields(&conn, version.item_id(), &version.version)?;
        let Some(blob_id) = row.and_then(|row| row.blob_id) else {
            return Ok(None);
        };

        Ok(blobs::get_blob_data(&conn, blob_id)?.map(MediaStream::from_bytes))
    }

    fn commit_edit(&self, edit: MediaEdit) -> Result<()> {
        let mut conn = get_conn(&self.pool)?;
        let blob = match edit.blob() {
            Some(BlobChange::Set(bytes)) => Some(BlobWrite::Set(bytes.as_slice())),
            Some(BlobChange::Clear) => Some(BlobWrite::Clear),
            None => None,
        };

        let field_edit = FieldEdit {
            file_path: edit.file_path(),
            blob,
            expect_blob: edit.expected_blob(),
            edited_by: edit.principal().name(),
        };

        let version = edit.version();
        let exists = items::get_item(&conn, version.item_id())?
            .is_some_and(|item| item.database == version.reference.database);
        if !exists {
            return Err(Error::not_found(version.reference.to_string()));
        }

        media_fields::apply_edit(&mut conn, version.item_id(), &version.version, &field_edit)?;
        Ok(())
    }

    fn file_path_in_use(&self, path: &str) -> Result<bool> {
        let conn = get_conn(&self.pool)?;
        Ok(media_fields::count_file_path_references(&conn, path)? > 0)
    }
}
