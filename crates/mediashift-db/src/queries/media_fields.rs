//! Media field query operations.
//!
//! Each media unit of a record has one row holding the external file path and
//! the inline blob reference. [`apply_edit`] changes both in a single
//! transaction so a conversion never leaves a half-written record behind.

use chrono::Utc;
use mediashift_common::{BlobId, Error, ItemId, Result, VersionKey};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{blobs, parse_column, parse_timestamp};
use crate::models::MediaFieldRow;

/// Change to the inline blob field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobWrite<'a> {
    /// Store new content in the field.
    Set(&'a [u8]),
    /// Empty the field.
    Clear,
}

/// One all-or-nothing edit of a media unit's fields.
#[derive(Debug, Clone, Copy)]
pub struct FieldEdit<'a> {
    pub file_path: Option<&'a str>,
    pub blob: Option<BlobWrite<'a>>,
    /// Abort unless the field still references this blob.
    pub expect_blob: Option<BlobId>,
    pub edited_by: &'a str,
}

const FIELD_COLUMNS: &str =
    "item_id, language, version, file_path, blob_id, has_blob_field, updated_by, updated_at";

fn row_to_fields(row: &Row<'_>) -> rusqlite::Result<MediaFieldRow> {
    let blob_id = match row.get::<_, Option<String>>(4)? {
        Some(value) => Some(parse_column(&value, 4)?),
        None => None,
    };

    Ok(MediaFieldRow {
        item_id: parse_column(&row.get::<_, String>(0)?, 0)?,
        version: VersionKey::new(row.get::<_, String>(1)?, row.get(2)?),
        file_path: row.get(3)?,
        blob_id,
        has_blob_field: row.get(5)?,
        updated_by: row.get(6)?,
        updated_at: row
            .get::<_, Option<String>>(7)?
            .map(|value| parse_timestamp(&value)),
    })
}

/// Get the media fields of one unit.
pub fn get_media_fields(
    conn: &Connection,
    item_id: ItemId,
    version: &VersionKey,
) -> Result<Option<MediaFieldRow>> {
    conn.query_row(
        &format!(
            "SELECT {FIELD_COLUMNS} FROM media_fields
             WHERE item_id = ? AND language = ? AND version = ?"
        ),
        params![item_id.to_string(), version.language, version.number],
        row_to_fields,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Create or replace the media fields of one unit.
pub fn upsert_media_fields(
    conn: &Connection,
    item_id: ItemId,
    version: &VersionKey,
    file_path: &str,
    blob_id: Option<BlobId>,
    has_blob_field: bool,
) -> Result<()> {
    conn.execute(
        "INSERT INTO media_fields (item_id, language, version, file_path, blob_id, has_blob_field)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(item_id, language, version) DO UPDATE SET
             file_path = excluded.file_path,
             blob_id = excluded.blob_id,
             has_blob_field = excluded.has_blob_field",
        params![
            item_id.to_string(),
            version.language,
            version.number,
            file_path,
            blob_id.map(|b| b.to_string()),
            has_blob_field,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Whether a unit holds content in either representation.
pub fn has_media_content(conn: &Connection, item_id: ItemId, version: &VersionKey) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS (
             SELECT 1 FROM media_fields
             WHERE item_id = ? AND language = ? AND version = ?
             AND (file_path <> '' OR blob_id IS NOT NULL)
         )",
        params![item_id.to_string(), version.language, version.number],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Count the media units whose file path is `file_path`.
pub fn count_file_path_references(conn: &Connection, file_path: &str) -> Result<u64> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM media_fields WHERE file_path = ?",
            [file_path],
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(count.max(0) as u64)
}

/// Number of media units per storage representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageCounts {
    pub inline: u64,
    pub external: u64,
    /// Units with both an external path and an inline value.
    pub both: u64,
    pub empty: u64,
}

/// Count media units by where their content is stored.
pub fn storage_counts(conn: &Connection) -> Result<StorageCounts> {
    conn.query_row(
        "SELECT
             COALESCE(SUM(file_path = '' AND blob_id IS NOT NULL), 0),
             COALESCE(SUM(file_path <> '' AND blob_id IS NULL), 0),
             COALESCE(SUM(file_path <> '' AND blob_id IS NOT NULL), 0),
             COALESCE(SUM(file_path = '' AND blob_id IS NULL), 0)
         FROM media_fields",
        [],
        |row| {
            Ok(StorageCounts {
                inline: row.get::<_, i64>(0)?.max(0) as u64,
                external: row.get::<_, i64>(1)?.max(0) as u64,
                both: row.get::<_, i64>(2)?.max(0) as u64,
                empty: row.get::<_, i64>(3)?.max(0) as u64,
            })
        },
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Apply an edit to one unit's fields in a single transaction.
///
/// A replaced or cleared blob is deleted once nothing references it. Returns
/// the fields as committed.
pub fn apply_edit(
    conn: &mut Connection,
    item_id: ItemId,
    version: &VersionKey,
    edit: &FieldEdit<'_>,
) -> Result<MediaFieldRow> {
    let tx = conn
        .transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let current = get_media_fields(&tx, item_id, version)?;
    let (mut file_path, mut blob_id, has_blob_field) = match &current {
        Some(row) => (row.file_path.clone(), row.blob_id, row.has_blob_field),
        None => (String::new(), None, true),
    };

    if let Some(expected) = edit.expect_blob {
        if blob_id != Some(expected) {
            return Err(Error::conflict(format!(
                "media field of {} no longer references blob {}",
                item_id, expected
            )));
        }
    }

    if let Some(path) = edit.file_path {
        file_path = path.to_string();
    }

    let previous_blob = blob_id;
    match edit.blob {
        Some(BlobWrite::Set(data)) => {
            if !has_blob_field {
                return Err(Error::invalid_input(format!(
                    "item {} has no binary field",
                    item_id
                )));
            }
            blob_id = Some(blobs::insert_blob(&tx, data)?);
        }
        Some(BlobWrite::Clear) => blob_id = None,
        None => {}
    }

    let now = Utc::now();
    tx.execute(
        "INSERT INTO media_fields
             (item_id, language, version, file_path, blob_id, has_blob_field, updated_by, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(item_id, language, version) DO UPDATE SET
             file_path = excluded.file_path,
             blob_id = excluded.blob_id,
             updated_by = excluded.updated_by,
             updated_at = excluded.updated_at",
        params![
            item_id.to_string(),
            version.language,
            version.number,
            file_path,
            blob_id.map(|b| b.to_string()),
            has_blob_field,
            edit.edited_by,
            now.to_rfc3339(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    if let Some(old) = previous_blob.filter(|old| Some(*old) != blob_id) {
        blobs::delete_blob_if_orphaned(&tx, old)?;
    }

    tx.commit().map_err(|e| Error::database(e.to_string()))?;

    Ok(MediaFieldRow {
        item_id,
        version: version.clone(),
        file_path,
        blob_id,
        has_blob_field,
        updated_by: Some(edit.edited_by.to_string()),
        updated_at: Some(now),
    })
}
