//! Inline binary storage.
//!
//! Blob rows are referenced from `media_fields.blob_id`. A blob is only
//! deleted once no media field references it.

use mediashift_common::{BlobId, Error, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::parse_column;
use crate::models::BlobInfo;

/// Store a new blob and return its id.
pub fn insert_blob(conn: &Connection, data: &[u8]) -> Result<BlobId> {
    let id = BlobId::new();
    conn.execute(
        "INSERT INTO blobs (id, data, size) VALUES (?, ?, ?)",
        params![id.to_string(), data, data.len() as i64],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(id)
}

/// Read the full content of a blob.
pub fn get_blob_data(conn: &Connection, id: BlobId) -> Result<Option<Vec<u8>>> {
    conn.query_row("SELECT data FROM blobs WHERE id = ?", [id.to_string()], |row| {
        row.get::<_, Vec<u8>>(0)
    })
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Get blob metadata without loading its content.
pub fn get_blob_info(conn: &Connection, id: BlobId) -> Result<Option<BlobInfo>> {
    conn.query_row(
        "SELECT id, size FROM blobs WHERE id = ?",
        [id.to_string()],
        |row| {
            Ok(BlobInfo {
                id: parse_column(&row.get::<_, String>(0)?, 0)?,
                size: row.get::<_, i64>(1)?.max(0) as u64,
            })
        },
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Delete a blob if no media field references it. Returns whether it was deleted.
pub fn delete_blob_if_orphaned(conn: &Connection, id: BlobId) -> Result<bool> {
    let affected = conn
        .execute(
            "DELETE FROM blobs WHERE id = ?1
             AND NOT EXISTS (SELECT 1 FROM media_fields WHERE blob_id = ?1)",
            [id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(affected > 0)
}

/// Delete every blob that no media field references. Returns the number removed.
pub fn remove_orphaned_blobs(conn: &Connection) -> Result<usize> {
    conn.execute(
        "DELETE FROM blobs WHERE NOT EXISTS
         (SELECT 1 FROM media_fields WHERE media_fields.blob_id = blobs.id)",
        [],
    )
    .map_err(|e| Error::database(e.to_string()))
}
