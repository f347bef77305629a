//! Record version query operations.

use mediashift_common::{Error, ItemId, Result, VersionKey};
use rusqlite::{params, Connection};

/// Add a language/numbered version to a record. Adding an existing version is a no-op.
pub fn add_version(conn: &Connection, item_id: ItemId, version: &VersionKey) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO item_versions (item_id, language, version) VALUES (?, ?, ?)",
        params![item_id.to_string(), version.language, version.number],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// List all versions of a record ordered by language, then number.
pub fn list_versions(conn: &Connection, item_id: ItemId) -> Result<Vec<VersionKey>> {
    let mut stmt = conn
        .prepare(
            "SELECT language, version FROM item_versions
             WHERE item_id = ? ORDER BY language ASC, version ASC",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let versions = stmt
        .query_map([item_id.to_string()], |row| {
            Ok(VersionKey::new(row.get::<_, String>(0)?, row.get(1)?))
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(versions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{get_conn, init_memory_pool};
    use crate::queries::items::{create_item, NewItem};

    #[test]
    fn test_add_and_list_versions() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let item = create_item(&conn, &NewItem::new("master", "logo").versioned()).unwrap();

        add_version(&conn, item.id, &VersionKey::new("en", 2)).unwrap();
        add_version(&conn, item.id, &VersionKey::new("en", 1)).unwrap();
        add_version(&conn, item.id, &VersionKey::new("da", 1)).unwrap();
        add_version(&conn, item.id, &VersionKey::new("en", 1)).unwrap();

        let versions = list_versions(&conn, item.id).unwrap();
        assert_eq!(
            versions,
            vec![
                VersionKey::new("da", 1),
                VersionKey::new("en", 1),
                VersionKey::new("en", 2),
            ]
        );
    }
}
