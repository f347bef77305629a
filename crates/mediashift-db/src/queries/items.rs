//! Content record query operations.
//!
//! Records form a tree per storage space ("database"). Children are returned in
//! sort order, then by name, which is the order conversion traverses them.

use chrono::Utc;
use mediashift_common::{Error, ItemId, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_column, parse_timestamp};
use crate::models::Item;

/// Parameters for creating a record.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub database: String,
    pub parent_id: Option<ItemId>,
    pub name: String,
    pub extension: String,
    pub sort_order: i64,
    pub is_clone: bool,
    pub shared_media: bool,
}

impl NewItem {
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            parent_id: None,
            name: name.into(),
            extension: String::new(),
            sort_order: 0,
            is_clone: false,
            shared_media: true,
        }
    }

    pub fn parent(mut self, parent_id: ItemId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn clone_of_source(mut self) -> Self {
        self.is_clone = true;
        self
    }

    /// Give every version its own media unit.
    pub fn versioned(mut self) -> Self {
        self.shared_media = false;
        self
    }
}

const ITEM_COLUMNS: &str =
    "id, database_name, parent_id, name, extension, sort_order, is_clone, shared_media, created_at";

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<Item> {
    let parent_id = match row.get::<_, Option<String>>(2)? {
        Some(value) => Some(parse_column(&value, 2)?),
        None => None,
    };

    Ok(Item {
        id: parse_column(&row.get::<_, String>(0)?, 0)?,
        database: row.get(1)?,
        parent_id,
        name: row.get(3)?,
        extension: row.get(4)?,
        sort_order: row.get(5)?,
        is_clone: row.get(6)?,
        shared_media: row.get(7)?,
        created_at: parse_timestamp(&row.get::<_, String>(8)?),
    })
}

/// Create a record.
pub fn create_item(conn: &Connection, new_item: &NewItem) -> Result<Item> {
    let id = ItemId::new();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO items (id, database_name, parent_id, name, extension, sort_order, is_clone, shared_media, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id.to_string(),
            new_item.database,
            new_item.parent_id.map(|p| p.to_string()),
            new_item.name,
            new_item.extension,
            new_item.sort_order,
            new_item.is_clone,
            new_item.shared_media,
            now.to_rfc3339(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Item {
        id,
        database: new_item.database.clone(),
        parent_id: new_item.parent_id,
        name: new_item.name.clone(),
        extension: new_item.extension.clone(),
        sort_order: new_item.sort_order,
        is_clone: new_item.is_clone,
        shared_media: new_item.shared_media,
        created_at: now,
    })
}

/// Get a record by id.
pub fn get_item(conn: &Connection, id: ItemId) -> Result<Option<Item>> {
    conn.query_row(
        &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?"),
        [id.to_string()],
        row_to_item,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// List the direct children of a record in traversal order.
pub fn list_children(conn: &Connection, parent_id: ItemId) -> Result<Vec<Item>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE parent_id = ? ORDER BY sort_order ASC, name ASC"
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let items = stmt
        .query_map([parent_id.to_string()], row_to_item)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(items)
}

/// Build the slash-separated path of a record from the tree root.
pub fn item_path(conn: &Connection, id: ItemId) -> Result<String> {
    let mut stmt = conn
        .prepare(
            "WITH RECURSIVE ancestry(id, parent_id, name, depth) AS (
                 SELECT id, parent_id, name, 0 FROM items WHERE id = ?
                 UNION ALL
                 SELECT i.id, i.parent_id, i.name, a.depth + 1
                 FROM items i JOIN ancestry a ON i.id = a.parent_id
             )
             SELECT name FROM ancestry ORDER BY depth DESC",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let names = stmt
        .query_map([id.to_string()], |row| row.get::<_, String>(0))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    if names.is_empty() {
        return Err(Error::not_found(format!("item {}", id)));
    }

    Ok(format!("/{}", names.join("/")))
}

/// Mark or unmark a record as a clone.
pub fn set_clone(conn: &Connection, id: ItemId, is_clone: bool) -> Result<()> {
    let affected = conn
        .execute(
            "UPDATE items SET is_clone = ? WHERE id = ?",
            params![is_clone, id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if affected == 0 {
        return Err(Error::not_found(format!("item {}", id)));
    }

    Ok(())
}
