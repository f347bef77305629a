//! Database query modules.
//!
//! This module organizes all database operations into logical groups:
//! - items: record CRUD and tree navigation
//! - versions: language/numbered revisions of a record
//! - media_fields: per-version media fields and the all-or-nothing field edit
//! - blobs: inline binary storage and orphan reclamation

pub mod blobs;
pub mod items;
pub mod media_fields;
pub mod versions;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use std::str::FromStr;

/// Parse a TEXT column holding an id, reporting bad values as conversion errors.
pub(crate) fn parse_column<T>(value: &str, column: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

pub(crate) fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}
