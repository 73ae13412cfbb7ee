//! Database query modules.
//!
//! - bundles: bundle upsert, hash/id lookup, per-show listing, hash backfill
//! - catalog_files: catalog file upsert and resolution

pub mod bundles;
pub mod catalog_files;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;

/// Parse an RFC 3339 timestamp column.
pub(crate) fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Sizes are stored as SQLite integers (i64).
pub(crate) fn size_to_sql(size: Option<u64>) -> Option<i64> {
    size.and_then(|s| i64::try_from(s).ok())
}

pub(crate) fn size_from_sql(size: Option<i64>) -> Option<u64> {
    size.and_then(|s| u64::try_from(s).ok())
}
