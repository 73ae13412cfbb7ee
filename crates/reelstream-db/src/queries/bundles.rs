//! Bundle database queries.
//!
//! Bundles are looked up by their short content hash first and by the long
//! upstream file id second, so links minted before hashes existed keep working.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use reelstream_common::{ChatId, Error, MessageId, Result};

use super::{parse_timestamp, size_from_sql, size_to_sql};
use crate::models::{BundleRecord, NewBundle, UpsertOutcome};

const BUNDLE_COLUMNS: &str = "file_id, file_unique_id, file_hash, title, show_id, season,
     episode_range, chat_id, msg_id, size_bytes, file_name, created_at, updated_at";

fn row_to_bundle(row: &Row<'_>) -> rusqlite::Result<BundleRecord> {
    Ok(BundleRecord {
        file_id: row.get(0)?,
        file_unique_id: row.get(1)?,
        file_hash: row.get(2)?,
        title: row.get(3)?,
        show_id: row.get(4)?,
        season: row.get(5)?,
        episode_range: row.get(6)?,
        chat_id: ChatId::new(row.get(7)?),
        msg_id: MessageId::new(row.get(8)?),
        size_bytes: size_from_sql(row.get(9)?),
        file_name: row.get(10)?,
        created_at: parse_timestamp(11, row.get(11)?)?,
        updated_at: parse_timestamp(12, row.get(12)?)?,
    })
}

fn query_one(conn: &Connection, sql: &str, key: &str) -> Result<Option<BundleRecord>> {
    conn.query_row(sql, [key], row_to_bundle)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// Insert or update a bundle by `file_id`.
///
/// A stored hash or unique id is never cleared by an update that lacks one.
pub fn upsert_bundle(conn: &Connection, bundle: &NewBundle) -> Result<UpsertOutcome> {
    let existed = get_bundle_by_file_id(conn, &bundle.file_id)?.is_some();
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO bundles (file_id, file_unique_id, file_hash, title, show_id, season,
             episode_range, chat_id, msg_id, size_bytes, file_name, created_at, updated_at)
         VALUES (:file_id, :file_unique_id, :file_hash, :title, :show_id, :season,
             :episode_range, :chat_id, :msg_id, :size_bytes, :file_name, :now, :now)
         ON CONFLICT(file_id) DO UPDATE SET
             file_unique_id = COALESCE(excluded.file_unique_id, bundles.file_unique_id),
             file_hash = COALESCE(excluded.file_hash, bundles.file_hash),
             title = excluded.title,
             show_id = excluded.show_id,
             season = excluded.season,
             episode_range = excluded.episode_range,
             chat_id = excluded.chat_id,
             msg_id = excluded.msg_id,
             size_bytes = excluded.size_bytes,
             file_name = excluded.file_name,
             updated_at = excluded.updated_at",
        rusqlite::named_params! {
            ":file_id": bundle.file_id,
            ":file_unique_id": bundle.file_unique_id,
            ":file_hash": bundle.file_hash,
            ":title": bundle.title,
            ":show_id": bundle.show_id,
            ":season": bundle.season,
            ":episode_range": bundle.episode_range,
            ":chat_id": bundle.chat_id.get(),
            ":msg_id": bundle.msg_id.get(),
            ":size_bytes": size_to_sql(bundle.size_bytes),
            ":file_name": bundle.file_name,
            ":now": now,
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(if existed {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Inserted
    })
}

/// Find a bundle by its short content hash.
pub fn get_bundle_by_hash(conn: &Connection, file_hash: &str) -> Result<Option<BundleRecord>> {
    let sql = format!("SELECT {BUNDLE_COLUMNS} FROM bundles WHERE file_hash = ? LIMIT 1");
    query_one(conn, &sql, file_hash)
}

/// Find a bundle by its long upstream file id.
pub fn get_bundle_by_file_id(conn: &Connection, file_id: &str) -> Result<Option<BundleRecord>> {
    let sql = format!("SELECT {BUNDLE_COLUMNS} FROM bundles WHERE file_id = ?");
    query_one(conn, &sql, file_id)
}

/// Find a bundle by hash (preferred) or file id (legacy fallback).
pub fn get_bundle_by_hash_or_id(
    conn: &Connection,
    identifier: &str,
) -> Result<Option<BundleRecord>> {
    if let Some(bundle) = get_bundle_by_hash(conn, identifier)? {
        return Ok(Some(bundle));
    }
    get_bundle_by_file_id(conn, identifier)
}

/// List all bundles of a show ordered by season.
pub fn list_bundles_for_show(conn: &Connection, show_id: i64) -> Result<Vec<BundleRecord>> {
    let sql = format!(
        "SELECT {BUNDLE_COLUMNS} FROM bundles WHERE show_id = ?
         ORDER BY season IS NULL, season, title"
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([show_id], row_to_bundle)
        .map_err(|e| Error::database(e.to_string()))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))
}

/// List bundles that have no content hash yet.
pub fn list_bundles_missing_hash(conn: &Connection) -> Result<Vec<BundleRecord>> {
    let sql = format!(
        "SELECT {BUNDLE_COLUMNS} FROM bundles WHERE file_hash IS NULL OR file_hash = ''
         ORDER BY created_at"
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], row_to_bundle)
        .map_err(|e| Error::database(e.to_string()))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))
}

/// Store the content hash and full unique id of a bundle.
///
/// Returns `false` if no bundle with `file_id` exists.
pub fn set_bundle_hash(
    conn: &Connection,
    file_id: &str,
    file_unique_id: &str,
    file_hash: &str,
) -> Result<bool> {
    let rows = conn
        .execute(
            "UPDATE bundles SET file_unique_id = :unique_id, file_hash = :hash, updated_at = :now
             WHERE file_id = :file_id",
            rusqlite::named_params! {
                ":unique_id": file_unique_id,
                ":hash": file_hash,
                ":now": Utc::now().to_rfc3339(),
                ":file_id": file_id,
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows > 0)
}
