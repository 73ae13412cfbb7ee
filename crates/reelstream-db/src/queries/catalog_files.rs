//! Catalog file queries.

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use reelstream_common::{ChatId, Error, MediaType, MessageId, Result};

use super::{parse_timestamp, size_from_sql, size_to_sql};
use crate::models::{CatalogFile, NewCatalogFile, UpsertOutcome};

const FILE_COLUMNS: &str = "id, content_id, media_type, season_number, episode_number,
     quality_index, quality_label, chat_id, msg_id, file_hash, size_bytes, file_name,
     created_at, updated_at";

fn row_to_file(row: &Row<'_>) -> rusqlite::Result<CatalogFile> {
    let media_type: String = row.get(2)?;
    let media_type = media_type.parse::<MediaType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into())
    })?;

    Ok(CatalogFile {
        id: row.get(0)?,
        content_id: row.get(1)?,
        media_type,
        season_number: row.get(3)?,
        episode_number: row.get(4)?,
        quality_index: row.get(5)?,
        quality_label: row.get(6)?,
        chat_id: ChatId::new(row.get(7)?),
        msg_id: MessageId::new(row.get(8)?),
        file_hash: row.get(9)?,
        size_bytes: size_from_sql(row.get(10)?),
        file_name: row.get(11)?,
        created_at: parse_timestamp(12, row.get(12)?)?,
        updated_at: parse_timestamp(13, row.get(13)?)?,
    })
}

/// Insert or update the file at a catalog slot.
///
/// A slot is `(content_id, media_type, season, episode, quality_index)`.
/// Bundles live in their own table and are rejected here.
pub fn upsert_catalog_file(conn: &Connection, file: &NewCatalogFile) -> Result<UpsertOutcome> {
    if file.media_type == MediaType::Bundle {
        return Err(Error::invalid_input(
            "bundles are stored with upsert_bundle, not as catalog files",
        ));
    }

    let now = Utc::now().to_rfc3339();
    let updated = conn
        .execute(
            "UPDATE catalog_files SET
                 quality_label = :quality_label,
                 chat_id = :chat_id,
                 msg_id = :msg_id,
                 file_hash = COALESCE(:file_hash, file_hash),
                 size_bytes = :size_bytes,
                 file_name = :file_name,
                 updated_at = :now
             WHERE content_id = :content_id AND media_type = :media_type
               AND season_number IS :season AND episode_number IS :episode
               AND quality_index = :quality_index",
            rusqlite::named_params! {
                ":quality_label": file.quality_label,
                ":chat_id": file.chat_id.get(),
                ":msg_id": file.msg_id.get(),
                ":file_hash": file.file_hash,
                ":size_bytes": size_to_sql(file.size_bytes),
                ":file_name": file.file_name,
                ":now": now,
                ":content_id": file.content_id,
                ":media_type": file.media_type.as_str(),
                ":season": file.season_number,
                ":episode": file.episode_number,
                ":quality_index": file.quality_index,
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if updated > 0 {
        return Ok(UpsertOutcome::Updated);
    }

    conn.execute(
        "INSERT INTO catalog_files (content_id, media_type, season_number, episode_number,
             quality_index, quality_label, chat_id, msg_id, file_hash, size_bytes, file_name,
             created_at, updated_at)
         VALUES (:content_id, :media_type, :season, :episode, :quality_index, :quality_label,
             :chat_id, :msg_id, :file_hash, :size_bytes, :file_name, :now, :now)",
        rusqlite::named_params! {
            ":content_id": file.content_id,
            ":media_type": file.media_type.as_str(),
            ":season": file.season_number,
            ":episode": file.episode_number,
            ":quality_index": file.quality_index,
            ":quality_label": file.quality_label,
            ":chat_id": file.chat_id.get(),
            ":msg_id": file.msg_id.get(),
            ":file_hash": file.file_hash,
            ":size_bytes": size_to_sql(file.size_bytes),
            ":file_name": file.file_name,
            ":now": now,
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(UpsertOutcome::Inserted)
}

/// Resolve a catalog slot to its file.
///
/// # Arguments
///
/// * `season` / `episode` - must both be present for shows; ignored for movies
///
/// # Returns
///
/// * `Ok(Some(file))` - the slot exists
/// * `Ok(None)` - no such content, episode, or quality index
pub fn resolve_catalog_file(
    conn: &Connection,
    content_id: &str,
    media_type: MediaType,
    season: Option<u32>,
    episode: Option<u32>,
    quality_index: u32,
) -> Result<Option<CatalogFile>> {
    let result = match media_type {
        MediaType::Movie => {
            let sql = format!(
                "SELECT {FILE_COLUMNS} FROM catalog_files
                 WHERE content_id = :content_id AND media_type = 'movie'
                   AND quality_index = :quality_index
                 ORDER BY id LIMIT 1"
            );
            conn.query_row(
                &sql,
                rusqlite::named_params! {
                    ":content_id": content_id,
                    ":quality_index": quality_index,
                },
                row_to_file,
            )
        }
        MediaType::Show => {
            let (Some(season), Some(episode)) = (season, episode) else {
                return Ok(None);
            };
            let sql = format!(
                "SELECT {FILE_COLUMNS} FROM catalog_files
                 WHERE content_id = :content_id AND media_type = 'show'
                   AND season_number = :season AND episode_number = :episode
                   AND quality_index = :quality_index
                 ORDER BY id LIMIT 1"
            );
            conn.query_row(
                &sql,
                rusqlite::named_params! {
                    ":content_id": content_id,
                    ":season": season,
                    ":episode": episode,
                    ":quality_index": quality_index,
                },
                row_to_file,
            )
        }
        MediaType::Bundle => return Ok(None),
    };

    result
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// Count catalog files, used by the import summary.
pub fn count_catalog_files(conn: &Connection) -> Result<u64> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM catalog_files", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(count.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{get_conn, init_memory_pool};

    fn movie(quality_index: u32, msg: i64) -> NewCatalogFile {
        NewCatalogFile {
            content_id: "m1".to_string(),
            media_type: MediaType::Movie,
            season_number: None,
            episode_number: None,
            quality_index,
            quality_label: Some(format!("q{quality_index}")),
            chat_id: ChatId::new(-100),
            msg_id: MessageId::new(msg),
            file_hash: Some("abc123".to_string()),
            size_bytes: Some(2_000),
            file_name: Some("movie.mkv".to_string()),
        }
    }

    fn episode(season: u32, ep: u32, msg: i64) -> NewCatalogFile {
        NewCatalogFile {
            content_id: "s1".to_string(),
            media_type: MediaType::Show,
            season_number: Some(season),
            episode_number: Some(ep),
            quality_index: 0,
            quality_label: None,
            chat_id: ChatId::new(-100),
            msg_id: MessageId::new(msg),
            file_hash: None,
            size_bytes: None,
            file_name: None,
        }
    }

    #[test]
    fn test_movie_resolution_by_quality() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        upsert_catalog_file(&conn, &movie(0, 10)).unwrap();
        upsert_catalog_file(&conn, &movie(1, 11)).unwrap();

        let file = resolve_catalog_file(&conn, "m1", MediaType::Movie, None, None, 1)
            .unwrap()
            .unwrap();
        assert_eq!(file.msg_id, MessageId::new(11));
        assert_eq!(file.quality_label.as_deref(), Some("q1"));

        let missing = resolve_catalog_file(&conn, "m1", MediaType::Movie, None, None, 5).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_show_requires_season_and_episode() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        upsert_catalog_file(&conn, &episode(1, 2, 20)).unwrap();

        let found = resolve_catalog_file(&conn, "s1", MediaType::Show, Some(1), Some(2), 0)
            .unwrap()
            .unwrap();
        assert_eq!(found.msg_id, MessageId::new(20));

        assert!(resolve_catalog_file(&conn, "s1", MediaType::Show, Some(1), None, 0)
            .unwrap()
            .is_none());
        assert!(resolve_catalog_file(&conn, "s1", MediaType::Show, Some(1), Some(3), 0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_upsert_replaces_slot() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        assert_eq!(
            upsert_catalog_file(&conn, &episode(1, 1, 30)).unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            upsert_catalog_file(&conn, &episode(1, 1, 31)).unwrap(),
            UpsertOutcome::Updated
        );
        assert_eq!(count_catalog_files(&conn).unwrap(), 1);

        // Movies have NULL season/episode and still match their own slot
        upsert_catalog_file(&conn, &movie(0, 1)).unwrap();
        assert_eq!(
            upsert_catalog_file(&conn, &movie(0, 2)).unwrap(),
            UpsertOutcome::Updated
        );
        assert_eq!(count_catalog_files(&conn).unwrap(), 2);
    }

    #[test]
    fn test_bundle_rejected() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let mut file = movie(0, 1);
        file.media_type = MediaType::Bundle;
        let err = upsert_catalog_file(&conn, &file).unwrap_err();
        assert_eq!(err.http_status(), 400);
    }
}
