//! Catalog lookups used by the gateway.
//!
//! The gateway reads bundles and catalog files but never writes them. The
//! [`Catalog`] trait is the seam; [`SqliteCatalog`] runs the blocking SQLite
//! queries on the blocking thread pool.

use reelstream_common::{Error, MediaType, Result};
use reelstream_db::models::{BundleRecord, CatalogFile};
use reelstream_db::pool::{get_conn, DbPool};
use reelstream_db::queries::{bundles, catalog_files};

#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    /// Find a bundle by short hash, falling back to its long file id.
    async fn resolve_bundle(&self, hash_or_id: &str) -> Result<Option<BundleRecord>>;

    /// Find the file for a movie or show episode at a quality index.
    async fn resolve_catalog_file(
        &self,
        content_id: &str,
        media_type: MediaType,
        quality_index: u32,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Result<Option<CatalogFile>>;

    /// All bundles of a show, ordered by season.
    async fn bundles_for_show(&self, show_id: i64) -> Result<Vec<BundleRecord>>;
}

/// [`Catalog`] backed by the SQLite store.
#[derive(Clone)]
pub struct SqliteCatalog {
    pool: DbPool,
}

impl SqliteCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = get_conn(&pool)?;
            op(&conn)
        })
        .await
        .map_err(|e| Error::internal(format!("catalog query task failed: {}", e)))?
    }
}

#[async_trait::async_trait]
impl Catalog for SqliteCatalog {
    async fn resolve_bundle(&self, hash_or_id: &str) -> Result<Option<BundleRecord>> {
        let key = hash_or_id.to_string();
        self.blocking(move |conn| bundles::get_bundle_by_hash_or_id(conn, &key))
            .await
    }

    async fn resolve_catalog_file(
        &self,
        content_id: &str,
        media_type: MediaType,
        quality_index: u32,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Result<Option<CatalogFile>> {
        let content_id = content_id.to_string();
        self.blocking(move |conn| {
            catalog_files::resolve_catalog_file(
                conn,
                &content_id,
                media_type,
                season,
                episode,
                quality_index,
            )
        })
        .await
    }

    async fn bundles_for_show(&self, show_id: i64) -> Result<Vec<BundleRecord>> {
        self.blocking(move |conn| bundles::list_bundles_for_show(conn, show_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelstream_common::{ChatId, MessageId};
    use reelstream_db::models::{NewBundle, NewCatalogFile};
    use reelstream_db::pool::init_memory_pool;

    fn seeded() -> SqliteCatalog {
        let pool = init_memory_pool().unwrap();
        {
            let conn = get_conn(&pool).unwrap();
            bundles::upsert_bundle(
                &conn,
                &NewBundle {
                    file_id: "LONGID".to_string(),
                    file_unique_id: Some("abc123rest".to_string()),
                    file_hash: Some("abc123".to_string()),
                    title: "Pack".to_string(),
                    show_id: Some(9),
                    season: Some(1),
                    episode_range: None,
                    chat_id: ChatId::new(-1),
                    msg_id: MessageId::new(5),
                    size_bytes: None,
                    file_name: None,
                },
            )
            .unwrap();
            catalog_files::upsert_catalog_file(
                &conn,
                &NewCatalogFile {
                    content_id: "movie-1".to_string(),
                    media_type: MediaType::Movie,
                    season_number: None,
                    episode_number: None,
                    quality_index: 0,
                    quality_label: None,
                    chat_id: ChatId::new(-1),
                    msg_id: MessageId::new(6),
                    file_hash: None,
                    size_bytes: None,
                    file_name: None,
                },
            )
            .unwrap();
        }
        SqliteCatalog::new(pool)
    }

    #[tokio::test]
    async fn test_resolve_bundle_by_hash_and_id() {
        let catalog = seeded();
        assert!(catalog.resolve_bundle("abc123").await.unwrap().is_some());
        assert!(catalog.resolve_bundle("LONGID").await.unwrap().is_some());
        assert!(catalog.resolve_bundle("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_catalog_file() {
        let catalog = seeded();
        let file = catalog
            .resolve_catalog_file("movie-1", MediaType::Movie, 0, None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(file.msg_id, MessageId::new(6));
    }

    #[tokio::test]
    async fn test_bundles_for_show() {
        let catalog = seeded();
        assert_eq!(catalog.bundles_for_show(9).await.unwrap().len(), 1);
        assert!(catalog.bundles_for_show(10).await.unwrap().is_empty());
    }
}
