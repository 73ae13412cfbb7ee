//! Content identity backfill for bundles stored without a hash.
//!
//! Bundles imported before hashes were recorded stream unverified. Running
//! the backfill fills in the short identity from upstream file properties so
//! `require_identity_hash` can be switched on.

use reelstream_common::Result;
use reelstream_db::pool::{get_conn, DbPool};
use reelstream_db::queries::bundles;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::streaming::{short_identity, ConnectionPool};
use crate::upstream::with_timeout;

/// Outcome of one backfill run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub scanned: usize,
    pub updated: usize,
    /// Bundles whose properties could not be fetched; left untouched.
    pub failed: usize,
}

/// Fill in missing content hashes.
///
/// A bundle that already carries its full unique id is hashed locally;
/// otherwise its properties are fetched through `connections`. Per-bundle
/// upstream failures are logged and counted, not returned.
pub async fn backfill_hashes(
    db: &DbPool,
    connections: &Arc<ConnectionPool>,
    timeout: Duration,
) -> Result<BackfillReport> {
    let pending = {
        let conn = get_conn(db)?;
        bundles::list_bundles_missing_hash(&conn)?
    };

    let mut report = BackfillReport {
        scanned: pending.len(),
        ..Default::default()
    };

    for bundle in pending {
        let unique_id = match bundle.file_unique_id.as_deref().filter(|u| !u.is_empty()) {
            Some(known) => known.to_string(),
            None => {
                let fetched = async {
                    let lease = connections.select()?;
                    let source = lease.handle()?;
                    with_timeout(timeout, "file properties", source.file_properties(bundle.location()))
                        .await
                }
                .await;
                match fetched {
                    Ok(props) => props.unique_id,
                    Err(e) => {
                        tracing::warn!(
                            file_id = %bundle.file_id,
                            location = %bundle.location(),
                            error = %e,
                            "Could not fetch bundle properties"
                        );
                        report.failed += 1;
                        continue;
                    }
                }
            }
        };

        let hash = short_identity(&unique_id);
        let conn = get_conn(db)?;
        if bundles::set_bundle_hash(&conn, &bundle.file_id, &unique_id, hash)? {
            tracing::info!(file_id = %bundle.file_id, hash, "Backfilled bundle hash");
            report.updated += 1;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{MemorySource, MemorySourceFactory};
    use reelstream_common::{ChatId, FileLocation, MessageId};
    use reelstream_db::models::NewBundle;
    use reelstream_db::pool::init_memory_pool;

    fn bundle(file_id: &str, msg: i64, unique_id: Option<&str>) -> NewBundle {
        NewBundle {
            file_id: file_id.to_string(),
            file_unique_id: unique_id.map(String::from),
            file_hash: None,
            title: format!("Pack {}", file_id),
            show_id: Some(7),
            season: Some(1),
            episode_range: None,
            chat_id: ChatId::new(-100),
            msg_id: MessageId::new(msg),
            size_bytes: None,
            file_name: None,
        }
    }

    fn pool_over(source: Arc<MemorySource>, connections: u32) -> Arc<ConnectionPool> {
        let factory = Arc::new(MemorySourceFactory::new(source, connections));
        Arc::new(ConnectionPool::new(factory, Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn test_backfill_fetches_missing_hashes() {
        let db = init_memory_pool().unwrap();
        {
            let conn = get_conn(&db).unwrap();
            bundles::upsert_bundle(&conn, &bundle("A", 1, None)).unwrap();
            bundles::upsert_bundle(&conn, &bundle("B", 2, Some("known9xyz"))).unwrap();
        }

        let source = Arc::new(MemorySource::new());
        source.insert(
            FileLocation::new(-100i64, 1i64),
            "fetched1abc",
            None,
            None,
            vec![0u8; 4],
        );
        let connections = pool_over(Arc::clone(&source), 1);

        let report = backfill_hashes(&db, &connections, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(
            report,
            BackfillReport {
                scanned: 2,
                updated: 2,
                failed: 0
            }
        );
        // Only the bundle without a unique id needed upstream
        assert_eq!(source.property_fetches(), 1);

        let conn = get_conn(&db).unwrap();
        let a = bundles::get_bundle_by_file_id(&conn, "A").unwrap().unwrap();
        assert_eq!(a.file_hash.as_deref(), Some("fetche"));
        let b = bundles::get_bundle_by_file_id(&conn, "B").unwrap().unwrap();
        assert_eq!(b.file_hash.as_deref(), Some("known9"));
        assert!(bundles::list_bundles_missing_hash(&conn).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backfill_counts_upstream_failures() {
        let db = init_memory_pool().unwrap();
        {
            let conn = get_conn(&db).unwrap();
            bundles::upsert_bundle(&conn, &bundle("GONE", 9, None)).unwrap();
        }
        let connections = pool_over(Arc::new(MemorySource::new()), 1);

        let report = backfill_hashes(&db, &connections, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.updated, 0);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_backfill_without_connections_fails_per_bundle() {
        let db = init_memory_pool().unwrap();
        {
            let conn = get_conn(&db).unwrap();
            bundles::upsert_bundle(&conn, &bundle("X", 3, None)).unwrap();
        }
        let connections = pool_over(Arc::new(MemorySource::new()), 0);

        let report = backfill_hashes(&db, &connections, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(report.failed, 1);
    }
}
