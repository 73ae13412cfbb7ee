//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which wires an in-memory catalog database and an
//! in-memory upstream into a full [`AppContext`]. [`TestHarness::with_server`]
//! starts Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use reelstream::catalog::{Catalog, SqliteCatalog};
use reelstream::config::Config;
use reelstream::server::auth::{StreamClaims, TokenAuthority};
use reelstream::server::{create_router, AppContext};
use reelstream::streaming::ConnectionPool;
use reelstream::upstream::{MemorySource, MemorySourceFactory};
use reelstream_common::{ChatId, ContentReference, FileLocation, MediaType, MessageId};
use reelstream_db::models::{NewBundle, NewCatalogFile};
use reelstream_db::pool::{get_conn, init_memory_pool, DbPool, PooledConnection};
use reelstream_db::queries::{bundles, catalog_files};

pub const SECRET: &str = "integration-test-secret";
pub const CHAT: i64 = -1001234;

/// Deterministic file content: byte `i` is `i % 251`.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub struct TestHarness {
    pub ctx: AppContext,
    pub db: DbPool,
    pub source: Arc<MemorySource>,
    pub factory: Arc<MemorySourceFactory>,
}

impl TestHarness {
    /// Two upstream connections, default stream settings.
    pub fn new() -> Self {
        Self::with_connections(2)
    }

    pub fn with_connections(connections: u32) -> Self {
        Self::build(connections, test_config())
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(2, config)
    }

    fn build(connections: u32, config: Config) -> Self {
        let db = init_memory_pool().expect("failed to create in-memory pool");
        let source = Arc::new(MemorySource::new());
        let factory = Arc::new(MemorySourceFactory::new(Arc::clone(&source), connections));
        let pool = Arc::new(ConnectionPool::new(
            factory.clone(),
            config.stream.handle_ttl(),
        ));
        let catalog: Arc<dyn Catalog> = Arc::new(SqliteCatalog::new(db.clone()));
        let ctx = AppContext::new(config, pool, catalog);

        Self {
            ctx,
            db,
            source,
            factory,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone())
    }

    /// Start an Axum server on a random port.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::serve(Self::new()).await
    }

    pub async fn serve(harness: Self) -> (Self, SocketAddr) {
        let app = harness.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    pub fn conn(&self) -> PooledConnection {
        get_conn(&self.db).expect("failed to get db connection")
    }

    /// Store a movie file upstream and register it at quality 0.
    pub fn add_movie(&self, content_id: &str, msg_id: i64, unique_id: &str, data: Vec<u8>) {
        self.source.insert(
            FileLocation::new(CHAT, msg_id),
            unique_id,
            Some("video/mp4"),
            Some("movie.mp4"),
            data,
        );
        catalog_files::upsert_catalog_file(
            &self.conn(),
            &NewCatalogFile {
                content_id: content_id.to_string(),
                media_type: MediaType::Movie,
                season_number: None,
                episode_number: None,
                quality_index: 0,
                quality_label: Some("1080p".to_string()),
                chat_id: ChatId::new(CHAT),
                msg_id: MessageId::new(msg_id),
                file_hash: Some(unique_id.chars().take(6).collect()),
                size_bytes: None,
                file_name: Some("movie.mp4".to_string()),
            },
        )
        .expect("failed to insert catalog file");
    }

    /// Store a show episode upstream.
    pub fn add_episode(
        &self,
        content_id: &str,
        season: u32,
        episode: u32,
        msg_id: i64,
        data: Vec<u8>,
    ) {
        let unique_id = format!("ep{}x{}unique", season, episode);
        self.source.insert(
            FileLocation::new(CHAT, msg_id),
            unique_id.as_str(),
            Some("video/x-matroska"),
            None,
            data,
        );
        catalog_files::upsert_catalog_file(
            &self.conn(),
            &NewCatalogFile {
                content_id: content_id.to_string(),
                media_type: MediaType::Show,
                season_number: Some(season),
                episode_number: Some(episode),
                quality_index: 0,
                quality_label: None,
                chat_id: ChatId::new(CHAT),
                msg_id: MessageId::new(msg_id),
                file_hash: None,
                size_bytes: None,
                file_name: None,
            },
        )
        .expect("failed to insert catalog file");
    }

    /// Store a bundle upstream with `upstream_unique_id` and record it with
    /// `stored_hash`.
    pub fn add_bundle(
        &self,
        file_id: &str,
        stored_hash: Option<&str>,
        upstream_unique_id: &str,
        msg_id: i64,
        data: Vec<u8>,
    ) {
        self.source.insert(
            FileLocation::new(CHAT, msg_id),
            upstream_unique_id,
            Some("video/x-matroska"),
            Some("Show.S01.mkv"),
            data,
        );
        bundles::upsert_bundle(
            &self.conn(),
            &NewBundle {
                file_id: file_id.to_string(),
                file_unique_id: None,
                file_hash: stored_hash.map(String::from),
                title: format!("Bundle {}", file_id),
                show_id: Some(42),
                season: Some(1),
                episode_range: Some("E01-E08".to_string()),
                chat_id: ChatId::new(CHAT),
                msg_id: MessageId::new(msg_id),
                size_bytes: None,
                file_name: Some("Show.S01.mkv".to_string()),
            },
        )
        .expect("failed to insert bundle");
    }

    pub fn authority(&self) -> TokenAuthority {
        TokenAuthority::new(SECRET)
    }

    pub fn token(&self, claims: &StreamClaims) -> String {
        self.authority().issue(claims).expect("failed to issue token")
    }

    pub fn movie_token(&self, content_id: &str) -> String {
        self.token(&StreamClaims::for_reference(
            &ContentReference {
                content_id: content_id.to_string(),
                file_reference_id: None,
                media_type: MediaType::Movie,
                quality_index: 0,
                season_number: None,
                episode_number: None,
            },
            300,
        ))
    }

    pub fn bundle_token(&self, key: &str) -> String {
        self.token(&StreamClaims::for_reference(
            &ContentReference::bundle(key),
            300,
        ))
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.stream.token_secret = SECRET.to_string();
    config.stream.upstream_timeout_secs = 2;
    config
}

/// Timeout used by tests that wait for background effects.
pub const SETTLE: Duration = Duration::from_millis(50);
