//! Reelstream-DB: catalog store for bundles and catalog files
//!
//! SQLite through rusqlite with r2d2 connection pooling. The gateway only
//! reads from this store; ingestion (`reelstream import`) and the hash
//! backfill are the writers.
//!
//! # Modules
//!
//! - `migrations` - Embedded schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching the database schema
//! - `queries` - Query operations
//!
//! # Example
//!
//! ```no_run
//! use reelstream_db::pool::{get_conn, init_pool};
//! use reelstream_db::queries::bundles;
//!
//! let pool = init_pool("/var/lib/reelstream/catalog.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! if let Some(bundle) = bundles::get_bundle_by_hash_or_id(&conn, "abc123").unwrap() {
//!     println!("{} lives at {}", bundle.title, bundle.location());
//! }
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
