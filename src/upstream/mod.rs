//! Upstream chunked file sources.
//!
//! A source answers two questions about a file stored as a chat message: its
//! properties, and the bytes of one chunk. Each upstream connection identity
//! gets its own source handle, built by a [`SourceFactory`] and cached by the
//! connection pool.
//!
//! - [`http`]: reqwest client for a chunk-source bridge
//! - [`memory`]: in-process files for tests and local development

pub mod http;
pub mod memory;

pub use http::{HttpChunkSource, HttpSourceFactory};
pub use memory::{ChunkFault, MemorySource, MemorySourceFactory};

use bytes::Bytes;
use reelstream_common::{ConnectionId, Error, FileLocation, FileProperties, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// One connection's view of the chunked file store.
#[async_trait::async_trait]
pub trait ChunkSource: Send + Sync {
    /// Fetch the properties of the file at `location`.
    async fn file_properties(&self, location: FileLocation) -> Result<FileProperties>;

    /// Fetch up to `size` bytes starting at `offset`.
    ///
    /// Returns fewer bytes only at the end of the file.
    async fn fetch_chunk(&self, location: FileLocation, offset: u64, size: u64) -> Result<Bytes>;
}

/// Builds source handles for registered connection identities.
pub trait SourceFactory: Send + Sync {
    /// All registered identities, in registration order.
    fn identities(&self) -> Vec<ConnectionId>;

    /// Build a fresh handle for `id`.
    fn build(&self, id: ConnectionId) -> Result<Arc<dyn ChunkSource>>;

    /// Human-readable name of `id`, for logs.
    fn name(&self, id: ConnectionId) -> String {
        id.to_string()
    }
}

/// Bound an upstream call, mapping expiry to `UpstreamTimeout`.
pub async fn with_timeout<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(format!(
            "{} did not complete within {:?}",
            what, limit
        ))),
    }
}
