//! In-process chunk source.
//!
//! Serves files held in memory. Used by the integration tests and for running
//! the gateway without a bridge. Counts fetches so tests can check that a
//! cancelled stream stops pulling chunks.

use bytes::Bytes;
use parking_lot::RwLock;
use reelstream_common::{ConnectionId, Error, FileLocation, FileProperties, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{ChunkSource, SourceFactory};

#[derive(Debug, Clone)]
struct MemoryFile {
    properties: FileProperties,
    data: Bytes,
}

/// How chunk fetches misbehave once a [`MemorySource`] turns faulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkFault {
    /// Return an upstream error.
    Fail,
    /// Return half of the requested bytes.
    Short,
    /// Never answer.
    Stall,
}

/// A shared in-memory file store.
#[derive(Default)]
pub struct MemorySource {
    files: RwLock<HashMap<FileLocation, MemoryFile>>,
    chunk_fetches: AtomicUsize,
    property_fetches: AtomicUsize,
    delay: RwLock<Option<Duration>>,
    fault: RwLock<Option<(usize, ChunkFault)>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a file; `file_size` is taken from `data`.
    pub fn insert(
        &self,
        location: FileLocation,
        unique_id: impl Into<String>,
        mime_type: Option<&str>,
        file_name: Option<&str>,
        data: impl Into<Bytes>,
    ) {
        let data = data.into();
        let properties = FileProperties {
            unique_id: unique_id.into(),
            file_size: data.len() as u64,
            mime_type: mime_type.map(String::from),
            file_name: file_name.map(String::from),
        };
        self.files
            .write()
            .insert(location, MemoryFile { properties, data });
    }

    /// Delay every call by `delay`, to exercise timeouts and cancellation.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    /// Serve the first `healthy` chunk fetches normally, then apply `fault`.
    ///
    /// Counts from the source's total fetches so far.
    pub fn set_chunk_fault(&self, healthy: usize, fault: ChunkFault) {
        *self.fault.write() = Some((healthy, fault));
    }

    pub fn clear_chunk_fault(&self) {
        *self.fault.write() = None;
    }

    pub fn chunk_fetches(&self) -> usize {
        self.chunk_fetches.load(Ordering::SeqCst)
    }

    pub fn property_fetches(&self) -> usize {
        self.property_fetches.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn file(&self, location: FileLocation) -> Result<MemoryFile> {
        self.files
            .read()
            .get(&location)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("file {}", location)))
    }
}

#[async_trait::async_trait]
impl ChunkSource for MemorySource {
    async fn file_properties(&self, location: FileLocation) -> Result<FileProperties> {
        self.property_fetches.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(self.file(location)?.properties)
    }

    async fn fetch_chunk(&self, location: FileLocation, offset: u64, size: u64) -> Result<Bytes> {
        let previous = self.chunk_fetches.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let fault = match *self.fault.read() {
            Some((healthy, fault)) if previous >= healthy => Some(fault),
            _ => None,
        };
        let size = match fault {
            Some(ChunkFault::Fail) => {
                return Err(Error::upstream(format!(
                    "injected failure at {} of {}",
                    offset, location
                )))
            }
            Some(ChunkFault::Stall) => std::future::pending().await,
            Some(ChunkFault::Short) => size / 2,
            None => size,
        };

        let file = self.file(location)?;
        let len = file.data.len() as u64;
        if offset >= len {
            return Ok(Bytes::new());
        }
        let end = offset.saturating_add(size).min(len);
        Ok(file.data.slice(offset as usize..end as usize))
    }
}

/// Hands out the same [`MemorySource`] for every identity.
pub struct MemorySourceFactory {
    source: Arc<MemorySource>,
    connections: u32,
    builds: AtomicUsize,
}

impl MemorySourceFactory {
    /// A factory with `connections` identities sharing `source`.
    pub fn new(source: Arc<MemorySource>, connections: u32) -> Self {
        Self {
            source,
            connections,
            builds: AtomicUsize::new(0),
        }
    }

    /// How many handles have been built; cache misses in the pool.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl SourceFactory for MemorySourceFactory {
    fn identities(&self) -> Vec<ConnectionId> {
        (0..self.connections).map(ConnectionId::new).collect()
    }

    fn build(&self, id: ConnectionId) -> Result<Arc<dyn ChunkSource>> {
        if id.get() >= self.connections {
            return Err(Error::configuration(format!("no upstream connection {}", id)));
        }
        self.builds.fetch_add(1, Ordering::SeqCst);
        let source: Arc<dyn ChunkSource> = self.source.clone();
        Ok(source)
    }
}
