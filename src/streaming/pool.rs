//! Upstream connection pool.
//!
//! Tracks in-flight requests per connection identity, picks the least-loaded
//! identity for each request, and caches one source handle per identity.
//! Idle handles are evicted by a periodic sweep; evicting a handle only drops
//! the cache's reference, so requests already holding it are unaffected.

use dashmap::DashMap;
use parking_lot::Mutex;
use reelstream_common::{ConnectionId, Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::upstream::{ChunkSource, SourceFactory};

/// Default idle time after which a cached handle is evicted.
pub const DEFAULT_HANDLE_TTL: Duration = Duration::from_secs(3600);

/// Default sweep period.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(900);

struct CacheEntry {
    handle: Arc<dyn ChunkSource>,
    last_used: Instant,
}

pub struct ConnectionPool {
    factory: Arc<dyn SourceFactory>,
    /// In-flight requests per identity. Ordered so ties go to the lowest id.
    loads: Mutex<BTreeMap<ConnectionId, usize>>,
    handles: DashMap<ConnectionId, CacheEntry>,
    ttl: Duration,
}

impl ConnectionPool {
    /// Create a pool with every identity the factory reports, all at load 0.
    pub fn new(factory: Arc<dyn SourceFactory>, ttl: Duration) -> Self {
        let loads = factory.identities().into_iter().map(|id| (id, 0)).collect();
        Self {
            factory,
            loads: Mutex::new(loads),
            handles: DashMap::new(),
            ttl,
        }
    }

    /// Pick the identity with the fewest in-flight requests and count this
    /// request against it until the returned lease is dropped.
    pub fn select(self: &Arc<Self>) -> Result<ConnectionLease> {
        let mut loads = self.loads.lock();
        let (&id, load) = loads
            .iter_mut()
            .min_by_key(|(_, load)| **load)
            .ok_or(Error::NoCapacity)?;
        *load += 1;
        let in_flight = *load;
        drop(loads);

        tracing::trace!(connection = %id, in_flight, "Selected upstream connection");
        Ok(ConnectionLease {
            pool: Arc::clone(self),
            id,
        })
    }

    /// Return the cached handle for `id`, building it on a miss.
    ///
    /// Every hit refreshes the entry's last-used time.
    pub fn acquire_handle(&self, id: ConnectionId) -> Result<Arc<dyn ChunkSource>> {
        if !self.loads.lock().contains_key(&id) {
            return Err(Error::configuration(format!(
                "connection {} is not registered with the pool",
                id
            )));
        }

        if let Some(mut entry) = self.handles.get_mut(&id) {
            entry.last_used = Instant::now();
            return Ok(Arc::clone(&entry.handle));
        }

        let entry = self.handles.entry(id).or_try_insert_with(|| {
            tracing::debug!(connection = %self.factory.name(id), "Creating upstream handle");
            self.factory.build(id).map(|handle| CacheEntry {
                handle,
                last_used: Instant::now(),
            })
        })?;
        Ok(Arc::clone(&entry.handle))
    }

    /// Evict handles idle longer than the TTL. Loads are left untouched.
    ///
    /// Returns the number of evicted handles.
    pub fn sweep(&self) -> usize {
        let before = self.handles.len();
        let ttl = self.ttl;
        self.handles
            .retain(|_, entry| entry.last_used.elapsed() <= ttl);
        let evicted = before.saturating_sub(self.handles.len());
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted idle upstream handles");
        }
        evicted
    }

    /// Current in-flight count for `id`.
    pub fn load(&self, id: ConnectionId) -> Option<usize> {
        self.loads.lock().get(&id).copied()
    }

    /// Snapshot of every identity's load.
    pub fn loads(&self) -> Vec<(ConnectionId, usize)> {
        self.loads.lock().iter().map(|(id, load)| (*id, *load)).collect()
    }

    pub fn is_cached(&self, id: ConnectionId) -> bool {
        self.handles.contains_key(&id)
    }

    pub fn cached_handles(&self) -> usize {
        self.handles.len()
    }

    pub fn connection_count(&self) -> usize {
        self.loads.lock().len()
    }

    /// Log name of `id`.
    pub fn connection_name(&self, id: ConnectionId) -> String {
        self.factory.name(id)
    }

    fn release(&self, id: ConnectionId) {
        if let Some(load) = self.loads.lock().get_mut(&id) {
            *load = load.saturating_sub(1);
        }
    }
}

/// A request's claim on one connection identity.
///
/// Dropping the lease (request finished, failed, or the client went away)
/// decrements the identity's load.
pub struct ConnectionLease {
    pool: Arc<ConnectionPool>,
    id: ConnectionId,
}

impl ConnectionLease {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Handle for this lease's identity.
    pub fn handle(&self) -> Result<Arc<dyn ChunkSource>> {
        self.pool.acquire_handle(self.id)
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.pool.release(self.id);
    }
}

impl std::fmt::Debug for ConnectionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLease").field("id", &self.id).finish()
    }
}

/// Start the background task that sweeps idle handles every `interval`.
///
/// The task ends quietly when `cancel` fires.
pub fn start_sweep_task(
    pool: Arc<ConnectionPool>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Handle sweep stopped");
                    break;
                }
                _ = ticker.tick() => {
                    pool.sweep();
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{MemorySource, MemorySourceFactory};
    use assert_matches::assert_matches;

    fn pool_with(connections: u32, ttl: Duration) -> (Arc<ConnectionPool>, Arc<MemorySourceFactory>) {
        let factory = Arc::new(MemorySourceFactory::new(Arc::new(MemorySource::new()), connections));
        let pool = Arc::new(ConnectionPool::new(factory.clone(), ttl));
        (pool, factory)
    }

    #[test]
    fn test_select_least_loaded() {
        let (pool, _) = pool_with(3, DEFAULT_HANDLE_TTL);

        let a = pool.select().unwrap();
        let b = pool.select().unwrap();
        let c = pool.select().unwrap();
        // Each identity got one request; ties resolved lowest-first
        assert_eq!(
            vec![a.id(), b.id(), c.id()],
            vec![ConnectionId::new(0), ConnectionId::new(1), ConnectionId::new(2)]
        );

        drop(b);
        let d = pool.select().unwrap();
        assert_eq!(d.id(), ConnectionId::new(1));
    }

    #[test]
    fn test_select_is_strictly_minimal() {
        let (pool, _) = pool_with(4, DEFAULT_HANDLE_TTL);
        let mut leases = Vec::new();
        for _ in 0..11 {
            let before = pool.loads();
            let min = before.iter().map(|(_, l)| *l).min().unwrap();
            let lease = pool.select().unwrap();
            let chosen = before.iter().find(|(id, _)| *id == lease.id()).unwrap().1;
            assert_eq!(chosen, min);
            leases.push(lease);
        }
    }

    #[test]
    fn test_lease_drop_releases_load() {
        let (pool, _) = pool_with(1, DEFAULT_HANDLE_TTL);
        let id = ConnectionId::new(0);
        {
            let _a = pool.select().unwrap();
            let _b = pool.select().unwrap();
            assert_eq!(pool.load(id), Some(2));
        }
        assert_eq!(pool.load(id), Some(0));
    }

    #[test]
    fn test_no_capacity() {
        let (pool, _) = pool_with(0, DEFAULT_HANDLE_TTL);
        assert_matches!(pool.select(), Err(Error::NoCapacity));
    }

    #[test]
    fn test_handle_is_cached() {
        let (pool, factory) = pool_with(2, DEFAULT_HANDLE_TTL);
        let id = ConnectionId::new(1);

        pool.acquire_handle(id).unwrap();
        pool.acquire_handle(id).unwrap();
        assert_eq!(factory.builds(), 1);
        assert!(pool.is_cached(id));
        assert!(!pool.is_cached(ConnectionId::new(0)));
    }

    #[test]
    fn test_unregistered_identity_is_configuration_error() {
        let (pool, _) = pool_with(1, DEFAULT_HANDLE_TTL);
        assert_matches!(
            pool.acquire_handle(ConnectionId::new(7)).map(|_| ()),
            Err(Error::Configuration(_))
        );
    }

    #[test]
    fn test_sweep_evicts_idle_handles_only() {
        let (pool, factory) = pool_with(2, Duration::from_millis(30));
        let stale = ConnectionId::new(0);
        let fresh = ConnectionId::new(1);

        let held = pool.acquire_handle(stale).unwrap();
        let lease = pool.select().unwrap();
        std::thread::sleep(Duration::from_millis(60));
        pool.acquire_handle(fresh).unwrap();

        assert_eq!(pool.sweep(), 1);
        assert!(!pool.is_cached(stale));
        assert!(pool.is_cached(fresh));

        // Load counters survive the sweep
        assert_eq!(pool.load(lease.id()), Some(1));

        // A handle taken before eviction stays usable; the next miss rebuilds
        drop(held);
        pool.acquire_handle(stale).unwrap();
        assert_eq!(factory.builds(), 3);
    }

    #[test]
    fn test_hit_refreshes_last_used() {
        let (pool, _) = pool_with(1, Duration::from_millis(80));
        let id = ConnectionId::new(0);

        pool.acquire_handle(id).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        pool.acquire_handle(id).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(pool.sweep(), 0);
        assert!(pool.is_cached(id));
    }

    #[tokio::test]
    async fn test_sweep_task_stops_on_cancel() {
        let (pool, _) = pool_with(1, DEFAULT_HANDLE_TTL);
        let cancel = CancellationToken::new();
        let task = start_sweep_task(pool, Duration::from_millis(5), cancel.clone());

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        assert!(task.await.is_ok());
    }
}
