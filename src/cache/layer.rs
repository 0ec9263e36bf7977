//! Cache layer that orchestrates freshness checks and coalesced fetching.

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::CacheKey;
use crate::error::ApiError;

type FetchFuture = Shared<BoxFuture<'static, Result<Value, ApiError>>>;

/// A value that completed fetching, with the instant it arrived.
struct CachedValue {
  value: Value,
  fetched_at: Instant,
}

/// Per-key cache slot: Empty -> Fetching -> Fresh -> Stale -> Fetching -> ...
/// A failed fetch returns the slot to Empty so the next read retries cleanly.
#[derive(Default)]
struct CacheEntry {
  value: Option<CachedValue>,
  inflight: Option<FetchFuture>,
  /// Bumped on invalidation. A fetch that started before the invalidation
  /// carries the old generation; its completion returns its value to the
  /// waiters that joined it but is not stored.
  generation: u64,
}

struct CacheInner {
  entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

/// In-memory, keyed store of fetched results with TTL-bounded freshness.
///
/// The central invariant: for any one key there is never more than one fetch
/// in flight. Concurrent readers of a stale or missing key all await the same
/// shared fetch and receive the same value or the same error.
///
/// Cloning is cheap; all clones share one entry table.
#[derive(Clone)]
pub struct ResourceCache {
  inner: Arc<CacheInner>,
}

impl Default for ResourceCache {
  fn default() -> Self {
    Self::new()
  }
}

impl ResourceCache {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(CacheInner {
        entries: Mutex::new(HashMap::new()),
      }),
    }
  }

  /// Read a value through the cache.
  ///
  /// If the entry for `key` is younger than `ttl`, the cached value is
  /// returned without invoking `fetcher`. If a fetch for `key` is already in
  /// flight, this call awaits its result. Otherwise `fetcher()` is invoked
  /// (synchronously, to build the future; the work runs when awaited), the
  /// result is stored with a fresh timestamp, and returned.
  ///
  /// Failures are never cached: every waiter receives the error, the
  /// in-flight marker is cleared, and the next read fetches again.
  pub async fn read<F, Fut>(
    &self,
    key: &CacheKey,
    ttl: Duration,
    fetcher: F,
  ) -> Result<Value, ApiError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
  {
    let fetch = {
      let mut entries = lock(&self.inner.entries);
      let entry = entries.entry(key.clone()).or_default();

      if let Some(cached) = &entry.value {
        if cached.fetched_at.elapsed() < ttl {
          debug!(%key, "cache hit");
          return Ok(cached.value.clone());
        }
      }

      if let Some(inflight) = &entry.inflight {
        debug!(%key, "joining in-flight fetch");
        inflight.clone()
      } else {
        debug!(%key, "cache miss, fetching");
        let fetch = Self::start_fetch(&self.inner, key.clone(), entry.generation, fetcher());
        entry.inflight = Some(fetch.clone());
        fetch
      }
    };

    fetch.await
  }

  /// Wrap the fetch so its completion does the bookkeeping exactly once,
  /// before any waiter observes the result.
  fn start_fetch(
    inner: &Arc<CacheInner>,
    key: CacheKey,
    generation: u64,
    future: impl Future<Output = Result<Value, ApiError>> + Send + 'static,
  ) -> FetchFuture {
    let inner = Arc::clone(inner);

    async move {
      let result = future.await;

      let mut entries = lock(&inner.entries);
      if let Some(entry) = entries.get_mut(&key) {
        if entry.generation == generation {
          entry.inflight = None;
          entry.value = match &result {
            Ok(value) => Some(CachedValue {
              value: value.clone(),
              fetched_at: Instant::now(),
            }),
            // Back to Empty, never a cached failure.
            Err(_) => None,
          };
        }
      }

      result
    }
    .boxed()
    .shared()
  }

  /// Drop the cached value for `key` so the next read fetches, regardless of
  /// TTL. A fetch currently in flight for `key` is detached: its waiters
  /// still get its result, but the result is not stored.
  pub fn invalidate(&self, key: &CacheKey) {
    let mut entries = lock(&self.inner.entries);
    if let Some(entry) = entries.get_mut(key) {
      debug!(%key, "invalidated");
      clear(entry);
    }
  }

  /// Invalidate every key for the given resource name.
  pub fn invalidate_resource(&self, resource: &str) {
    self.invalidate_where(|key| key.resource() == resource);
  }

  /// Invalidate every key matching the predicate. Non-matching keys and
  /// their in-flight fetches are untouched.
  pub fn invalidate_where(&self, predicate: impl Fn(&CacheKey) -> bool) {
    let mut entries = lock(&self.inner.entries);
    for (key, entry) in entries.iter_mut() {
      if predicate(key) {
        debug!(%key, "invalidated");
        clear(entry);
      }
    }
  }
}

fn clear(entry: &mut CacheEntry) {
  entry.value = None;
  entry.inflight = None;
  entry.generation += 1;
}

// A poisoned lock only means a task panicked between plain-data updates;
// the table itself is still coherent.
fn lock<'a>(
  mutex: &'a Mutex<HashMap<CacheKey, CacheEntry>>,
) -> MutexGuard<'a, HashMap<CacheKey, CacheEntry>> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for ResourceCache {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let entries = lock(&self.inner.entries);
    f.debug_struct("ResourceCache")
      .field("entries", &entries.len())
      .finish_non_exhaustive()
  }
}
