use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

use super::key::{DataGroupKey, MatchMode};
use super::{CacheError, Invalidate};

type FetchFuture = BoxFuture<'static, Result<Value, CacheError>>;
type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

struct Entry {
    value: Value,
    fetched_at: Instant,
    invalidated: bool,
    /// Present for entries loaded through `get_or_fetch`; used to refetch on invalidation.
    fetcher: Option<Fetcher>,
}

/// Bounded in-memory cache of remote query results.
///
/// Payloads are stored as JSON values and decoded on read, so one cache can
/// hold categories, subcategories and product lists side by side. Entries
/// loaded through [`QueryCache::get_or_fetch`] remember how they were fetched,
/// which lets [`Invalidate::invalidate`] refetch them in place.
///
/// The lock is never held across an await point.
pub struct QueryCache {
    entries: Mutex<LruCache<DataGroupKey, Entry>>,
}

impl QueryCache {
    /// Default number of entries kept before the least recently used one is evicted.
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<DataGroupKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached value for `key`, fetching it when missing or invalidated.
    ///
    /// The fetcher is kept with the entry so later invalidations can refetch it.
    /// A failed fetch leaves any previous (invalidated) entry in place.
    pub async fn get_or_fetch<T, F, Fut, E>(&self, key: DataGroupKey, fetch: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display,
    {
        let cached = self
            .lock()
            .get(&key)
            .filter(|entry| !entry.invalidated)
            .map(|entry| entry.value.clone());
        if let Some(value) = cached {
            tracing::debug!(key = %key, "Query cache hit");
            return decode(&key, value);
        }

        let fetcher = into_fetcher(key.clone(), fetch);
        tracing::debug!(key = %key, "Query cache miss, fetching");
        let value = fetcher().await?;

        self.lock().put(
            key.clone(),
            Entry {
                value: value.clone(),
                fetched_at: Instant::now(),
                invalidated: false,
                fetcher: Some(fetcher),
            },
        );
        decode(&key, value)
    }

    /// Store a value directly. Entries stored this way are marked on
    /// invalidation but never refetched.
    pub fn set<T: Serialize>(&self, key: DataGroupKey, value: &T) -> Result<(), CacheError> {
        let value = serde_json::to_value(value).map_err(|source| CacheError::Encode {
            key: key.clone(),
            source,
        })?;
        self.lock().put(
            key,
            Entry {
                value,
                fetched_at: Instant::now(),
                invalidated: false,
                fetcher: None,
            },
        );
        Ok(())
    }

    /// Read a value without fetching. Invalidated entries are still returned.
    pub fn peek<T: DeserializeOwned>(&self, key: &DataGroupKey) -> Result<Option<T>, CacheError> {
        let value = self.lock().peek(key).map(|entry| entry.value.clone());
        value.map(|v| decode(key, v)).transpose()
    }

    /// Drop every entry matched by `key` under `mode`. Returns the number removed.
    pub fn remove(&self, key: &DataGroupKey, mode: MatchMode) -> usize {
        let mut entries = self.lock();
        let doomed: Vec<DataGroupKey> = entries
            .iter()
            .filter(|(k, _)| k.matches(key, mode))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &doomed {
            entries.pop(k);
        }
        doomed.len()
    }

    pub fn is_invalidated(&self, key: &DataGroupKey) -> Option<bool> {
        self.lock().peek(key).map(|entry| entry.invalidated)
    }

    /// When the entry for `key` was last (re)fetched.
    pub fn fetched_at(&self, key: &DataGroupKey) -> Option<Instant> {
        self.lock().peek(key).map(|entry| entry.fetched_at)
    }

    pub fn keys(&self) -> Vec<DataGroupKey> {
        let mut keys: Vec<_> = self.lock().iter().map(|(k, _)| k.clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Mark all matching entries invalidated, then refetch those that can be
    /// refetched, concurrently.
    async fn invalidate_matching(&self, group: &DataGroupKey, mode: MatchMode) -> Result<(), CacheError> {
        let targets: Vec<(DataGroupKey, Option<Fetcher>)> = {
            let mut entries = self.lock();
            entries
                .iter_mut()
                .filter(|(k, _)| k.matches(group, mode))
                .map(|(k, entry)| {
                    entry.invalidated = true;
                    (k.clone(), entry.fetcher.clone())
                })
                .collect()
        };

        tracing::debug!(group = %group, ?mode, matched = targets.len(), "Invalidating cached queries");

        let refetches = targets
            .into_iter()
            .filter_map(|(key, fetcher)| fetcher.map(|f| async move { (key, f().await) }));
        let results = join_all(refetches).await;

        let mut first_error = None;
        let mut entries = self.lock();
        for (key, result) in results {
            match result {
                Ok(value) => {
                    // Entry may have been evicted while the refetch was in flight
                    if let Some(entry) = entries.peek_mut(&key) {
                        entry.value = value;
                        entry.fetched_at = Instant::now();
                        entry.invalidated = false;
                    }
                }
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "Refetch after invalidation failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl Invalidate for QueryCache {
    fn invalidate<'a>(
        &'a self,
        key: &'a DataGroupKey,
        mode: MatchMode,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        self.invalidate_matching(key, mode).boxed()
    }
}

fn into_fetcher<T, F, Fut, E>(key: DataGroupKey, fetch: F) -> Fetcher
where
    T: Serialize + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Display,
{
    Arc::new(move || {
        let fut = fetch();
        let key = key.clone();
        async move {
            let value = fut.await.map_err(|e| CacheError::Fetch {
                key: key.clone(),
                message: e.to_string(),
            })?;
            serde_json::to_value(value).map_err(|source| CacheError::Encode { key, source })
        }
        .boxed()
    })
}

fn decode<T: DeserializeOwned>(key: &DataGroupKey, value: Value) -> Result<T, CacheError> {
    serde_json::from_value(value).map_err(|source| CacheError::Decode {
        key: key.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_fetch(
        counter: Arc<AtomicUsize>,
        values: Vec<&'static str>,
    ) -> impl Fn() -> futures::future::Ready<Result<Vec<String>, String>> + Send + Sync + 'static {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(values.iter().map(|s| s.to_string()).collect()))
        }
    }

    #[tokio::test]
    async fn test_get_or_fetch_caches_result() {
        let cache = QueryCache::new(8);
        let calls = Arc::new(AtomicUsize::new(0));
        let key = DataGroupKey::from("categories");

        let first: Vec<String> = cache
            .get_or_fetch(key.clone(), counting_fetch(calls.clone(), vec!["Shoes"]))
            .await
            .unwrap();
        let second: Vec<String> = cache
            .get_or_fetch(key.clone(), counting_fetch(calls.clone(), vec!["ignored"]))
            .await
            .unwrap();

        assert_eq!(first, vec!["Shoes".to_string()]);
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_prefix_invalidation_refetches_all_extensions() {
        let cache = QueryCache::new(8);
        let calls = Arc::new(AtomicUsize::new(0));
        let products = DataGroupKey::from("products");

        for id in ["1", "2"] {
            let _: Vec<String> = cache
                .get_or_fetch(
                    products.child("category").child(id),
                    counting_fetch(calls.clone(), vec!["p"]),
                )
                .await
                .unwrap();
        }
        let _: Vec<String> = cache
            .get_or_fetch(DataGroupKey::from("categories"), counting_fetch(calls.clone(), vec![]))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        cache.invalidate(&products, MatchMode::Prefix).await.unwrap();

        // Two product entries refetched, categories untouched
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(
            cache.is_invalidated(&products.child("category").child("1")),
            Some(false)
        );
    }

    #[tokio::test]
    async fn test_exact_invalidation_skips_extensions() {
        let cache = QueryCache::new(8);
        let group = DataGroupKey::from("products");
        cache.set(group.clone(), &vec!["all"]).unwrap();
        cache.set(group.child("category").child("1"), &vec!["one"]).unwrap();

        cache.invalidate(&group, MatchMode::Exact).await.unwrap();

        assert_eq!(cache.is_invalidated(&group), Some(true));
        assert_eq!(cache.is_invalidated(&group.child("category").child("1")), Some(false));
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_entry_invalidated() {
        let cache = QueryCache::new(8);
        let key = DataGroupKey::from("categories");
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let _: Vec<String> = cache
            .get_or_fetch(key.clone(), move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                futures::future::ready(if n == 0 {
                    Ok(vec!["Shoes".to_string()])
                } else {
                    Err("upstream unavailable".to_string())
                })
            })
            .await
            .unwrap();

        let err = cache.invalidate(&key, MatchMode::Prefix).await.unwrap_err();
        assert!(matches!(err, CacheError::Fetch { .. }));
        assert!(err.to_string().contains("upstream unavailable"));
        assert_eq!(cache.is_invalidated(&key), Some(true));

        // Stale payload is still readable without fetching
        let stale: Option<Vec<String>> = cache.peek(&key).unwrap();
        assert_eq!(stale, Some(vec!["Shoes".to_string()]));
    }

    #[tokio::test]
    async fn test_invalidating_unknown_key_is_ok() {
        let cache = QueryCache::default();
        cache
            .invalidate(&DataGroupKey::from("nothing"), MatchMode::Prefix)
            .await
            .unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let cache = QueryCache::new(2);
        cache.set(DataGroupKey::from("a"), &1).unwrap();
        cache.set(DataGroupKey::from("b"), &2).unwrap();
        cache.set(DataGroupKey::from("c"), &3).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.keys(), vec![DataGroupKey::from("b"), DataGroupKey::from("c")]);
    }

    #[test]
    fn test_remove_by_prefix() {
        let cache = QueryCache::new(8);
        let products = DataGroupKey::from("products");
        cache.set(products.child("category").child("1"), &1).unwrap();
        cache.set(products.child("category").child("2"), &2).unwrap();
        cache.set(DataGroupKey::from("categories"), &3).unwrap();

        assert_eq!(cache.remove(&products, MatchMode::Prefix), 2);
        assert_eq!(cache.keys(), vec![DataGroupKey::from("categories")]);
    }

    #[test]
    fn test_decode_mismatch_is_reported() {
        let cache = QueryCache::new(8);
        let key = DataGroupKey::from("categories");
        cache.set(key.clone(), &"not a list").unwrap();

        let result: Result<Option<Vec<u32>>, _> = cache.peek(&key);
        assert!(matches!(result, Err(CacheError::Decode { .. })));
    }
}
