//! Keyed handle cache
//!
//! Holds one long-lived handle per key (e.g. one keep-alive HTTP agent per
//! endpoint), created lazily on first request and reused afterwards.

use std::collections::HashMap;
use std::hash::Hash;
use tokio::sync::Mutex;
use tracing::debug;

/// Lazily populated map of shared handles
pub struct KeyedPool<K, V> {
    handles: Mutex<HashMap<K, V>>,
}

impl<K, V> KeyedPool<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Get the handle for `key`, creating it with `create` on first use.
    ///
    /// The map stays locked while `create` runs, so concurrent callers for
    /// the same key observe a single handle.
    pub async fn get_or_try_insert_with<F, E>(&self, key: &K, create: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let mut handles = self.handles.lock().await;
        if let Some(handle) = handles.get(key) {
            return Ok(handle.clone());
        }

        let handle = create()?;
        debug!("Created keyed handle for {:?}", key);
        handles.insert(key.clone(), handle.clone());
        Ok(handle)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.handles.lock().await.len()
    }

    /// Drop every cached handle, returning how many there were
    pub async fn clear(&self) -> usize {
        let mut handles = self.handles.lock().await;
        let count = handles.len();
        handles.clear();
        count
    }
}

impl<K, V> Default for KeyedPool<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_handle_created_once_per_key() {
        let pool: KeyedPool<String, Arc<usize>> = KeyedPool::new();
        let created = AtomicUsize::new(0);
        let key = "https://api.example.com".to_string();

        let make = || -> Result<Arc<usize>, ()> {
            Ok(Arc::new(created.fetch_add(1, Ordering::SeqCst)))
        };
        let a = pool.get_or_try_insert_with(&key, make).await.unwrap();
        let b = pool
            .get_or_try_insert_with(&key, || -> Result<Arc<usize>, ()> { Ok(Arc::new(99)) })
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_handle() {
        let pool: Arc<KeyedPool<String, Arc<usize>>> = Arc::new(KeyedPool::new());
        let created = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let pool = pool.clone();
                let created = created.clone();
                tokio::spawn(async move {
                    let key = "https://api.example.com".to_string();
                    pool.get_or_try_insert_with(&key, || -> Result<Arc<usize>, ()> {
                        Ok(Arc::new(created.fetch_add(1, Ordering::SeqCst)))
                    })
                    .await
                    .unwrap()
                })
            })
            .collect();

        let handles: Vec<Arc<usize>> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_creation_is_not_cached() {
        let pool: KeyedPool<&'static str, u8> = KeyedPool::new();

        let err = pool
            .get_or_try_insert_with(&"a", || Err::<u8, _>("boom"))
            .await;
        assert_eq!(err, Err("boom"));
        assert_eq!(pool.len().await, 0);

        let ok = pool.get_or_try_insert_with(&"a", || Ok::<_, &str>(1)).await;
        assert_eq!(ok, Ok(1));
    }

    #[tokio::test]
    async fn test_clear() {
        let pool: KeyedPool<u8, u8> = KeyedPool::new();
        for key in 0..3u8 {
            pool.get_or_try_insert_with(&key, || Ok::<_, ()>(key))
                .await
                .unwrap();
        }
        assert_eq!(pool.clear().await, 3);
        assert_eq!(pool.len().await, 0);
    }
}
