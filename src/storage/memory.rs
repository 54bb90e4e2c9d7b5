//! In-memory observable stores.
//!
//! Every store owns a `watch` channel holding the current value and a writer mutex.
//! All mutations run inside the mutex, so a read-modify-write can never interleave with
//! another write to the same store. Observers see the latest value (intermediate values
//! may be conflated) in the order the writes were applied, and a write that leaves the
//! value unchanged does not wake them.

use std::collections::HashMap;
use std::hash::Hash;

use futures::stream::{BoxStream, StreamExt};
use tokio::sync::{watch, Mutex};
use tokio_stream::wrappers::WatchStream;

use super::distinct_until_changed;

/// A single observable value, absent until first written.
pub struct RuntimeStore<V> {
    writer: Mutex<()>,
    tx: watch::Sender<Option<V>>,
}

impl<V> Default for RuntimeStore<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> RuntimeStore<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            writer: Mutex::new(()),
            tx,
        }
    }

    /// Current value followed by every later change. Nothing is emitted while the
    /// store is empty.
    pub fn get(&self) -> BoxStream<'static, V> {
        WatchStream::new(self.tx.subscribe())
            .filter_map(futures::future::ready)
            .boxed()
    }

    pub fn get_sync_or_null(&self) -> Option<V> {
        self.tx.borrow().clone()
    }

    /// Atomically replace the value with `transform(current)`, starting from `default`
    /// when the store is empty.
    pub async fn update(&self, default: V, transform: impl FnOnce(V) -> V) {
        let _guard = self.writer.lock().await;
        let current = self.tx.borrow().clone().unwrap_or(default);
        self.publish(transform(current));
    }

    /// Like [`Self::update`], but the transform sees `None` for an empty store and may
    /// decline to write by returning `None`.
    pub async fn update_opt(&self, transform: impl FnOnce(Option<V>) -> Option<V>) {
        let _guard = self.writer.lock().await;
        let current = self.tx.borrow().clone();
        if let Some(next) = transform(current) {
            self.publish(next);
        }
    }

    pub async fn store(&self, value: V) {
        let _guard = self.writer.lock().await;
        self.publish(value);
    }

    pub async fn clear(&self) {
        let _guard = self.writer.lock().await;
        self.tx.send_if_modified(|slot| slot.take().is_some());
    }

    fn publish(&self, next: V) {
        self.tx.send_if_modified(|slot| {
            if slot.as_ref() == Some(&next) {
                false
            } else {
                *slot = Some(next);
                true
            }
        });
    }
}

/// A keyed map of observable values built on [`RuntimeStore`].
pub struct RuntimeKeyValueStore<K, V> {
    inner: RuntimeStore<HashMap<K, V>>,
}

impl<K, V> Default for RuntimeKeyValueStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RuntimeKeyValueStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: RuntimeStore::new(),
        }
    }

    /// The whole map, once anything has been written.
    pub fn get(&self) -> BoxStream<'static, HashMap<K, V>> {
        self.inner.get()
    }

    /// Value for `key`, re-emitted only when that entry changes.
    pub fn get_key(&self, key: K) -> BoxStream<'static, V> {
        let values = self
            .inner
            .get()
            .filter_map(move |map| futures::future::ready(map.get(&key).cloned()));
        distinct_until_changed(values)
    }

    pub fn get_sync_or_null(&self) -> Option<HashMap<K, V>> {
        self.inner.get_sync_or_null()
    }

    pub fn get_sync(&self, key: &K) -> Option<V> {
        self.inner.tx.borrow().as_ref().and_then(|map| map.get(key).cloned())
    }

    /// Atomically rewrite the map in place.
    pub async fn update(&self, transform: impl FnOnce(&mut HashMap<K, V>)) {
        self.inner
            .update(HashMap::new(), |mut map| {
                transform(&mut map);
                map
            })
            .await;
    }

    /// Atomically replace the entry for `key` with `transform(current)`, starting from
    /// `default` when the key is absent. Other keys are never touched.
    pub async fn update_key(&self, key: K, default: V, transform: impl FnOnce(V) -> V) {
        self.update(move |map| {
            let current = map.remove(&key).unwrap_or(default);
            map.insert(key, transform(current));
        })
        .await;
    }

    pub async fn store_key(&self, key: K, value: V) {
        self.update(move |map| {
            map.insert(key, value);
        })
        .await;
    }

    pub async fn store_all(&self, entries: impl IntoIterator<Item = (K, V)>) {
        self.update(move |map| map.extend(entries)).await;
    }

    pub async fn remove(&self, key: &K) {
        self.inner
            .update_opt(|current| {
                let mut map = current?;
                map.remove(key)?;
                Some(map)
            })
            .await;
    }

    pub async fn clear(&self) {
        self.inner.clear().await;
    }
}
