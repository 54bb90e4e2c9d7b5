//! Key-multiplexed sharing of producers.
//!
//! A [`CachingSupplier`] keeps a registry from [`CacheKey`] to one running producer.
//! Each entry owns a forwarding task that drives the producer stream into a `watch`
//! channel, and a subscriber count. Callers get a [`SharedStream`] whose drop releases
//! its slot; when the count reaches zero the entry lingers for the configured grace
//! period and is then torn down, which aborts the forwarding task and with it any
//! in-flight remote call of the producer.
//!
//! Lookup-or-create runs under a single registry mutex, so two concurrent first callers
//! for the same key can never both create a producer.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use super::{CacheKey, ProducerFactory};
use crate::error::{FetchError, SupplierError};

type Slot<R> = Option<Result<R, FetchError>>;

pub struct CachingSupplier<P, R> {
    name: &'static str,
    factory: Arc<dyn ProducerFactory<P, R>>,
    key_creator: Box<dyn Fn(&P) -> CacheKey + Send + Sync>,
    linger: Duration,
    registry: Arc<Registry<R>>,
}

impl<P, R> CachingSupplier<P, R>
where
    R: Clone + Send + Sync + 'static,
{
    pub fn new(
        name: &'static str,
        factory: Arc<dyn ProducerFactory<P, R>>,
        key_creator: impl Fn(&P) -> CacheKey + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            factory,
            key_creator: Box::new(key_creator),
            linger: Duration::ZERO,
            registry: Arc::new(Registry::new(name)),
        }
    }

    /// Keep producers alive this long after their last subscriber leaves.
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    /// Attach to the shared stream for `params`, starting a producer if none is running
    /// for its key.
    ///
    /// Must be called from within a tokio runtime. If the factory fails, the error is
    /// returned to this caller only and nothing is registered, so a later call retries.
    pub fn get(&self, params: &P) -> Result<SharedStream<R>, SupplierError> {
        let key = (self.key_creator)(params);
        let mut entries = self.registry.lock();

        if let Some(entry) = entries.get_mut(&key) {
            entry.subscribers += 1;
            if let Some(teardown) = entry.teardown.take() {
                teardown.abort();
                debug!(supplier = self.name, key = %key, "resubscribed within linger window");
            }
            debug!(
                supplier = self.name,
                key = %key,
                subscribers = entry.subscribers,
                "attached to running producer"
            );
            let lease = self.lease(key, entry.id);
            return Ok(SharedStream::new(entry.rx.clone(), lease));
        }

        let producer = self
            .factory
            .create(params)
            .map_err(|source| SupplierError::ProducerCreation {
                key: key.clone(),
                source,
            })?;

        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(forward(
            producer.produce(),
            tx,
            Arc::downgrade(&self.registry),
            key.clone(),
            id,
        ));

        info!(supplier = self.name, key = %key, "producer started");
        entries.insert(
            key.clone(),
            Entry {
                id,
                rx: rx.clone(),
                subscribers: 1,
                task: task.abort_handle(),
                teardown: None,
            },
        );

        Ok(SharedStream::new(rx, self.lease(key, id)))
    }

    /// Keys with a registered producer, including lingering ones.
    pub fn active_keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<_> = self.registry.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn subscriber_count(&self, key: &CacheKey) -> usize {
        self.registry
            .lock()
            .get(key)
            .map(|entry| entry.subscribers)
            .unwrap_or(0)
    }

    pub fn cache_key(&self, params: &P) -> CacheKey {
        (self.key_creator)(params)
    }

    fn lease(&self, key: CacheKey, id: u64) -> Lease<R> {
        Lease {
            registry: self.registry.clone(),
            key,
            id,
            linger: self.linger,
        }
    }
}

/// A subscriber's view of a shared producer. Dropping it detaches the subscriber.
///
/// The latest item is replayed to every new subscriber. The stream ends when the
/// producer completes.
pub struct SharedStream<R: Send + Sync + 'static> {
    inner: BoxStream<'static, Result<R, FetchError>>,
    _lease: Lease<R>,
}

impl<R> SharedStream<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn new(rx: watch::Receiver<Slot<R>>, lease: Lease<R>) -> Self {
        Self {
            inner: WatchStream::new(rx)
                .filter_map(futures::future::ready)
                .boxed(),
            _lease: lease,
        }
    }
}

impl<R: Send + Sync + 'static> Stream for SharedStream<R> {
    type Item = Result<R, FetchError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

struct Entry<R> {
    /// Distinguishes this producer from earlier ones registered under the same key.
    id: u64,
    rx: watch::Receiver<Slot<R>>,
    subscribers: usize,
    task: AbortHandle,
    teardown: Option<AbortHandle>,
}

struct Registry<R> {
    name: &'static str,
    entries: Mutex<HashMap<CacheKey, Entry<R>>>,
    next_id: AtomicU64,
}

impl<R> Registry<R> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry<R>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop the entry for `key` if it is still producer `id`, aborting its task.
    fn remove(&self, entries: &mut HashMap<CacheKey, Entry<R>>, key: &CacheKey, id: u64) {
        if entries.get(key).is_some_and(|entry| entry.id == id) {
            if let Some(entry) = entries.remove(key) {
                entry.task.abort();
                if let Some(teardown) = entry.teardown {
                    teardown.abort();
                }
                info!(supplier = self.name, key = %key, "producer torn down");
            }
        }
    }
}

impl<R: Send + Sync + 'static> Registry<R> {
    fn release(self: &Arc<Self>, key: &CacheKey, id: u64, linger: Duration) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key).filter(|entry| entry.id == id) else {
            return;
        };

        entry.subscribers = entry.subscribers.saturating_sub(1);
        debug!(
            supplier = self.name,
            key = %key,
            subscribers = entry.subscribers,
            "subscriber detached"
        );
        if entry.subscribers > 0 {
            return;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) if !linger.is_zero() => handle,
            _ => {
                self.remove(&mut entries, key, id);
                return;
            }
        };

        let registry = Arc::downgrade(self);
        let timer_key = key.clone();
        let timer = handle.spawn(async move {
            tokio::time::sleep(linger).await;
            if let Some(registry) = registry.upgrade() {
                registry.expire(&timer_key, id);
            }
        });
        entry.teardown = Some(timer.abort_handle());
    }

    fn expire(&self, key: &CacheKey, id: u64) {
        let mut entries = self.lock();
        let idle = entries
            .get(key)
            .is_some_and(|entry| entry.id == id && entry.subscribers == 0);
        if idle {
            self.remove(&mut entries, key, id);
        }
    }

    /// Called by the forwarding task once the producer stream has ended.
    fn finish(&self, key: &CacheKey, id: u64) {
        let mut entries = self.lock();
        if entries.get(key).is_some_and(|entry| entry.id == id) {
            entries.remove(key);
            debug!(supplier = self.name, key = %key, "producer completed");
        }
    }
}

impl<R> Drop for Registry<R> {
    fn drop(&mut self) {
        let entries = self
            .entries
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for entry in entries.values() {
            entry.task.abort();
            if let Some(teardown) = &entry.teardown {
                teardown.abort();
            }
        }
    }
}

struct Lease<R: Send + Sync + 'static> {
    registry: Arc<Registry<R>>,
    key: CacheKey,
    id: u64,
    linger: Duration,
}

impl<R: Send + Sync + 'static> Drop for Lease<R> {
    fn drop(&mut self) {
        self.registry.release(&self.key, self.id, self.linger);
    }
}

async fn forward<R: Send + Sync + 'static>(
    mut upstream: BoxStream<'static, Result<R, FetchError>>,
    tx: watch::Sender<Slot<R>>,
    registry: Weak<Registry<R>>,
    key: CacheKey,
    id: u64,
) {
    while let Some(item) = upstream.next().await {
        if let Err(error) = &item {
            warn!(key = %key, error = %error, "producer reported a failed refresh");
        }
        tx.send_replace(Some(item));
    }

    // Unregister before the sender drops so no new subscriber attaches to a closed channel.
    if let Some(registry) = registry.upgrade() {
        registry.finish(&key, id);
    }
}
