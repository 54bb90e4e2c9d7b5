//! Producers, fetchers and the supplier that shares producers between subscribers.

mod key;
mod supplier;

pub use key::CacheKey;
pub use supplier::{CachingSupplier, SharedStream};

use std::sync::Arc;
use std::time::Duration;

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::FetchError;

/// A live view of `R` for the parameters the producer was created with.
///
/// The stream may be infinite and is not required to be restartable: a supplier calls
/// [`FlowProducer::produce`] exactly once per producer instance. `Err` items report a
/// failed refresh; the stream may keep going after them.
pub trait FlowProducer<R>: Send + Sync {
    fn produce(&self) -> BoxStream<'static, Result<R, FetchError>>;
}

/// Creates producers bound to one parameter value. This is where concrete fetch logic
/// and store access get injected.
pub trait ProducerFactory<P, R>: Send + Sync {
    fn create(&self, params: &P) -> Result<Box<dyn FlowProducer<R>>, FetchError>;
}

/// A one-shot refresh that writes its result into a store instead of returning it.
///
/// Whoever observes the store (usually a producer) sees the effect.
#[async_trait::async_trait]
pub trait FlowFetcher<P>: Send + Sync
where
    P: Sync,
{
    async fn fetch(&self, params: &P) -> Result<(), FetchError>;
}

/// Run `fetcher` once, then again every `interval` if one is given, yielding the error
/// of every failed run. Successful runs yield nothing; their effect shows up in the store.
pub fn refresh_loop<P>(
    fetcher: Arc<dyn FlowFetcher<P>>,
    params: P,
    interval: Option<Duration>,
) -> BoxStream<'static, FetchError>
where
    P: Send + Sync + 'static,
{
    stream::unfold(
        (fetcher, params, true),
        move |(fetcher, params, first)| async move {
            if !first {
                tokio::time::sleep(interval?).await;
            }
            let result = fetcher.fetch(&params).await;
            Some((result.err(), (fetcher, params, false)))
        },
    )
    .filter_map(future::ready)
    .boxed()
}
