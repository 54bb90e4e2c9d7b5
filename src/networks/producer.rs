use std::sync::Arc;
use std::time::Duration;

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};

use super::{NetworkFetchParams, NetworkStatusStore};
use crate::error::FetchError;
use crate::flow::{refresh_loop, CacheKey, FlowFetcher, FlowProducer, ProducerFactory};
use crate::models::NetworkStatus;
use crate::storage::distinct_until_changed;

/// Cache key of a wallet's network set. Independent of the order networks were given in.
pub fn network_status_key(params: &NetworkFetchParams) -> CacheKey {
    let parts = ["networks".to_string(), params.wallet_id.to_string()]
        .into_iter()
        .chain(params.networks.iter().map(ToString::to_string));
    CacheKey::derive(parts)
}

/// Live statuses of the requested networks of one wallet.
pub struct NetworkStatusProducer {
    params: NetworkFetchParams,
    fetcher: Arc<dyn FlowFetcher<NetworkFetchParams>>,
    store: Arc<NetworkStatusStore>,
    refresh_interval: Option<Duration>,
}

impl FlowProducer<Vec<NetworkStatus>> for NetworkStatusProducer {
    fn produce(&self) -> BoxStream<'static, Result<Vec<NetworkStatus>, FetchError>> {
        if self.params.networks.is_empty() {
            return stream::once(future::ready(Ok(Vec::new()))).boxed();
        }

        let networks = self.params.networks.clone();
        let statuses = self.store.get(&self.params.wallet_id).map(move |all| {
            all.into_iter()
                .filter(|status| networks.contains(&status.network))
                .collect::<Vec<_>>()
        });

        let refreshes = refresh_loop(
            self.fetcher.clone(),
            self.params.clone(),
            self.refresh_interval,
        );

        stream::select(
            distinct_until_changed(statuses).map(Ok),
            refreshes.map(Err),
        )
        .boxed()
    }
}

pub struct NetworkStatusProducerFactory {
    fetcher: Arc<dyn FlowFetcher<NetworkFetchParams>>,
    store: Arc<NetworkStatusStore>,
    refresh_interval: Option<Duration>,
}

impl NetworkStatusProducerFactory {
    pub fn new(
        fetcher: Arc<dyn FlowFetcher<NetworkFetchParams>>,
        store: Arc<NetworkStatusStore>,
    ) -> Self {
        Self {
            fetcher,
            store,
            refresh_interval: None,
        }
    }

    pub fn with_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.refresh_interval = interval;
        self
    }
}

impl ProducerFactory<NetworkFetchParams, Vec<NetworkStatus>> for NetworkStatusProducerFactory {
    fn create(
        &self,
        params: &NetworkFetchParams,
    ) -> Result<Box<dyn FlowProducer<Vec<NetworkStatus>>>, FetchError> {
        if params.public_key.trim().is_empty() {
            return Err(FetchError::InvalidArguments(format!(
                "wallet {} has no public key",
                params.wallet_id
            )));
        }

        Ok(Box::new(NetworkStatusProducer {
            params: params.clone(),
            fetcher: self.fetcher.clone(),
            store: self.store.clone(),
            refresh_interval: self.refresh_interval,
        }))
    }
}
