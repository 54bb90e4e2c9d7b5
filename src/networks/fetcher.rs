use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use super::{AccountSource, NetworkStatusStore};
use crate::clock::Clock;
use crate::error::FetchError;
use crate::flow::FlowFetcher;
use crate::models::{Balances, Network, NetworkStatus, StatusSource, WalletId};
use crate::providers::FailoverClient;

/// What to refresh: the given networks of one wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkFetchParams {
    pub wallet_id: WalletId,
    /// Key material the account source derives addresses from.
    pub public_key: String,
    pub networks: BTreeSet<Network>,
}

/// Refreshes network statuses of a wallet and writes them to the [`NetworkStatusStore`].
pub struct NetworkStatusFetcher {
    store: Arc<NetworkStatusStore>,
    client: FailoverClient,
    source: Arc<dyn AccountSource>,
    clock: Arc<dyn Clock>,
}

impl NetworkStatusFetcher {
    pub fn new(
        store: Arc<NetworkStatusStore>,
        client: FailoverClient,
        source: Arc<dyn AccountSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            client,
            source,
            clock,
        }
    }

    /// Fetch one network and store the outcome. Returns the error that was recorded.
    async fn refresh_network(
        &self,
        params: &NetworkFetchParams,
        network: &Network,
    ) -> Result<(), FetchError> {
        let result = self
            .client
            .execute(&network.id, |provider| async move {
                self.source
                    .fetch_balances(&provider, network, &params.public_key)
                    .await
            })
            .await;

        let status = match result {
            Ok(balances) => NetworkStatus::loaded(network.clone(), balances, self.clock.now()),
            // An account the chain has never seen simply holds nothing.
            Err(FetchError::NotFound) => {
                NetworkStatus::loaded(network.clone(), Balances::new(), self.clock.now())
            }
            Err(error) => {
                warn!(
                    wallet = %params.wallet_id,
                    network = %network,
                    error = %error,
                    "network refresh failed"
                );
                self.store
                    .store_error(&params.wallet_id, network, error.to_string())
                    .await;
                return Err(error);
            }
        };

        self.store.store(&params.wallet_id, status).await;
        Ok(())
    }
}

/// Removes the `Loading` placeholders of a refresh that is dropped before it settles,
/// so no network is left loading with nothing in flight.
struct LoadingPlaceholders {
    store: Arc<NetworkStatusStore>,
    wallet_id: WalletId,
    networks: BTreeSet<Network>,
    settled: bool,
}

impl LoadingPlaceholders {
    fn new(store: Arc<NetworkStatusStore>, params: &NetworkFetchParams) -> Self {
        Self {
            store,
            wallet_id: params.wallet_id.clone(),
            networks: params.networks.clone(),
            settled: false,
        }
    }

    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for LoadingPlaceholders {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        debug!(wallet = %self.wallet_id, "network refresh cancelled");
        let store = self.store.clone();
        let wallet_id = self.wallet_id.clone();
        let networks = std::mem::take(&mut self.networks);
        runtime.spawn(async move {
            store.discard_loading(&wallet_id, &networks).await;
        });
    }
}

#[async_trait]
impl FlowFetcher<NetworkFetchParams> for NetworkStatusFetcher {
    async fn fetch(&self, params: &NetworkFetchParams) -> Result<(), FetchError> {
        if params.networks.is_empty() {
            return Ok(());
        }

        // Known statuses become stale; unknown ones show as loading until their
        // first result lands.
        self.store
            .update_status_source(
                &params.wallet_id,
                &params.networks,
                StatusSource::Cached,
                |network| Some(NetworkStatus::loading(network.clone())),
            )
            .await;
        let placeholders = LoadingPlaceholders::new(self.store.clone(), params);

        let results = join_all(
            params
                .networks
                .iter()
                .map(|network| self.refresh_network(params, network)),
        )
        .await;
        placeholders.settle();

        let failed: Vec<_> = params
            .networks
            .iter()
            .zip(results)
            .filter(|(_, result)| result.is_err())
            .map(|(network, _)| network.id.clone())
            .collect();

        debug!(
            wallet = %params.wallet_id,
            total = params.networks.len(),
            failed = failed.len(),
            "network refresh finished"
        );

        if failed.is_empty() {
            Ok(())
        } else {
            Err(FetchError::NetworksFailed {
                failed,
                total: params.networks.len(),
            })
        }
    }
}
