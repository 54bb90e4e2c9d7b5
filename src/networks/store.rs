use std::collections::{BTreeMap, BTreeSet};

use futures::stream::{BoxStream, StreamExt};

use crate::models::{Network, NetworkStatus, NetworkStatusValue, StatusSource, WalletId};
use crate::storage::RuntimeKeyValueStore;

type WalletStatuses = BTreeMap<Network, NetworkStatus>;

/// Per-wallet network statuses, one per network.
///
/// Writes for one network replace only that network's status; all writes for all
/// wallets go through a single serialized store, so concurrent completions for
/// different networks of the same wallet are never lost.
#[derive(Default)]
pub struct NetworkStatusStore {
    inner: RuntimeKeyValueStore<WalletId, WalletStatuses>,
}

impl NetworkStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses of `wallet` ordered by network, re-emitted when any of them changes.
    /// Nothing is emitted until the wallet has at least one status.
    pub fn get(&self, wallet: &WalletId) -> BoxStream<'static, Vec<NetworkStatus>> {
        self.inner
            .get_key(wallet.clone())
            .map(|statuses| statuses.into_values().collect())
            .boxed()
    }

    pub fn get_sync_or_null(&self, wallet: &WalletId) -> Option<Vec<NetworkStatus>> {
        self.inner
            .get_sync(wallet)
            .map(|statuses| statuses.into_values().collect())
    }

    /// Merge one status in, replacing any previous status of the same network.
    pub async fn store(&self, wallet: &WalletId, status: NetworkStatus) {
        self.inner
            .update_key(wallet.clone(), WalletStatuses::new(), |mut statuses| {
                statuses.insert(status.network.clone(), status);
                statuses
            })
            .await;
    }

    pub async fn store_all(
        &self,
        wallet: &WalletId,
        statuses: impl IntoIterator<Item = NetworkStatus>,
    ) {
        self.inner
            .update_key(wallet.clone(), WalletStatuses::new(), |mut current| {
                current.extend(statuses.into_iter().map(|s| (s.network.clone(), s)));
                current
            })
            .await;
    }

    /// Record a failed refresh for `network`, keeping the balances it had before.
    pub async fn store_error(
        &self,
        wallet: &WalletId,
        network: &Network,
        error: impl Into<String>,
    ) {
        let error = error.into();
        self.inner
            .update_key(wallet.clone(), WalletStatuses::new(), |mut statuses| {
                let status =
                    NetworkStatus::unreachable(network.clone(), error, statuses.get(network));
                statuses.insert(network.clone(), status);
                statuses
            })
            .await;
    }

    /// Re-mark the statuses of `networks` with `source`. For a network the wallet has
    /// no status for yet, `if_not_found` decides what (if anything) to insert.
    pub async fn update_status_source(
        &self,
        wallet: &WalletId,
        networks: &BTreeSet<Network>,
        source: StatusSource,
        if_not_found: impl Fn(&Network) -> Option<NetworkStatus>,
    ) {
        self.inner
            .update_key(wallet.clone(), WalletStatuses::new(), |mut statuses| {
                for network in networks {
                    let next = match statuses.remove(network) {
                        Some(status) => Some(status.with_source(source)),
                        None => if_not_found(network),
                    };
                    if let Some(next) = next {
                        statuses.insert(network.clone(), next);
                    }
                }
                statuses
            })
            .await;
    }

    /// Drop the statuses of `networks` that are still `Loading`, leaving every other
    /// status alone.
    pub async fn discard_loading(&self, wallet: &WalletId, networks: &BTreeSet<Network>) {
        self.inner
            .update_key(wallet.clone(), WalletStatuses::new(), |mut statuses| {
                statuses.retain(|network, status| {
                    !(networks.contains(network) && status.value == NetworkStatusValue::Loading)
                });
                statuses
            })
            .await;
    }

    pub async fn remove_wallet(&self, wallet: &WalletId) {
        self.inner.remove(wallet).await;
    }

    pub async fn clear(&self) {
        self.inner.clear().await;
    }
}
