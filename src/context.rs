use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::flow::{CachingSupplier, ProducerFactory};
use crate::models::{NetworkStatus, Quote, RawCurrencyId};
use crate::networks::{
    network_status_key, AccountSource, NetworkFetchParams, NetworkStatusFetcher,
    NetworkStatusProducerFactory, NetworkStatusStore,
};
use crate::providers::{FailoverClient, ProviderAsset, ProviderOrderingStore};
use crate::quotes::{
    quote_key, QuoteFetchParams, QuoteProducerFactory, QuoteSource, QuoteStore, QuotesFetcher,
};

/// Every store, fetcher and supplier of the feed, built once and shared by reference.
pub struct FeedContext {
    config: Config,
    providers: Arc<ProviderOrderingStore>,
    network_store: Arc<NetworkStatusStore>,
    quote_store: Arc<QuoteStore>,
    network_fetcher: Arc<NetworkStatusFetcher>,
    quotes_fetcher: Arc<QuotesFetcher>,
    network_statuses: CachingSupplier<NetworkFetchParams, Vec<NetworkStatus>>,
    quotes: CachingSupplier<QuoteFetchParams, Vec<Quote>>,
}

impl FeedContext {
    pub fn new(
        config: Config,
        account_source: Arc<dyn AccountSource>,
        quote_source: Arc<dyn QuoteSource>,
        asset: impl ProviderAsset + 'static,
    ) -> Self {
        Self::with_clock(
            config,
            account_source,
            quote_source,
            asset,
            Arc::new(SystemClock),
        )
    }

    pub fn with_clock(
        config: Config,
        account_source: Arc<dyn AccountSource>,
        quote_source: Arc<dyn QuoteSource>,
        asset: impl ProviderAsset + 'static,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let providers = Arc::new(ProviderOrderingStore::new(asset));
        let network_store = Arc::new(NetworkStatusStore::new());
        let quote_store = Arc::new(QuoteStore::new());

        let network_fetcher = Arc::new(NetworkStatusFetcher::new(
            network_store.clone(),
            FailoverClient::new(providers.clone(), config.fetch.attempt_timeout),
            account_source,
            clock.clone(),
        ));
        let quotes_fetcher = Arc::new(QuotesFetcher::new(
            quote_source,
            quote_store.clone(),
            clock,
            config.quotes.response_ttl,
        ));

        let network_factory: Arc<dyn ProducerFactory<NetworkFetchParams, Vec<NetworkStatus>>> =
            Arc::new(
                NetworkStatusProducerFactory::new(network_fetcher.clone(), network_store.clone())
                    .with_refresh_interval(config.networks.refresh_interval),
            );
        let network_statuses =
            CachingSupplier::new("network_statuses", network_factory, network_status_key)
                .with_linger(config.supplier.linger);

        let quote_factory: Arc<dyn ProducerFactory<QuoteFetchParams, Vec<Quote>>> = Arc::new(
            QuoteProducerFactory::new(quotes_fetcher.clone(), quote_store.clone())
                .with_refresh_interval(config.quotes.refresh_interval),
        );
        let quotes = CachingSupplier::new("quotes", quote_factory, quote_key)
            .with_linger(config.supplier.linger);

        Self {
            config,
            providers,
            network_store,
            quote_store,
            network_fetcher,
            quotes_fetcher,
            network_statuses,
            quotes,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn providers(&self) -> &Arc<ProviderOrderingStore> {
        &self.providers
    }

    pub fn network_store(&self) -> &Arc<NetworkStatusStore> {
        &self.network_store
    }

    pub fn quote_store(&self) -> &Arc<QuoteStore> {
        &self.quote_store
    }

    /// For forced refreshes (pull-to-refresh) outside of any producer.
    pub fn network_fetcher(&self) -> &Arc<NetworkStatusFetcher> {
        &self.network_fetcher
    }

    pub fn quotes_fetcher(&self) -> &Arc<QuotesFetcher> {
        &self.quotes_fetcher
    }

    pub fn network_statuses(&self) -> &CachingSupplier<NetworkFetchParams, Vec<NetworkStatus>> {
        &self.network_statuses
    }

    pub fn quotes(&self) -> &CachingSupplier<QuoteFetchParams, Vec<Quote>> {
        &self.quotes
    }

    /// Quote parameters in the configured fiat currency.
    pub fn quote_params(
        &self,
        currency_ids: impl IntoIterator<Item = RawCurrencyId>,
    ) -> QuoteFetchParams {
        QuoteFetchParams::new(
            self.config.quotes.fiat_currency.clone(),
            currency_ids.into_iter().collect(),
        )
    }
}
