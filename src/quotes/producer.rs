use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};

use super::{QuoteFetchParams, QuoteStore};
use crate::error::FetchError;
use crate::flow::{refresh_loop, CacheKey, FlowFetcher, FlowProducer, ProducerFactory};
use crate::models::Quote;

pub fn quote_key(params: &QuoteFetchParams) -> CacheKey {
    let fields = params
        .fields
        .iter()
        .map(|field| field.as_str())
        .collect::<Vec<_>>()
        .join(",");
    let parts = [
        "quotes".to_string(),
        params.fiat_currency.trim().to_lowercase(),
        fields,
    ]
    .into_iter()
    .chain(params.currency_ids.iter().map(ToString::to_string));
    CacheKey::derive(parts)
}

/// Live quotes for a set of currencies.
pub struct QuoteProducer {
    params: QuoteFetchParams,
    fetcher: Arc<dyn FlowFetcher<QuoteFetchParams>>,
    store: Arc<QuoteStore>,
    refresh_interval: Option<Duration>,
}

impl FlowProducer<Vec<Quote>> for QuoteProducer {
    fn produce(&self) -> BoxStream<'static, Result<Vec<Quote>, FetchError>> {
        let quotes = self
            .store
            .get(&self.params.fiat_currency, &self.params.currency_ids)
            .map(Ok);
        if self.params.currency_ids.is_empty() {
            return quotes.boxed();
        }

        let refreshes = refresh_loop(
            self.fetcher.clone(),
            self.params.clone(),
            self.refresh_interval,
        );
        stream::select(quotes, refreshes.map(Err)).boxed()
    }
}

pub struct QuoteProducerFactory {
    fetcher: Arc<dyn FlowFetcher<QuoteFetchParams>>,
    store: Arc<QuoteStore>,
    refresh_interval: Option<Duration>,
}

impl QuoteProducerFactory {
    pub fn new(fetcher: Arc<dyn FlowFetcher<QuoteFetchParams>>, store: Arc<QuoteStore>) -> Self {
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

impl ProducerFactory<QuoteFetchParams, Vec<Quote>> for QuoteProducerFactory {
    fn create(
        &self,
        params: &QuoteFetchParams,
    ) -> Result<Box<dyn FlowProducer<Vec<Quote>>>, FetchError> {
        if params.fiat_currency.trim().is_empty() {
            return Err(FetchError::InvalidArguments(
                "fiat currency must not be empty".to_string(),
            ));
        }

        Ok(Box::new(QuoteProducer {
            params: params.clone(),
            fetcher: self.fetcher.clone(),
            store: self.store.clone(),
            refresh_interval: self.refresh_interval,
        }))
    }
}
