use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{QuoteSource, QuoteStore};
use crate::clock::Clock;
use crate::error::FetchError;
use crate::flow::FlowFetcher;
use crate::models::{Quote, QuoteField, QuotePayload, QuotesResponse, RawCurrencyId, StatusSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteFetchParams {
    pub fiat_currency: String,
    pub currency_ids: BTreeSet<RawCurrencyId>,
    pub fields: BTreeSet<QuoteField>,
}

impl QuoteFetchParams {
    pub fn new(fiat_currency: impl Into<String>, currency_ids: BTreeSet<RawCurrencyId>) -> Self {
        Self {
            fiat_currency: fiat_currency.into(),
            currency_ids,
            fields: QuoteField::ALL.into_iter().collect(),
        }
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = QuoteField>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }
}

/// One response cache per fiat currency and field set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResponseSlot {
    fiat_currency: String,
    fields: BTreeSet<QuoteField>,
}

#[derive(Debug, Clone)]
struct CachedPayload {
    payload: QuotePayload,
    fetched_at: DateTime<Utc>,
}

type ResponseCache = HashMap<RawCurrencyId, CachedPayload>;

/// A failed fetch and the ids that were actually sent to the source.
struct SourceFailure {
    error: FetchError,
    requested: BTreeSet<RawCurrencyId>,
}

/// Fetches quotes through a short-lived response cache and merges them into the
/// [`QuoteStore`].
///
/// Fetches for the same fiat currency and fields run one at a time, so callers that
/// arrive while a request is in flight are answered from its result.
pub struct QuotesFetcher {
    source: Arc<dyn QuoteSource>,
    store: Arc<QuoteStore>,
    clock: Arc<dyn Clock>,
    response_ttl: Duration,
    slots: StdMutex<HashMap<ResponseSlot, Arc<Mutex<ResponseCache>>>>,
}

impl QuotesFetcher {
    pub fn new(
        source: Arc<dyn QuoteSource>,
        store: Arc<QuoteStore>,
        clock: Arc<dyn Clock>,
        response_ttl: Duration,
    ) -> Self {
        Self {
            source,
            store,
            clock,
            response_ttl,
            slots: StdMutex::new(HashMap::new()),
        }
    }

    /// Quotes for `params`, from the response cache where fresh and from the source
    /// otherwise. Does not touch the store.
    pub async fn fetch_quotes(
        &self,
        params: &QuoteFetchParams,
    ) -> Result<QuotesResponse, FetchError> {
        self.fetch_through_cache(params)
            .await
            .map_err(|failure| failure.error)
    }

    async fn fetch_through_cache(
        &self,
        params: &QuoteFetchParams,
    ) -> Result<QuotesResponse, SourceFailure> {
        validate(params).map_err(|error| SourceFailure {
            error,
            requested: BTreeSet::new(),
        })?;
        if params.currency_ids.is_empty() {
            return Ok(QuotesResponse::default());
        }

        let slot = self.slot(params);
        let mut cache = slot.lock().await;
        let now = self.clock.now();

        let mut response = QuotesResponse::default();
        let mut expired = BTreeSet::new();
        for id in &params.currency_ids {
            match cache.get(id).filter(|entry| self.is_fresh(entry, now)) {
                Some(entry) => {
                    response.quotes.insert(id.clone(), entry.payload.clone());
                }
                None => {
                    expired.insert(id.clone());
                }
            }
        }

        if expired.is_empty() {
            debug!(
                fiat = %params.fiat_currency,
                ids = params.currency_ids.len(),
                "quotes served from cache"
            );
            return Ok(response);
        }

        debug!(
            fiat = %params.fiat_currency,
            cached = response.quotes.len(),
            requested = expired.len(),
            "requesting quotes"
        );
        let fetched = match self
            .source
            .fetch_quotes(&params.fiat_currency, &expired, &params.fields)
            .await
        {
            Ok(fetched) => fetched,
            Err(error) => {
                return Err(SourceFailure {
                    error,
                    requested: expired,
                })
            }
        };

        let fetched_at = self.clock.now();
        for (id, payload) in fetched.quotes {
            // Ignore anything the source sent that was not asked for.
            if !expired.contains(&id) {
                continue;
            }
            cache.insert(
                id.clone(),
                CachedPayload {
                    payload: payload.clone(),
                    fetched_at,
                },
            );
            response.quotes.insert(id, payload);
        }

        Ok(response)
    }

    /// Drop all cached responses, forcing the next fetch to hit the source.
    pub fn invalidate(&self) {
        self.lock_slots().clear();
    }

    fn is_fresh(&self, entry: &CachedPayload, now: DateTime<Utc>) -> bool {
        // A timestamp in the future (clock moved back) counts as fresh.
        match (now - entry.fetched_at).to_std() {
            Ok(age) => age < self.response_ttl,
            Err(_) => true,
        }
    }

    fn slot(&self, params: &QuoteFetchParams) -> Arc<Mutex<ResponseCache>> {
        let key = ResponseSlot {
            fiat_currency: params.fiat_currency.to_lowercase(),
            fields: params.fields.clone(),
        };
        self.lock_slots().entry(key).or_default().clone()
    }

    fn lock_slots(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<ResponseSlot, Arc<Mutex<ResponseCache>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate(params: &QuoteFetchParams) -> Result<(), FetchError> {
    if params.fiat_currency.trim().is_empty() {
        return Err(FetchError::InvalidArguments(
            "fiat currency must not be empty".to_string(),
        ));
    }
    if params.fields.is_empty() {
        return Err(FetchError::InvalidArguments(
            "at least one quote field must be requested".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl FlowFetcher<QuoteFetchParams> for QuotesFetcher {
    async fn fetch(&self, params: &QuoteFetchParams) -> Result<(), FetchError> {
        let fiat = params.fiat_currency.as_str();
        match self.fetch_through_cache(params).await {
            Ok(response) => {
                self.store.store(fiat, &response).await;

                // Ids the source had nothing for get a placeholder so observers of the
                // full set are not left waiting.
                let missing: BTreeSet<_> = params
                    .currency_ids
                    .iter()
                    .filter(|id| !response.quotes.contains_key(*id))
                    .cloned()
                    .collect();
                self.store
                    .update_status_source(fiat, &missing, StatusSource::Cached, |id| {
                        Some(Quote::empty(id.clone()))
                    })
                    .await;
                Ok(())
            }
            Err(SourceFailure {
                error: error @ FetchError::InvalidArguments(_),
                ..
            }) => Err(error),
            Err(SourceFailure { error, requested }) => {
                warn!(
                    fiat = %params.fiat_currency,
                    ids = requested.len(),
                    error = %error,
                    "quote refresh failed"
                );
                // Ids answered from the response cache are still current.
                self.store
                    .update_status_source(fiat, &requested, StatusSource::Cached, |id| {
                        Some(Quote::empty(id.clone()))
                    })
                    .await;
                Err(error)
            }
        }
    }
}
