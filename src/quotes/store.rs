use std::collections::BTreeSet;

use futures::stream::BoxStream;

use crate::models::{Quote, QuotesResponse, RawCurrencyId, StatusSource};
use crate::storage::{combine_latest, RuntimeKeyValueStore};

/// Store key: a currency priced in one fiat currency. Fiat codes are compared
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct QuoteKey {
    fiat_currency: String,
    currency_id: RawCurrencyId,
}

impl QuoteKey {
    fn new(fiat_currency: &str, currency_id: RawCurrencyId) -> Self {
        Self {
            fiat_currency: normalize_fiat(fiat_currency),
            currency_id,
        }
    }
}

fn normalize_fiat(fiat_currency: &str) -> String {
    fiat_currency.trim().to_lowercase()
}

/// Last known quote per currency and fiat currency.
///
/// Quotes priced in different fiat currencies never overwrite each other.
#[derive(Default)]
pub struct QuoteStore {
    inner: RuntimeKeyValueStore<QuoteKey, Quote>,
}

impl QuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quotes for `ids` in `fiat_currency`, in id order. The first emission waits
    /// until every id has a quote; after that any single change re-emits the whole
    /// set. An empty `ids` yields one empty set right away.
    pub fn get(
        &self,
        fiat_currency: &str,
        ids: &BTreeSet<RawCurrencyId>,
    ) -> BoxStream<'static, Vec<Quote>> {
        combine_latest(
            ids.iter()
                .map(|id| self.inner.get_key(QuoteKey::new(fiat_currency, id.clone())))
                .collect(),
        )
    }

    pub fn get_sync(&self, fiat_currency: &str, id: &RawCurrencyId) -> Option<Quote> {
        self.inner.get_sync(&QuoteKey::new(fiat_currency, id.clone()))
    }

    /// Every cached quote in `fiat_currency`, in id order, or `None` before the first
    /// write to the store.
    pub fn get_all_sync_or_null(&self, fiat_currency: &str) -> Option<Vec<Quote>> {
        let fiat_currency = normalize_fiat(fiat_currency);
        self.inner.get_sync_or_null().map(|quotes| {
            let mut quotes: Vec<_> = quotes
                .into_iter()
                .filter(|(key, _)| key.fiat_currency == fiat_currency)
                .collect();
            quotes.sort_by(|a, b| a.0.cmp(&b.0));
            quotes.into_iter().map(|(_, quote)| quote).collect()
        })
    }

    /// Merge a response priced in `fiat_currency`. Fields a payload omits keep their
    /// cached value.
    pub async fn store(&self, fiat_currency: &str, response: &QuotesResponse) {
        if response.quotes.is_empty() {
            return;
        }
        self.inner
            .update(|quotes| {
                for (id, payload) in &response.quotes {
                    let key = QuoteKey::new(fiat_currency, id.clone());
                    let next = match quotes.get(&key) {
                        Some(current) => current.merge(payload),
                        None => Quote::from_payload(id.clone(), payload),
                    };
                    quotes.insert(key, next);
                }
            })
            .await;
    }

    /// Re-mark cached quotes of `ids` in `fiat_currency` with `source`. For an id
    /// without a quote, `if_not_found` decides what (if anything) to insert.
    pub async fn update_status_source(
        &self,
        fiat_currency: &str,
        ids: &BTreeSet<RawCurrencyId>,
        source: StatusSource,
        if_not_found: impl Fn(&RawCurrencyId) -> Option<Quote>,
    ) {
        if ids.is_empty() {
            return;
        }
        self.inner
            .update(|quotes| {
                for id in ids {
                    let key = QuoteKey::new(fiat_currency, id.clone());
                    let next = match quotes.remove(&key) {
                        Some(quote) => Some(quote.with_source(source)),
                        None => if_not_found(id),
                    };
                    if let Some(next) = next {
                        quotes.insert(key, next);
                    }
                }
            })
            .await;
    }

    pub async fn clear(&self) {
        self.inner.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuotePayload;
    use futures::{FutureExt, StreamExt};
    use rust_decimal::Decimal;

    fn ids(values: &[&str]) -> BTreeSet<RawCurrencyId> {
        values.iter().map(|v| RawCurrencyId::new(*v)).collect()
    }

    fn price(id: &str, price: i64) -> QuotesResponse {
        QuotesResponse {
            quotes: [(
                RawCurrencyId::new(id),
                QuotePayload {
                    price: Some(Decimal::new(price, 0)),
                    ..QuotePayload::default()
                },
            )]
            .into(),
        }
    }

    #[tokio::test]
    async fn test_empty_id_set_emits_immediately() {
        let store = QuoteStore::new();
        let mut quotes = store.get("usd", &BTreeSet::new());
        assert_eq!(quotes.next().now_or_never(), Some(Some(Vec::new())));
    }

    #[tokio::test]
    async fn test_get_waits_for_every_id() {
        let store = QuoteStore::new();
        let mut quotes = store.get("usd", &ids(&["bitcoin", "ethereum"]));

        store.store("usd", &price("bitcoin", 60_000)).await;
        assert!(quotes.next().now_or_never().is_none());

        store.store("usd", &price("ethereum", 3_000)).await;
        let snapshot = quotes.next().await.unwrap();
        let rates: Vec<_> = snapshot.iter().map(Quote::fiat_rate).collect();
        assert_eq!(
            rates,
            vec![Some(Decimal::new(60_000, 0)), Some(Decimal::new(3_000, 0))]
        );
    }

    #[tokio::test]
    async fn test_store_preserves_omitted_fields() {
        let store = QuoteStore::new();
        store.store("usd", &price("bitcoin", 10)).await;

        let mut change = QuotesResponse::default();
        change.quotes.insert(
            RawCurrencyId::new("bitcoin"),
            QuotePayload {
                price_change_24h: Some(Decimal::new(5, 2)),
                ..QuotePayload::default()
            },
        );
        store.store("usd", &change).await;

        let quote = store.get_sync("usd", &RawCurrencyId::new("bitcoin")).unwrap();
        let data = quote.data().unwrap();
        assert_eq!(data.fiat_rate, Some(Decimal::new(10, 0)));
        assert_eq!(data.price_change_24h, Some(Decimal::new(5, 2)));
    }

    #[tokio::test]
    async fn test_update_status_source() {
        let store = QuoteStore::new();
        store.store("usd", &price("bitcoin", 10)).await;
        store.store("usd", &price("solana", 150)).await;

        store
            .update_status_source(
                "usd",
                &ids(&["bitcoin", "cardano"]),
                StatusSource::Cached,
                |id| Some(Quote::empty(id.clone())),
            )
            .await;

        let all = store.get_all_sync_or_null("usd").unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].data().unwrap().source, StatusSource::Cached);
        assert_eq!(all[1], Quote::empty(RawCurrencyId::new("cardano")));
        assert_eq!(all[2].data().unwrap().source, StatusSource::Actual);
    }

    #[tokio::test]
    async fn test_get_all_before_first_write() {
        assert_eq!(QuoteStore::new().get_all_sync_or_null("usd"), None);
    }

    #[tokio::test]
    async fn test_fiat_currencies_are_kept_apart() {
        let store = QuoteStore::new();
        let bitcoin = RawCurrencyId::new("bitcoin");
        let mut usd_quotes = store.get("usd", &ids(&["bitcoin"]));

        store.store("usd", &price("bitcoin", 60_000)).await;
        store.store("EUR", &price("bitcoin", 50_000)).await;

        assert_eq!(
            store.get_sync("usd", &bitcoin).unwrap().fiat_rate(),
            Some(Decimal::new(60_000, 0))
        );
        assert_eq!(
            store.get_sync("eur", &bitcoin).unwrap().fiat_rate(),
            Some(Decimal::new(50_000, 0))
        );
        let snapshot = usd_quotes.next().await.unwrap();
        assert_eq!(snapshot[0].fiat_rate(), Some(Decimal::new(60_000, 0)));
        assert!(usd_quotes.next().now_or_never().is_none());

        assert_eq!(store.get_all_sync_or_null("usd").unwrap().len(), 1);
        assert_eq!(store.get_all_sync_or_null("gbp"), Some(Vec::new()));
    }
}
