use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::{QuoteField, QuotesResponse, RawCurrencyId};

/// Price API client.
///
/// A response may leave out requested ids; that is not an error for the ids it has.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quotes(
        &self,
        fiat_currency: &str,
        currency_ids: &BTreeSet<RawCurrencyId>,
        fields: &BTreeSet<QuoteField>,
    ) -> Result<QuotesResponse, FetchError>;
}
