use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::StatusSource;

/// Network-independent identifier of a priceable asset ("bitcoin", "usd-coin").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawCurrencyId(String);

impl RawCurrencyId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RawCurrencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RawCurrencyId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Price fields that can be requested from the quote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteField {
    Price,
    PriceChange24h,
    PriceChange1w,
    PriceChange30d,
}

impl QuoteField {
    pub const ALL: [QuoteField; 4] = [
        QuoteField::Price,
        QuoteField::PriceChange24h,
        QuoteField::PriceChange1w,
        QuoteField::PriceChange30d,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteField::Price => "price",
            QuoteField::PriceChange24h => "price_change_24h",
            QuoteField::PriceChange1w => "price_change_1w",
            QuoteField::PriceChange30d => "price_change_30d",
        }
    }
}

/// One currency's entry in a quote API response. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_change_24h: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_change_1w: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_change_30d: Option<Decimal>,
}

/// A batch of quotes. Ids that were requested but are missing are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotesResponse {
    pub quotes: BTreeMap<RawCurrencyId, QuotePayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteData {
    pub fiat_rate: Option<Decimal>,
    pub price_change_24h: Option<Decimal>,
    pub price_change_1w: Option<Decimal>,
    pub price_change_30d: Option<Decimal>,
    pub source: StatusSource,
}

impl QuoteData {
    /// Fields present in `payload` win; fields it omits keep their previous value.
    pub fn merged_with(&self, payload: &QuotePayload) -> Self {
        Self {
            fiat_rate: payload.price.or(self.fiat_rate),
            price_change_24h: payload.price_change_24h.or(self.price_change_24h),
            price_change_1w: payload.price_change_1w.or(self.price_change_1w),
            price_change_30d: payload.price_change_30d.or(self.price_change_30d),
            source: StatusSource::Actual,
        }
    }
}

impl From<&QuotePayload> for QuoteData {
    fn from(payload: &QuotePayload) -> Self {
        Self {
            fiat_rate: payload.price,
            price_change_24h: payload.price_change_24h,
            price_change_1w: payload.price_change_1w,
            price_change_30d: payload.price_change_30d,
            source: StatusSource::Actual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QuoteValue {
    /// The currency is tracked but no price has been received yet.
    Empty,
    Data(QuoteData),
}

/// Last known price information for one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub currency_id: RawCurrencyId,
    pub value: QuoteValue,
}

impl Quote {
    pub fn empty(currency_id: RawCurrencyId) -> Self {
        Self {
            currency_id,
            value: QuoteValue::Empty,
        }
    }

    pub fn from_payload(currency_id: RawCurrencyId, payload: &QuotePayload) -> Self {
        Self {
            currency_id,
            value: QuoteValue::Data(payload.into()),
        }
    }

    /// Apply a fresh response entry on top of this quote without dropping known fields.
    pub fn merge(&self, payload: &QuotePayload) -> Self {
        let data = match &self.value {
            QuoteValue::Empty => payload.into(),
            QuoteValue::Data(data) => data.merged_with(payload),
        };
        Self {
            currency_id: self.currency_id.clone(),
            value: QuoteValue::Data(data),
        }
    }

    pub fn data(&self) -> Option<&QuoteData> {
        match &self.value {
            QuoteValue::Data(data) => Some(data),
            QuoteValue::Empty => None,
        }
    }

    pub fn fiat_rate(&self) -> Option<Decimal> {
        self.data().and_then(|d| d.fiat_rate)
    }

    /// Re-mark the source of a quote with data. Empty quotes are returned unchanged.
    pub fn with_source(mut self, source: StatusSource) -> Self {
        if let QuoteValue::Data(data) = &mut self.value {
            data.source = source;
        }
        self
    }
}
