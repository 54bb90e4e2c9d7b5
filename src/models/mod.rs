mod network;
mod network_status;
mod provider;
mod quote;
mod wallet;

use serde::{Deserialize, Serialize};

pub use network::{BlockchainFamily, Network, NetworkId};
pub use network_status::{Balances, NetworkStatus, NetworkStatusValue};
pub use provider::{ProviderModel, ProviderType};
pub use quote::{
    Quote, QuoteData, QuoteField, QuotePayload, QuoteValue, QuotesResponse, RawCurrencyId,
};
pub use wallet::{WalletId, WalletIdError};

/// Whether a value came from the latest remote fetch or is being served from cache
/// while a refresh is pending or after one failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    Actual,
    Cached,
}
