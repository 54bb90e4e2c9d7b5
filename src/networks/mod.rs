//! Per-wallet network balances: storage, refresh and live producers.

mod fetcher;
mod producer;
mod source;
mod store;

pub use fetcher::{NetworkFetchParams, NetworkStatusFetcher};
pub use producer::{network_status_key, NetworkStatusProducer, NetworkStatusProducerFactory};
pub use source::AccountSource;
pub use store::NetworkStatusStore;
