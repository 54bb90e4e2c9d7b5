//! Price quotes: cache, fetcher and live producers.

mod fetcher;
mod producer;
mod source;
mod store;

pub use fetcher::{QuoteFetchParams, QuotesFetcher};
pub use producer::{quote_key, QuoteProducer, QuoteProducerFactory};
pub use source::QuoteSource;
pub use store::QuoteStore;
