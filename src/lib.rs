//! Reactive balance and quote feed for a multi-asset wallet.
//!
//! Stores hold the latest known network statuses and quotes, fetchers refresh them
//! through an ordered list of RPC providers, and [`flow::CachingSupplier`] shares one
//! live producer per parameter set between all subscribers.

pub mod clock;
pub mod config;
pub mod context;
pub mod duration;
pub mod error;
pub mod flow;
pub mod models;
pub mod networks;
pub mod providers;
pub mod quotes;
pub mod storage;

pub use context::FeedContext;
pub use error::{ConfigError, FetchError, SupplierError};
