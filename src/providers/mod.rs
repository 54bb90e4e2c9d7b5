//! RPC provider ordering and failover between providers.

mod asset;
mod failover;
mod store;

pub use asset::{configured_asset, FileAsset, InlineAsset, PackagedAsset, ProviderAsset};
pub use failover::FailoverClient;
pub use store::{ProviderOrdering, ProviderOrderingStore, SUPPORTED_VERSION};
