use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::{Balances, Network, ProviderModel};

/// Blockchain client used to read balances. One call talks to exactly one provider;
/// failover across providers happens around it.
///
/// Implementations should map connection problems to [`FetchError::Transient`], an
/// unknown account to [`FetchError::NotFound`] and undecodable replies to
/// [`FetchError::Data`].
#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn fetch_balances(
        &self,
        provider: &ProviderModel,
        network: &Network,
        public_key: &str,
    ) -> Result<Balances, FetchError>;
}
