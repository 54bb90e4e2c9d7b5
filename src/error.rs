//! Error types shared by stores, fetchers and suppliers.

use std::time::Duration;

use crate::flow::CacheKey;
use crate::models::NetworkId;

/// Failure of a remote fetch or of the logic around it.
///
/// Errors are `Clone` because a single producer failure is fanned out to every
/// subscriber attached to the shared stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Connection reset, refused, 5xx and similar. Retried on the next provider.
    #[error("transient network error: {0}")]
    Transient(String),

    /// A single provider attempt exceeded its time budget.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The response was received but could not be interpreted. Never retried.
    #[error("malformed response: {0}")]
    Data(String),

    /// The remote side has no record of the requested entity.
    #[error("not found")]
    NotFound,

    #[error("no providers configured for network {0}")]
    NoProviders(NetworkId),

    #[error("all {attempts} providers failed for network {network}: {last}")]
    ProvidersExhausted {
        network: NetworkId,
        attempts: usize,
        last: Box<FetchError>,
    },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{} of {total} networks failed to refresh", failed.len())]
    NetworksFailed { failed: Vec<NetworkId>, total: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl FetchError {
    /// Whether the failover client should move on to the next provider.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }
}

/// Provider asset and configuration problems. Loading fails fast on these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {source_name}: {message}")]
    Read { source_name: String, message: String },

    #[error("failed to parse {source_name}: {message}")]
    Parse { source_name: String, message: String },

    #[error("invalid provider config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SupplierError {
    #[error("failed to create producer for key {key}: {source}")]
    ProducerCreation {
        key: CacheKey,
        #[source]
        source: FetchError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_failures_are_retryable() {
        assert!(FetchError::Transient("reset".into()).is_retryable());
        assert!(FetchError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!FetchError::Data("bad json".into()).is_retryable());
        assert!(!FetchError::NotFound.is_retryable());
        assert!(!FetchError::NoProviders(NetworkId::new("ethereum")).is_retryable());
    }

    #[test]
    fn networks_failed_message_counts_failures() {
        let err = FetchError::NetworksFailed {
            failed: vec![NetworkId::new("ethereum")],
            total: 3,
        };
        assert_eq!(err.to_string(), "1 of 3 networks failed to refresh");
    }
}
