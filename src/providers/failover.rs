use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::ProviderOrderingStore;
use crate::error::FetchError;
use crate::models::{NetworkId, ProviderModel};

/// Runs a remote call against the providers of a network in priority order.
///
/// Each attempt gets its own time budget. Transient failures and timeouts move on to
/// the next provider; any other outcome, including `NotFound` and malformed data, is
/// returned as-is.
#[derive(Clone)]
pub struct FailoverClient {
    ordering: Arc<ProviderOrderingStore>,
    attempt_timeout: Duration,
}

impl FailoverClient {
    pub fn new(ordering: Arc<ProviderOrderingStore>, attempt_timeout: Duration) -> Self {
        Self {
            ordering,
            attempt_timeout,
        }
    }

    pub async fn execute<T, F, Fut>(
        &self,
        network: &NetworkId,
        mut attempt: F,
    ) -> Result<T, FetchError>
    where
        F: FnMut(ProviderModel) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let ordering = self.ordering.get_config_sync()?;
        let providers = ordering
            .providers(network)
            .filter(|providers| !providers.is_empty())
            .ok_or_else(|| FetchError::NoProviders(network.clone()))?;

        let mut last = FetchError::NoProviders(network.clone());
        for (index, provider) in providers.iter().enumerate() {
            debug!(
                network = %network,
                url = %provider.url,
                attempt = index + 1,
                "trying provider"
            );
            let outcome =
                match tokio::time::timeout(self.attempt_timeout, attempt(provider.clone())).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(FetchError::Timeout(self.attempt_timeout)),
                };

            match outcome {
                Ok(value) => {
                    if index > 0 {
                        info!(network = %network, url = %provider.url, "failover succeeded");
                    }
                    return Ok(value);
                }
                Err(error) if error.is_retryable() => {
                    warn!(
                        network = %network,
                        url = %provider.url,
                        error = %error,
                        "provider failed, trying next"
                    );
                    last = error;
                }
                Err(error) => return Err(error),
            }
        }

        Err(FetchError::ProvidersExhausted {
            network: network.clone(),
            attempts: providers.len(),
            last: Box::new(last),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::InlineAsset;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client(timeout: Duration) -> FailoverClient {
        let asset = InlineAsset::new(
            "inline",
            r#"{"version": 1, "networks": {
                "ethereum": [
                    {"url": "https://second.example", "priority": 1, "type": "public"},
                    {"url": "https://first.example", "priority": 0, "type": "public"}
                ],
                "bitcoin": [
                    {"url": "https://only.example", "priority": 0, "type": "public"}
                ]
            }}"#,
        );
        FailoverClient::new(Arc::new(ProviderOrderingStore::new(asset)), timeout)
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_advances_to_next_provider() {
        let client = client(Duration::from_secs(2));
        let result = client
            .execute(&NetworkId::new("ethereum"), |provider| async move {
                if provider.url.contains("first") {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok(provider.url)
            })
            .await;
        assert_eq!(result.unwrap(), "https://second.example");
    }

    #[tokio::test]
    async fn test_data_error_is_not_retried() {
        let client = client(Duration::from_secs(2));
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = client
            .execute(&NetworkId::new("ethereum"), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::Data("unexpected field".into())) }
            })
            .await;
        assert_eq!(result, Err(FetchError::Data("unexpected field".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_reports_last_error() {
        let client = client(Duration::from_secs(2));
        let result: Result<(), _> = client
            .execute(&NetworkId::new("bitcoin"), |_| async {
                Err(FetchError::Transient("connection reset".into()))
            })
            .await;
        assert_eq!(
            result,
            Err(FetchError::ProvidersExhausted {
                network: NetworkId::new("bitcoin"),
                attempts: 1,
                last: Box::new(FetchError::Transient("connection reset".into())),
            })
        );
    }

    #[tokio::test]
    async fn test_unknown_network() {
        let client = client(Duration::from_secs(2));
        let result: Result<(), _> = client
            .execute(&NetworkId::new("dogecoin"), |_| async { Ok(()) })
            .await;
        assert_eq!(result, Err(FetchError::NoProviders(NetworkId::new("dogecoin"))));
    }
}
