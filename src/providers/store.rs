use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Deserialize;
use tracing::{debug, info};

use super::asset::ProviderAsset;
use crate::error::ConfigError;
use crate::models::{NetworkId, ProviderModel};

/// Document version this build understands.
pub const SUPPORTED_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProviderDocument {
    version: u32,
    networks: BTreeMap<NetworkId, Vec<ProviderModel>>,
}

/// Immutable provider snapshot. Each list is sorted by ascending priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderOrdering {
    networks: BTreeMap<NetworkId, Vec<ProviderModel>>,
}

impl ProviderOrdering {
    /// Parse and validate a provider document.
    pub fn parse(source_name: &str, content: &str) -> Result<Self, ConfigError> {
        let document: ProviderDocument =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;

        if document.version != SUPPORTED_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported version {} (expected {SUPPORTED_VERSION})",
                document.version
            )));
        }

        let mut networks = BTreeMap::new();
        for (network, mut providers) in document.networks {
            validate_providers(&network, &providers)?;
            // Stable sort keeps document order between equal priorities.
            providers.sort_by_key(|p| p.priority);
            networks.insert(network, providers);
        }

        Ok(Self { networks })
    }

    pub fn providers(&self, network: &NetworkId) -> Option<&[ProviderModel]> {
        self.networks.get(network).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NetworkId, &[ProviderModel])> {
        self.networks.iter().map(|(id, list)| (id, list.as_slice()))
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    pub fn provider_count(&self) -> usize {
        self.networks.values().map(Vec::len).sum()
    }
}

fn validate_providers(
    network: &NetworkId,
    providers: &[ProviderModel],
) -> Result<(), ConfigError> {
    if network.as_str().trim().is_empty() {
        return Err(ConfigError::Invalid("empty network id".to_string()));
    }
    if providers.is_empty() {
        return Err(ConfigError::Invalid(format!("network {network} has no providers")));
    }

    let mut seen = HashSet::new();
    for provider in providers {
        if !provider.has_supported_scheme() {
            return Err(ConfigError::Invalid(format!(
                "network {network}: unsupported provider url '{}'",
                provider.url
            )));
        }
        if !seen.insert(provider.url.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "network {network}: duplicate provider url '{}'",
                provider.url
            )));
        }
    }
    Ok(())
}

/// Lazily loaded, process-lifetime cache of the provider ordering.
///
/// The asset is read on first demand only. Every later call hands out the same
/// [`Arc`] until [`invalidate`](Self::invalidate) or [`refresh`](Self::refresh)
/// swaps in a new snapshot; existing snapshots are never mutated.
pub struct ProviderOrderingStore {
    asset: Box<dyn ProviderAsset>,
    snapshot: RwLock<Option<Arc<ProviderOrdering>>>,
}

impl ProviderOrderingStore {
    pub fn new(asset: impl ProviderAsset + 'static) -> Self {
        Self {
            asset: Box::new(asset),
            snapshot: RwLock::new(None),
        }
    }

    pub fn get_config_sync(&self) -> Result<Arc<ProviderOrdering>, ConfigError> {
        if let Some(snapshot) = self.read().as_ref() {
            return Ok(snapshot.clone());
        }

        let mut slot = self.write();
        // Another caller may have loaded while we waited for the write lock.
        if let Some(snapshot) = slot.as_ref() {
            return Ok(snapshot.clone());
        }
        let snapshot = Arc::new(self.load()?);
        *slot = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Ordered providers for one network, empty if the network is not configured.
    pub fn providers(&self, network: &NetworkId) -> Result<Vec<ProviderModel>, ConfigError> {
        Ok(self
            .get_config_sync()?
            .providers(network)
            .map(<[ProviderModel]>::to_vec)
            .unwrap_or_default())
    }

    /// Drop the cached snapshot; the next read reloads the asset.
    pub fn invalidate(&self) {
        *self.write() = None;
        debug!(asset = %self.asset.name(), "provider ordering invalidated");
    }

    /// Reload the asset now. On failure the previous snapshot stays in place.
    pub fn refresh(&self) -> Result<Arc<ProviderOrdering>, ConfigError> {
        let snapshot = Arc::new(self.load()?);
        *self.write() = Some(snapshot.clone());
        Ok(snapshot)
    }

    fn load(&self) -> Result<ProviderOrdering, ConfigError> {
        let name = self.asset.name();
        let content = self.asset.read()?;
        let ordering = ProviderOrdering::parse(&name, &content)?;
        info!(
            asset = %name,
            networks = ordering.network_count(),
            providers = ordering.provider_count(),
            "loaded provider ordering"
        );
        Ok(ordering)
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Arc<ProviderOrdering>>> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Arc<ProviderOrdering>>> {
        self.snapshot.write().unwrap_or_else(PoisonError::into_inner)
    }
}
