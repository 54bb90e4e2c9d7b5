use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Network, StatusSource};

/// Amounts held on one network, keyed by asset id (native coin or token contract).
pub type Balances = BTreeMap<String, Decimal>;

/// Current knowledge about one (wallet, network) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub network: Network,
    pub value: NetworkStatusValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NetworkStatusValue {
    /// First fetch is in flight and nothing is known yet.
    Loading,
    Loaded {
        balances: Balances,
        source: StatusSource,
        updated_at: DateTime<Utc>,
    },
    /// The last refresh failed. Balances from the last success are kept, if any.
    Unreachable {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_known: Option<Balances>,
    },
}

impl NetworkStatus {
    pub fn loading(network: Network) -> Self {
        Self {
            network,
            value: NetworkStatusValue::Loading,
        }
    }

    pub fn loaded(network: Network, balances: Balances, updated_at: DateTime<Utc>) -> Self {
        Self {
            network,
            value: NetworkStatusValue::Loaded {
                balances,
                source: StatusSource::Actual,
                updated_at,
            },
        }
    }

    /// Status after a failed refresh, keeping whatever balances `previous` knew about.
    pub fn unreachable(
        network: Network,
        error: impl Into<String>,
        previous: Option<&NetworkStatus>,
    ) -> Self {
        Self {
            network,
            value: NetworkStatusValue::Unreachable {
                error: error.into(),
                last_known: previous.and_then(|p| p.balances()).cloned(),
            },
        }
    }

    /// Last successfully fetched balances, whether current or stale.
    pub fn balances(&self) -> Option<&Balances> {
        match &self.value {
            NetworkStatusValue::Loaded { balances, .. } => Some(balances),
            NetworkStatusValue::Unreachable { last_known, .. } => last_known.as_ref(),
            NetworkStatusValue::Loading => None,
        }
    }

    pub fn source(&self) -> Option<StatusSource> {
        match &self.value {
            NetworkStatusValue::Loaded { source, .. } => Some(*source),
            NetworkStatusValue::Loading | NetworkStatusValue::Unreachable { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.value, NetworkStatusValue::Unreachable { .. })
    }

    /// Re-mark a loaded status. Loading and unreachable statuses have no source and are
    /// returned unchanged.
    pub fn with_source(mut self, new_source: StatusSource) -> Self {
        if let NetworkStatusValue::Loaded { source, .. } = &mut self.value {
            *source = new_source;
        }
        self
    }
}
