use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Identifier of a blockchain network as used in the provider asset ("ethereum", "polygon").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(String);

impl NetworkId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for NetworkId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockchainFamily {
    Bitcoin,
    Evm,
    Solana,
    Cardano,
    Other,
}

/// One blockchain instance a wallet can hold assets on.
///
/// Two networks are the same network when their id and derivation path match; the
/// family is descriptive and follows from the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub id: NetworkId,
    pub family: BlockchainFamily,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_path: Option<String>,
}

impl Network {
    pub fn new(id: impl Into<String>, family: BlockchainFamily) -> Self {
        Self {
            id: NetworkId::new(id),
            family,
            derivation_path: None,
        }
    }

    pub fn with_derivation(mut self, path: impl Into<String>) -> Self {
        self.derivation_path = Some(path.into());
        self
    }

    fn identity(&self) -> (&NetworkId, Option<&str>) {
        (&self.id, self.derivation_path.as_deref())
    }
}

impl PartialEq for Network {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Network {}

impl Hash for Network {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for Network {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Network {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.derivation_path {
            Some(path) => write!(f, "{}@{}", self.id, path),
            None => self.id.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equality_ignores_family() {
        let a = Network::new("ethereum", BlockchainFamily::Evm);
        let b = Network::new("ethereum", BlockchainFamily::Other);
        assert_eq!(a, b);

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn derivation_distinguishes_networks() {
        let plain = Network::new("bitcoin", BlockchainFamily::Bitcoin);
        let derived = plain.clone().with_derivation("m/84'/0'/0'");
        assert_ne!(plain, derived);
        assert!(plain < derived);
        assert_eq!(derived.to_string(), "bitcoin@m/84'/0'/0'");
    }
}
