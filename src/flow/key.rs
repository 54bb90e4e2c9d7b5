use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier derived from producer parameters.
///
/// Equal parameters must always map to the same key: the key is both the registry slot
/// of a shared producer and the lookup key in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Namespace for hashed keys, so they never collide with other v5 ids.
    const NAMESPACE: Uuid = Uuid::from_u128(0x4f1c_9a2e_7d3b_5e60_8a41_c2d7_3b9e_0f15);

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Hash an ordered list of parts into a fixed-size key. Callers must pass parts in a
    /// canonical order (e.g. sorted network ids) for equal parameters to collide.
    pub fn derive<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut material = Vec::new();
        for part in parts {
            material.extend_from_slice(part.as_ref().as_bytes());
            // Unit separator keeps ["ab", "c"] and ["a", "bc"] apart.
            material.push(0x1f);
        }
        Self(Uuid::new_v5(&Self::NAMESPACE, &material).simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        assert_eq!(
            CacheKey::derive(["wallet-1", "ethereum", "polygon"]),
            CacheKey::derive(vec!["wallet-1".to_string(), "ethereum".into(), "polygon".into()])
        );
    }

    #[test]
    fn derive_respects_part_boundaries() {
        assert_ne!(CacheKey::derive(["ab", "c"]), CacheKey::derive(["a", "bc"]));
        assert_ne!(CacheKey::derive(["a"]), CacheKey::derive(["a", ""]));
    }
}
