use serde::{Deserialize, Serialize};

/// Who operates an RPC endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// Community or vendor endpoint reachable without credentials.
    Public,
    /// Endpoint run by the wallet operator; may need an API key appended by the client.
    Private,
}

/// One RPC endpoint candidate for a network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderModel {
    pub url: String,

    /// Position in the failover order (lower = tried first).
    pub priority: u32,

    #[serde(rename = "type")]
    pub provider_type: ProviderType,
}

impl ProviderModel {
    pub fn new(url: impl Into<String>, priority: u32, provider_type: ProviderType) -> Self {
        Self {
            url: url.into(),
            priority,
            provider_type,
        }
    }

    /// Schemes a network client can speak to.
    pub fn has_supported_scheme(&self) -> bool {
        ["http://", "https://", "ws://", "wss://"]
            .iter()
            .any(|scheme| self.url.starts_with(scheme) && self.url.len() > scheme.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_serialization() {
        let provider = ProviderModel::new("https://rpc.example.org", 0, ProviderType::Public);
        let json = serde_json::to_string(&provider).unwrap();
        assert_eq!(
            json,
            r#"{"url":"https://rpc.example.org","priority":0,"type":"public"}"#
        );
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: Result<ProviderModel, _> = serde_json::from_str(
            r#"{"url":"https://a","priority":0,"type":"public","weight":3}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_scheme_check() {
        assert!(ProviderModel::new("wss://node", 0, ProviderType::Private).has_supported_scheme());
        assert!(!ProviderModel::new("ftp://node", 0, ProviderType::Public).has_supported_scheme());
        assert!(!ProviderModel::new("https://", 0, ProviderType::Public).has_supported_scheme());
    }
}
