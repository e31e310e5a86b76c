//! Lazily resolved network and chain id.

use tokio::sync::OnceCell;
use tracing::debug;

use chainweb3_core::{ProviderError, RpcClient, ValidationError};

/// The `(networkId, chainId)` pair a signing middleware works against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkIdentity {
    pub network_id: u64,
    pub chain_id: u64,
}

/// Parse a `net_version` result, which nodes report as a base-10 string.
pub fn parse_network_version(version: &str) -> Result<u64, ValidationError> {
    version
        .parse::<u64>()
        .map_err(|_| ValidationError::NonIntegerNetworkVersion(version.to_string()))
}

/// Resolves the identity once per middleware and caches it.
#[derive(Debug)]
pub(crate) struct NetworkResolver {
    chain_id: Option<u64>,
    cell: OnceCell<NetworkIdentity>,
}

impl NetworkResolver {
    pub(crate) fn new(chain_id: Option<u64>) -> Self {
        Self { chain_id, cell: OnceCell::new() }
    }

    pub(crate) async fn resolve(&self, client: &RpcClient) -> Result<NetworkIdentity, ProviderError> {
        self.cell
            .get_or_try_init(|| async {
                let network_id = parse_network_version(&client.net_version().await?)?;
                let identity = NetworkIdentity {
                    network_id,
                    chain_id: self.chain_id.unwrap_or(network_id),
                };
                debug!(network_id, chain_id = identity.chain_id, "resolved network identity");
                Ok::<_, ProviderError>(identity)
            })
            .await
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainweb3_core::mock::MockProvider;
    use chainweb3_core::RequestIdCounter;
    use serde_json::json;
    use std::sync::Arc;

    fn client(mock: &Arc<MockProvider>) -> RpcClient {
        RpcClient::new(mock.clone(), Arc::new(RequestIdCounter::new()))
    }

    #[test]
    fn network_version_must_be_decimal() {
        assert_eq!(parse_network_version("1"), Ok(1));
        assert_eq!(parse_network_version("11155111"), Ok(11_155_111));
        for bad in ["0x1", "", "one", "1.0", "-1"] {
            assert_eq!(
                parse_network_version(bad),
                Err(ValidationError::NonIntegerNetworkVersion(bad.to_string()))
            );
        }
    }

    #[tokio::test]
    async fn resolved_once_and_cached() {
        let mock = Arc::new(MockProvider::new());
        mock.set_result("net_version", json!("3"));
        let resolver = NetworkResolver::new(None);
        let client = client(&mock);

        let first = resolver.resolve(&client).await.unwrap();
        let second = resolver.resolve(&client).await.unwrap();
        assert_eq!(first, NetworkIdentity { network_id: 3, chain_id: 3 });
        assert_eq!(first, second);
        assert_eq!(mock.count("net_version"), 1);
    }

    #[tokio::test]
    async fn configured_chain_id_wins() {
        let mock = Arc::new(MockProvider::new());
        mock.set_result("net_version", json!("1"));
        let identity = NetworkResolver::new(Some(5)).resolve(&client(&mock)).await.unwrap();
        assert_eq!(identity, NetworkIdentity { network_id: 1, chain_id: 5 });
    }

    #[tokio::test]
    async fn failure_is_not_cached() {
        let mock = Arc::new(MockProvider::new());
        mock.push_result("net_version", json!("0x1"));
        mock.push_result("net_version", json!("1"));
        let resolver = NetworkResolver::new(None);
        let client = client(&mock);

        let err = resolver.resolve(&client).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(resolver.resolve(&client).await.unwrap().network_id, 1);
    }
}
