/// Configuration for the signing middleware.
#[derive(Debug, Clone, Default)]
pub struct SigningConfig {
    /// Chain id for EIP-155. Defaults to the network id reported by `net_version`.
    pub chain_id: Option<u64>,
}

impl SigningConfig {
    pub fn with_chain_id(chain_id: u64) -> Self {
        Self { chain_id: Some(chain_id) }
    }
}
