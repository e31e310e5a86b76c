use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;

use chainweb3_core::{SignerError, TypedData};

use crate::transaction::UnsignedTransaction;

/// External signing capability.
///
/// Key material never enters this library: a `Signer` may be a hardware
/// wallet, a remote KMS or an in-process keystore. Every operation receives
/// the resolved network id so signers can scope accounts and domains to it.
#[async_trait]
pub trait Signer: Send + Sync + 'static {
    /// Accounts this signer can sign for.
    async fn accounts(&self, network_id: u64) -> Result<Vec<Address>, SignerError>;

    /// Sign opaque bytes (`eth_sign` / `personal_sign`).
    async fn sign_data(
        &self,
        account: Address,
        data: Bytes,
        network_id: u64,
    ) -> Result<Bytes, SignerError>;

    /// Sign EIP-712 structured data.
    async fn sign_typed_data(
        &self,
        account: Address,
        typed_data: TypedData,
        network_id: u64,
    ) -> Result<Bytes, SignerError>;

    /// Sign a fully populated transaction, returning `r ‖ s ‖ recovery`.
    ///
    /// `recovery` may be the raw parity (`0`/`1`) or `27`/`28`; with a
    /// non-zero `chain_id` both are folded into the same EIP-155 `v`. With
    /// chain id `0` the byte becomes `v` as is, so return `27`/`28` there.
    async fn sign_transaction(
        &self,
        tx: &UnsignedTransaction,
        network_id: u64,
        chain_id: u64,
    ) -> Result<Bytes, SignerError>;
}
