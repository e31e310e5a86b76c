//! Transaction shapes on either side of the signer.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use chainweb3_core::{TransactionRequest, ValidationError};

/// Length of a recoverable secp256k1 signature: `r ‖ s ‖ recovery`.
pub const SIGNATURE_LEN: usize = 65;

/// A 65-byte signature as returned by a [`Signer`](crate::Signer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSignature([u8; SIGNATURE_LEN]);

impl RawSignature {
    pub fn r(&self) -> U256 {
        U256::from_be_slice(&self.0[..32])
    }

    pub fn s(&self) -> U256 {
        U256::from_be_slice(&self.0[32..64])
    }

    /// The trailing recovery byte, as produced by the signer (0/1 or 27/28).
    /// [`eip155_v`] treats both forms alike for a non-zero chain id.
    pub fn recovery(&self) -> u8 {
        self.0[64]
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }
}

impl TryFrom<&[u8]> for RawSignature {
    type Error = ValidationError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; SIGNATURE_LEN]>::try_from(bytes)
            .map(Self)
            .map_err(|_| ValidationError::MalformedSignature { len: bytes.len() })
    }
}

/// A transaction with every field resolved, ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    pub from: Address,
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
}

impl TryFrom<TransactionRequest> for UnsignedTransaction {
    type Error = ValidationError;

    /// `value` defaults to zero and `data` to empty; everything else must
    /// already be filled in.
    fn try_from(tx: TransactionRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            from: tx.from.ok_or(ValidationError::MissingField("from"))?,
            nonce: tx.nonce.ok_or(ValidationError::MissingField("nonce"))?,
            gas_price: tx.gas_price.ok_or(ValidationError::MissingField("gasPrice"))?,
            gas_limit: tx.gas.ok_or(ValidationError::MissingField("gas"))?,
            to: tx.to,
            value: tx.value.unwrap_or_default(),
            data: tx.data.unwrap_or_default(),
        })
    }
}

/// A signed legacy transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub v: U256,
    pub r: U256,
    pub s: U256,
    /// `0` for a pre-EIP-155 transaction.
    pub chain_id: u64,
}

impl SignedTransaction {
    /// Attach `signature` to `tx`, folding `chain_id` into `v`.
    pub fn new(tx: &UnsignedTransaction, signature: &RawSignature, chain_id: u64) -> Self {
        Self {
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            to: tx.to,
            value: tx.value,
            data: tx.data.clone(),
            v: eip155_v(signature.recovery(), chain_id),
            r: signature.r(),
            s: signature.s(),
            chain_id,
        }
    }
}

/// `v` for recovery byte `recovery` under EIP-155.
///
/// Chain id `0` leaves the recovery byte untouched. Otherwise a raw parity
/// (`0`/`1`) is lifted to `27`/`28` first, so `v` is always `35`/`36` plus
/// twice the chain id.
pub fn eip155_v(recovery: u8, chain_id: u64) -> U256 {
    if chain_id == 0 {
        return U256::from(recovery);
    }
    let recovery = if recovery < 27 { recovery.saturating_add(27) } else { recovery };
    U256::from(recovery) + U256::from(chain_id) * U256::from(2) + U256::from(8)
}

/// Inverse of [`eip155_v`] for a signer reporting 27/28; `0` below 37.
pub fn chain_id_from_v(v: U256) -> U256 {
    if v < U256::from(37) {
        return U256::ZERO;
    }
    let base = if v.bit(0) { 35 } else { 36 };
    (v - U256::from(base)) / U256::from(2)
}
