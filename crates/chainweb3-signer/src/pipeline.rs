//! Build steps of the transaction pipeline.
//!
//! Each step takes the request by value and hands back a filled-in copy, so
//! a failed step leaves nothing half-applied.

use alloy_primitives::U256;
use tracing::trace;

use chainweb3_core::{
    BlockTag, CallRequest, ProviderError, RpcClient, TransactionRequest, ValidationError,
};

use crate::network::NetworkIdentity;
use crate::signer::Signer;
use crate::transaction::{RawSignature, SignedTransaction, UnsignedTransaction};

/// Gas estimates are scaled by `GAS_MARGIN_NUM / GAS_MARGIN_DEN` (1.3x).
pub const GAS_MARGIN_NUM: u64 = 13;
pub const GAS_MARGIN_DEN: u64 = 10;

pub fn apply_gas_margin(estimate: U256) -> U256 {
    estimate.saturating_mul(U256::from(GAS_MARGIN_NUM)) / U256::from(GAS_MARGIN_DEN)
}

/// Fill a missing nonce with the sender's pending transaction count.
pub async fn fill_nonce(
    client: &RpcClient,
    tx: TransactionRequest,
) -> Result<TransactionRequest, ProviderError> {
    if tx.nonce.is_some() {
        return Ok(tx);
    }
    let from = tx.from.ok_or(ValidationError::MissingField("from"))?;
    let nonce = client.transaction_count(from, BlockTag::Pending).await?;
    trace!(%from, %nonce, "filled nonce");
    Ok(tx.with_nonce(nonce))
}

/// Fill a missing gas limit from an estimate, then a missing gas price.
///
/// A caller-supplied limit is kept as is.
pub async fn fill_gas(
    client: &RpcClient,
    tx: TransactionRequest,
) -> Result<TransactionRequest, ProviderError> {
    if tx.gas.is_some() && tx.gas_price.is_some() {
        return Ok(tx);
    }
    let tx = match tx.gas {
        Some(_) => tx,
        None => {
            let estimate = client.estimate_gas(call_request(&tx)?).await?;
            let gas = apply_gas_margin(estimate);
            trace!(%estimate, %gas, "filled gas limit");
            tx.with_gas(gas)
        }
    };
    if tx.gas_price.is_some() {
        return Ok(tx);
    }
    let price = client.gas_price().await?;
    trace!(%price, "filled gas price");
    Ok(tx.with_gas_price(price))
}

/// The `eth_estimateGas` shape of `tx`; estimation needs a recipient.
fn call_request(tx: &TransactionRequest) -> Result<CallRequest, ValidationError> {
    Ok(CallRequest {
        from: tx.from,
        to: tx.to.ok_or(ValidationError::MissingField("to"))?,
        gas: None,
        gas_price: tx.gas_price,
        value: tx.value,
        data: tx.data.clone(),
    })
}

/// Have `signer` sign `tx` and assemble the EIP-155 signed transaction.
pub async fn sign(
    signer: &dyn Signer,
    tx: &UnsignedTransaction,
    identity: NetworkIdentity,
) -> Result<SignedTransaction, ProviderError> {
    let raw = signer.sign_transaction(tx, identity.network_id, identity.chain_id).await?;
    let signature = RawSignature::try_from(raw.as_ref())?;
    Ok(SignedTransaction::new(tx, &signature, identity.chain_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use chainweb3_core::mock::MockProvider;
    use chainweb3_core::RequestIdCounter;
    use serde_json::json;
    use std::sync::Arc;

    fn client(mock: &Arc<MockProvider>) -> RpcClient {
        RpcClient::new(mock.clone(), Arc::new(RequestIdCounter::new()))
    }

    fn request() -> TransactionRequest {
        TransactionRequest {
            from: Some(Address::repeat_byte(0xaa)),
            to: Some(Address::repeat_byte(0xbb)),
            ..Default::default()
        }
    }

    #[test]
    fn margin_is_integer_thirteen_tenths() {
        assert_eq!(apply_gas_margin(U256::from(21_000)), U256::from(27_300));
        assert_eq!(apply_gas_margin(U256::from(7)), U256::from(9));
        assert_eq!(apply_gas_margin(U256::ZERO), U256::ZERO);
    }

    #[tokio::test]
    async fn nonce_is_fetched_for_pending_block() {
        let mock = Arc::new(MockProvider::new());
        mock.push_result("eth_getTransactionCount", json!("0x7"));
        let tx = fill_nonce(&client(&mock), request()).await.unwrap();
        assert_eq!(tx.nonce, Some(U256::from(7)));
        assert_eq!(mock.calls()[0].params[1], json!("pending"));

        let again = fill_nonce(&client(&mock), tx).await.unwrap();
        assert_eq!(again.nonce, Some(U256::from(7)));
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn estimate_gets_margin_then_price_is_fetched() {
        let mock = Arc::new(MockProvider::new());
        mock.push_result("eth_estimateGas", json!("0x5208"));
        mock.push_result("eth_gasPrice", json!("0x3b9aca00"));
        let tx = fill_gas(&client(&mock), request()).await.unwrap();

        assert_eq!(tx.gas, Some(U256::from(27_300)));
        assert_eq!(tx.gas_price, Some(U256::from(1_000_000_000u64)));
        assert_eq!(mock.methods(), vec!["eth_estimateGas", "eth_gasPrice"]);
    }

    #[tokio::test]
    async fn given_gas_limit_skips_estimation() {
        let mock = Arc::new(MockProvider::new());
        mock.push_result("eth_gasPrice", json!("0x1"));
        let tx = fill_gas(&client(&mock), request().with_gas(U256::from(50_000))).await.unwrap();

        assert_eq!(tx.gas, Some(U256::from(50_000)));
        assert_eq!(mock.methods(), vec!["eth_gasPrice"]);
    }

    #[tokio::test]
    async fn fully_priced_request_makes_no_calls() {
        let mock = Arc::new(MockProvider::new());
        let tx = request().with_gas(U256::from(1)).with_gas_price(U256::from(1));
        let filled = fill_gas(&client(&mock), tx.clone()).await.unwrap();
        assert_eq!(filled, tx);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn estimation_without_recipient_fails_before_io() {
        let mock = Arc::new(MockProvider::new());
        let tx = TransactionRequest { to: None, ..request() };
        let err = fill_gas(&client(&mock), tx).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(ValidationError::MissingField("to"))));
        assert!(mock.calls().is_empty());
    }
}
