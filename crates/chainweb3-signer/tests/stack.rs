//! Signing middleware over filter middleware over a scripted node.

use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde_json::{json, Value};

use chainweb3_core::mock::MockProvider;
use chainweb3_core::{
    JsonRpcRequest, Provider, ProviderError, RequestIdCounter, SignerError, TypedData,
    ValidationError,
};
use chainweb3_filters::{FilterEngineConfig, FilterMiddleware};
use chainweb3_signer::{
    Signer, SignedTransaction, SigningConfig, SigningMiddleware, UnsignedTransaction,
};

const FROM: Address = Address::repeat_byte(0xaa);
const TO: Address = Address::repeat_byte(0xbb);

/// Returns a fixed signature with recovery byte 28 and records every call.
#[derive(Default)]
struct FixedSigner {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl Signer for FixedSigner {
    async fn accounts(&self, _network_id: u64) -> Result<Vec<Address>, SignerError> {
        Ok(vec![FROM])
    }

    async fn sign_data(&self, _: Address, _: Bytes, _: u64) -> Result<Bytes, SignerError> {
        self.calls.lock().unwrap().push("sign_data".into());
        Ok(Bytes::from_static(&[0x01]))
    }

    async fn sign_typed_data(
        &self,
        account: Address,
        typed_data: TypedData,
        network_id: u64,
    ) -> Result<Bytes, SignerError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("sign_typed_data account={account} data={} net={network_id}", typed_data.0));
        Ok(Bytes::from_static(&[0x02]))
    }

    async fn sign_transaction(
        &self,
        tx: &UnsignedTransaction,
        network_id: u64,
        chain_id: u64,
    ) -> Result<Bytes, SignerError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("sign_transaction nonce={} net={network_id} chain={chain_id}", tx.nonce));
        let mut sig = [0x11u8; 65];
        sig[64] = 28;
        Ok(Bytes::copy_from_slice(&sig))
    }
}

struct Stack {
    node: Arc<MockProvider>,
    signer: Arc<FixedSigner>,
    top: SigningMiddleware,
}

fn stack(config: SigningConfig) -> Stack {
    let node = Arc::new(MockProvider::new());
    let signer = Arc::new(FixedSigner::default());
    let ids = Arc::new(RequestIdCounter::new());
    let filters = Arc::new(FilterMiddleware::new(
        node.clone(),
        ids.clone(),
        FilterEngineConfig::default(),
    ));
    let top = SigningMiddleware::new(filters, signer.clone(), ids, config);
    Stack { node, signer, top }
}

async fn call(stack: &Stack, method: &str, params: Vec<Value>) -> Result<Value, ProviderError> {
    let resp = stack.top.send(JsonRpcRequest::new(1_000, method, params)).await?;
    Ok(resp.into_result()?.unwrap_or(Value::Null))
}

#[tokio::test]
async fn send_transaction_runs_pipeline_in_order() {
    let s = stack(SigningConfig::default());
    s.node
        .push_result("eth_getTransactionCount", json!("0x4"))
        .push_result("eth_estimateGas", json!("0x5208"))
        .push_result("eth_gasPrice", json!("0x2"))
        .push_result("net_version", json!("1"))
        .push_result("eth_sendRawTransaction", json!(B256::repeat_byte(0xee)));

    let tx = json!({ "from": FROM, "to": TO, "value": "0x1" });
    let hash = call(&s, "eth_sendTransaction", vec![tx]).await.unwrap();
    assert_eq!(hash, json!(B256::repeat_byte(0xee)));

    assert_eq!(
        s.node.methods(),
        vec![
            "eth_getTransactionCount",
            "eth_estimateGas",
            "eth_gasPrice",
            "net_version",
            "eth_sendRawTransaction",
        ]
    );
    assert_eq!(
        *s.signer.calls.lock().unwrap(),
        vec!["sign_transaction nonce=4 net=1 chain=1".to_string()]
    );

    // Pipeline requests share the counter and never reuse an id.
    let calls = s.node.calls();
    let ids: std::collections::HashSet<String> = calls.iter().map(|c| c.id.to_string()).collect();
    assert_eq!(ids.len(), calls.len());

    let raw: Bytes = serde_json::from_value(calls[4].params[0].clone()).unwrap();
    let submitted = SignedTransaction::decode_rlp(&raw).unwrap();
    assert_eq!(submitted.nonce, U256::from(4));
    assert_eq!(submitted.gas_limit, U256::from(27_300));
    assert_eq!(submitted.gas_price, U256::from(2));
    assert_eq!(submitted.to, Some(TO));
    assert_eq!(submitted.value, U256::from(1));
    assert_eq!(submitted.v, U256::from(28 + 2 + 8));
    assert_eq!(submitted.chain_id, 1);
}

#[tokio::test]
async fn missing_from_fails_without_io() {
    let s = stack(SigningConfig::default());
    let err = call(&s, "eth_sendTransaction", vec![json!({ "to": TO })]).await.unwrap_err();

    assert!(matches!(err, ProviderError::Validation(ValidationError::MissingField("from"))));
    assert!(s.node.calls().is_empty());
    assert!(s.signer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn non_decimal_network_version_aborts_before_signing() {
    let s = stack(SigningConfig::default());
    s.node.set_result("net_version", json!("0x1"));
    let tx = json!({
        "from": FROM,
        "to": TO,
        "nonce": "0x0",
        "gas": "0x5208",
        "gasPrice": "0x1",
    });

    let err = call(&s, "eth_sendTransaction", vec![tx]).await.unwrap_err();
    assert!(matches!(
        err,
        ProviderError::Validation(ValidationError::NonIntegerNetworkVersion(_))
    ));
    assert_eq!(s.node.methods(), vec!["net_version"]);
    assert!(s.signer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn configured_chain_id_overrides_network_id() {
    let s = stack(SigningConfig::with_chain_id(1337));
    s.node
        .set_result("net_version", json!("1"))
        .push_result("eth_sendRawTransaction", json!(B256::ZERO));
    let tx = json!({
        "from": FROM,
        "to": TO,
        "nonce": "0x0",
        "gas": "0x5208",
        "gasPrice": "0x1",
    });

    call(&s, "eth_sendTransaction", vec![tx]).await.unwrap();

    let identity = s.top.network_identity().await.unwrap();
    assert_eq!((identity.network_id, identity.chain_id), (1, 1337));
    let raw: Bytes = serde_json::from_value(s.node.calls()[1].params[0].clone()).unwrap();
    assert_eq!(SignedTransaction::decode_rlp(&raw).unwrap().chain_id, 1337);
}

#[tokio::test]
async fn failed_submission_surfaces_rpc_error() {
    let s = stack(SigningConfig::default());
    s.node
        .set_result("net_version", json!("1"))
        .push_error(
            "eth_sendRawTransaction",
            chainweb3_core::JsonRpcError::new(-32000, "nonce too low"),
        );
    let tx = json!({ "from": FROM, "to": TO, "nonce": "0x0", "gas": "0x1", "gasPrice": "0x1" });

    let err = call(&s, "eth_sendTransaction", vec![tx]).await.unwrap_err();
    assert!(matches!(err, ProviderError::Rpc(e) if e.message == "nonce too low"));
}

#[tokio::test]
async fn filter_methods_reach_the_filter_layer() {
    let s = stack(SigningConfig::default());

    let id = call(&s, "eth_newBlockFilter", vec![]).await.unwrap();
    assert_eq!(id, json!("0x1"));
    assert_eq!(call(&s, "eth_getFilterChanges", vec![id.clone()]).await.unwrap(), json!([]));
    assert_eq!(call(&s, "eth_uninstallFilter", vec![id]).await.unwrap(), json!(true));

    s.node.push_result("eth_chainId", json!("0x1"));
    assert_eq!(call(&s, "eth_chainId", vec![]).await.unwrap(), json!("0x1"));
    assert_eq!(s.node.methods(), vec!["eth_chainId"]);
}

#[tokio::test]
async fn typed_data_aliases_reach_the_same_signer_call() {
    let s = stack(SigningConfig::default());
    s.node.set_result("net_version", json!("5"));
    let typed = json!({ "primaryType": "Mail", "message": { "contents": "hi" } });

    let a = call(&s, "eth_signTypedData", vec![json!(FROM), typed.clone()]).await.unwrap();
    let b = call(&s, "personal_signTypedData", vec![json!(FROM), typed.clone(), json!("secret")])
        .await
        .unwrap();
    assert_eq!(a, json!("0x02"));
    assert_eq!(a, b);

    let expected = format!("sign_typed_data account={FROM} data={typed} net=5");
    assert_eq!(*s.signer.calls.lock().unwrap(), vec![expected.clone(), expected]);
    // Resolved once, then cached.
    assert_eq!(s.node.methods(), vec!["net_version"]);
}

#[tokio::test]
async fn personal_sign_typed_data_needs_account_and_data() {
    let s = stack(SigningConfig::default());
    let err = call(&s, "personal_signTypedData", vec![json!(FROM)]).await.unwrap_err();
    assert!(matches!(err, ProviderError::Validation(ValidationError::InvalidParams { .. })));
    assert!(s.signer.calls.lock().unwrap().is_empty());
}
