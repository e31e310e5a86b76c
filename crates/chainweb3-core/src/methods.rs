//! Typed method table and the base RPC client.
//!
//! Each [`RpcMethod`] statically pairs a JSON-RPC method name with its
//! positional params and its result type, so a response can only ever be
//! decoded into the type its method declares.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ProviderError;
use crate::id::RequestIdCounter;
use crate::provider::Provider;
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::types::{BlockSnapshot, BlockTag, CallRequest, LogEntry, LogQuery};

/// A JSON-RPC method with statically known params and result.
pub trait RpcMethod: Send {
    const NAME: &'static str;
    type Output: DeserializeOwned + Send;

    fn params(&self) -> Result<Vec<Value>, serde_json::Error>;
}

/// `eth_getTransactionCount(address, block)`.
#[derive(Debug, Clone)]
pub struct GetTransactionCount {
    pub address: Address,
    pub block: BlockTag,
}

impl RpcMethod for GetTransactionCount {
    const NAME: &'static str = "eth_getTransactionCount";
    type Output = U256;

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![serde_json::to_value(self.address)?, serde_json::to_value(self.block)?])
    }
}

/// `eth_estimateGas(call)`.
#[derive(Debug, Clone)]
pub struct EstimateGas(pub CallRequest);

impl RpcMethod for EstimateGas {
    const NAME: &'static str = "eth_estimateGas";
    type Output = U256;

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![serde_json::to_value(&self.0)?])
    }
}

/// `eth_gasPrice()`.
#[derive(Debug, Clone, Copy)]
pub struct GasPrice;

impl RpcMethod for GasPrice {
    const NAME: &'static str = "eth_gasPrice";
    type Output = U256;

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![])
    }
}

/// `eth_sendRawTransaction(bytes)`, returning the transaction hash.
#[derive(Debug, Clone)]
pub struct SendRawTransaction(pub Bytes);

impl RpcMethod for SendRawTransaction {
    const NAME: &'static str = "eth_sendRawTransaction";
    type Output = B256;

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![serde_json::to_value(&self.0)?])
    }
}

/// `eth_getBlockByNumber(tag, full)`; `null` when the block is unknown.
#[derive(Debug, Clone, Copy)]
pub struct GetBlockByNumber {
    pub block: BlockTag,
    pub full_transactions: bool,
}

impl RpcMethod for GetBlockByNumber {
    const NAME: &'static str = "eth_getBlockByNumber";
    type Output = Option<BlockSnapshot>;

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![serde_json::to_value(self.block)?, Value::Bool(self.full_transactions)])
    }
}

/// `eth_getLogs(query)`.
#[derive(Debug, Clone)]
pub struct GetLogs(pub LogQuery);

impl RpcMethod for GetLogs {
    const NAME: &'static str = "eth_getLogs";
    type Output = Vec<LogEntry>;

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![serde_json::to_value(&self.0)?])
    }
}

/// `net_version()`: a base-10 string.
#[derive(Debug, Clone, Copy)]
pub struct NetVersion;

impl RpcMethod for NetVersion {
    const NAME: &'static str = "net_version";
    type Output = String;

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![])
    }
}

/// Decode a response into `T`.
///
/// A missing result is only acceptable when `T` itself accepts `null`
/// (e.g. `Option<_>`); otherwise it is [`ProviderError::EmptyResponse`].
pub fn decode_result<T: DeserializeOwned>(resp: JsonRpcResponse) -> Result<T, ProviderError> {
    match resp.into_result()? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => serde_json::from_value(Value::Null).map_err(|_| ProviderError::EmptyResponse),
    }
}

/// Thin typed client over a [`Provider`].
///
/// Used internally by the middlewares to talk to the provider they wrap.
#[derive(Clone)]
pub struct RpcClient {
    provider: Arc<dyn Provider>,
    ids: Arc<RequestIdCounter>,
}

impl RpcClient {
    pub fn new(provider: Arc<dyn Provider>, ids: Arc<RequestIdCounter>) -> Self {
        Self { provider, ids }
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn ids(&self) -> &Arc<RequestIdCounter> {
        &self.ids
    }

    /// Issue `method` with a fresh request id and decode its typed result.
    pub async fn request<M: RpcMethod>(&self, method: M) -> Result<M::Output, ProviderError> {
        let params = method
            .params()
            .map_err(|e| ProviderError::RequestFailed(format!("{}: {e}", M::NAME)))?;
        let req = JsonRpcRequest::new(self.ids.next(), M::NAME, params);
        tracing::trace!(method = M::NAME, id = %req.id, "sending request");
        let resp = self.provider.send(req).await?;
        decode_result(resp)
    }

    pub async fn transaction_count(
        &self,
        address: Address,
        block: BlockTag,
    ) -> Result<U256, ProviderError> {
        self.request(GetTransactionCount { address, block }).await
    }

    pub async fn estimate_gas(&self, call: CallRequest) -> Result<U256, ProviderError> {
        self.request(EstimateGas(call)).await
    }

    pub async fn gas_price(&self) -> Result<U256, ProviderError> {
        self.request(GasPrice).await
    }

    pub async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, ProviderError> {
        self.request(SendRawTransaction(raw)).await
    }

    pub async fn block_by_number(
        &self,
        block: BlockTag,
    ) -> Result<Option<BlockSnapshot>, ProviderError> {
        self.request(GetBlockByNumber { block, full_transactions: false }).await
    }

    pub async fn logs(&self, query: LogQuery) -> Result<Vec<LogEntry>, ProviderError> {
        self.request(GetLogs(query)).await
    }

    pub async fn net_version(&self) -> Result<String, ProviderError> {
        self.request(NetVersion).await
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient").field("url", &self.provider.url()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;
    use crate::request::{JsonRpcError, RpcId};
    use serde_json::json;

    fn client(mock: &Arc<MockProvider>) -> RpcClient {
        RpcClient::new(mock.clone(), Arc::new(RequestIdCounter::new()))
    }

    #[tokio::test]
    async fn typed_request_uses_method_table() {
        let mock = Arc::new(MockProvider::new());
        mock.push_result("eth_getTransactionCount", json!("0x2a"));
        let nonce = client(&mock)
            .transaction_count(Address::repeat_byte(0xaa), BlockTag::Pending)
            .await
            .unwrap();
        assert_eq!(nonce, U256::from(42));

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, RpcId::Number(1));
        assert_eq!(calls[0].params[1], json!("pending"));
    }

    #[tokio::test]
    async fn null_block_is_not_an_error() {
        let mock = Arc::new(MockProvider::new());
        mock.push_result("eth_getBlockByNumber", Value::Null);
        let block = client(&mock).block_by_number(BlockTag::Latest).await.unwrap();
        assert!(block.is_none());
    }

    #[tokio::test]
    async fn null_where_value_required_is_empty_response() {
        let mock = Arc::new(MockProvider::new());
        mock.push_result("eth_gasPrice", Value::Null);
        let err = client(&mock).gas_price().await.unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse));
    }

    #[tokio::test]
    async fn rpc_error_is_surfaced() {
        let mock = Arc::new(MockProvider::new());
        mock.push_error("net_version", JsonRpcError::new(-32000, "boom"));
        let err = client(&mock).net_version().await.unwrap_err();
        assert!(matches!(err, ProviderError::Rpc(e) if e.message == "boom"));
    }

    #[tokio::test]
    async fn wrong_shape_is_decoding_error() {
        let mock = Arc::new(MockProvider::new());
        mock.push_result("eth_getLogs", json!({"not": "an array"}));
        let err = client(&mock).logs(LogQuery::default()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Decoding(_)));
    }
}
