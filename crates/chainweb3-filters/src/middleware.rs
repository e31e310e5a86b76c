//! Provider middleware that answers the filter methods locally.

use std::sync::Arc;

use alloy_primitives::U64;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use chainweb3_core::{
    JsonRpcRequest, JsonRpcResponse, LogFilter, LogQuery, Provider, ProviderError,
    RequestIdCounter, RpcClient, ValidationError,
};

use crate::config::FilterEngineConfig;
use crate::engine::FilterEngine;

/// The JSON-RPC methods served by the filter engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMethod {
    NewFilter,
    NewBlockFilter,
    NewPendingTransactionFilter,
    UninstallFilter,
    GetFilterChanges,
    GetFilterLogs,
}

impl FilterMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "eth_newFilter" => Self::NewFilter,
            "eth_newBlockFilter" => Self::NewBlockFilter,
            "eth_newPendingTransactionFilter" => Self::NewPendingTransactionFilter,
            "eth_uninstallFilter" => Self::UninstallFilter,
            "eth_getFilterChanges" => Self::GetFilterChanges,
            "eth_getFilterLogs" => Self::GetFilterLogs,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NewFilter => "eth_newFilter",
            Self::NewBlockFilter => "eth_newBlockFilter",
            Self::NewPendingTransactionFilter => "eth_newPendingTransactionFilter",
            Self::UninstallFilter => "eth_uninstallFilter",
            Self::GetFilterChanges => "eth_getFilterChanges",
            Self::GetFilterLogs => "eth_getFilterLogs",
        }
    }
}

/// Emulates node-side filters for providers that lack them.
///
/// Filter methods are served by a [`FilterEngine`] that polls the wrapped
/// provider; every other request passes through untouched.
pub struct FilterMiddleware {
    inner: Arc<dyn Provider>,
    engine: FilterEngine,
}

impl FilterMiddleware {
    /// Wrap `inner`. The engine's own requests draw ids from `ids`.
    pub fn new(
        inner: Arc<dyn Provider>,
        ids: Arc<RequestIdCounter>,
        config: FilterEngineConfig,
    ) -> Self {
        let engine = FilterEngine::new(RpcClient::new(inner.clone(), ids), config);
        Self { inner, engine }
    }

    pub fn engine(&self) -> &FilterEngine {
        &self.engine
    }

    async fn handle(&self, method: FilterMethod, req: &JsonRpcRequest) -> Result<Value, ProviderError> {
        let value = match method {
            FilterMethod::NewFilter => {
                id_value(self.engine.new_log_filter(log_criteria(req)?))
            }
            FilterMethod::NewBlockFilter => id_value(self.engine.new_block_filter()),
            FilterMethod::NewPendingTransactionFilter => {
                id_value(self.engine.new_pending_transaction_filter())
            }
            FilterMethod::UninstallFilter => {
                Value::Bool(self.engine.uninstall(filter_id(req)?))
            }
            FilterMethod::GetFilterChanges => {
                serde_json::to_value(self.engine.changes(filter_id(req)?)?)?
            }
            FilterMethod::GetFilterLogs => {
                serde_json::to_value(self.engine.logs(filter_id(req)?).await?)?
            }
        };
        Ok(value)
    }
}

/// Filter ids travel as hex quantities.
fn id_value(id: u64) -> Value {
    Value::String(format!("{id:#x}"))
}

/// `eth_newFilter` criteria. A `blockHash` query names one past block and
/// cannot be followed by polling, so it is refused.
fn log_criteria(req: &JsonRpcRequest) -> Result<LogFilter, ProviderError> {
    let query: LogQuery = req.decode_param(0)?;
    if query.block_hash.is_some() {
        return Err(ValidationError::InvalidParams {
            method: req.method.clone(),
            reason: "blockHash is not supported for installed filters".into(),
        }
        .into());
    }
    Ok(query.filter)
}

fn filter_id(req: &JsonRpcRequest) -> Result<u64, ProviderError> {
    let id: U64 = req.decode_param(0)?;
    Ok(id.to::<u64>())
}

#[async_trait]
impl Provider for FilterMiddleware {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, ProviderError> {
        let Some(method) = FilterMethod::from_name(&req.method) else {
            return self.inner.send(req).await;
        };
        debug!(method = method.name(), id = %req.id, "serving filter method locally");
        let result = self.handle(method, &req).await?;
        Ok(JsonRpcResponse::success(req.id, result))
    }

    fn url(&self) -> &str {
        self.inner.url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use chainweb3_core::mock::MockProvider;
    use chainweb3_core::RpcId;
    use serde_json::json;

    fn middleware(mock: &Arc<MockProvider>) -> FilterMiddleware {
        FilterMiddleware::new(
            mock.clone(),
            Arc::new(RequestIdCounter::new()),
            FilterEngineConfig::default(),
        )
    }

    async fn call(mw: &FilterMiddleware, method: &str, params: Vec<Value>) -> Result<Value, ProviderError> {
        let resp = mw.send(JsonRpcRequest::new(99, method, params)).await?;
        assert_eq!(resp.id, RpcId::Number(99));
        Ok(resp.into_result()?.unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn other_methods_pass_through() {
        let mock = Arc::new(MockProvider::new());
        mock.push_result("eth_chainId", json!("0x1"));
        let mw = middleware(&mock);

        assert_eq!(call(&mw, "eth_chainId", vec![]).await.unwrap(), json!("0x1"));
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, RpcId::Number(99));
        assert_eq!(mw.url(), "mock");
    }

    #[tokio::test]
    async fn filter_lifecycle_over_json_rpc() {
        let mock = Arc::new(MockProvider::new());
        let mw = middleware(&mock);

        let id = call(&mw, "eth_newBlockFilter", vec![]).await.unwrap();
        assert_eq!(id, json!("0x1"));
        assert!(mock.calls().is_empty());

        mock.set_result(
            "eth_getBlockByNumber",
            json!({ "number": "0x10", "hash": B256::with_last_byte(0x10), "transactions": [] }),
        );
        mw.engine().poll_once().await;

        let changes = call(&mw, "eth_getFilterChanges", vec![id.clone()]).await.unwrap();
        assert_eq!(changes, json!([B256::with_last_byte(0x10)]));
        let changes = call(&mw, "eth_getFilterChanges", vec![id.clone()]).await.unwrap();
        assert_eq!(changes, json!([]));

        assert_eq!(call(&mw, "eth_uninstallFilter", vec![id.clone()]).await.unwrap(), json!(true));
        assert_eq!(call(&mw, "eth_uninstallFilter", vec![id.clone()]).await.unwrap(), json!(false));
        let err = call(&mw, "eth_getFilterChanges", vec![id]).await.unwrap_err();
        assert!(matches!(err, ProviderError::FilterNotFound(1)));
    }

    #[tokio::test]
    async fn filter_logs_use_stored_criteria() {
        let mock = Arc::new(MockProvider::new());
        mock.push_result("eth_getLogs", json!([]));
        let mw = middleware(&mock);

        let criteria = json!({
            "fromBlock": "0x5",
            "address": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            "topics": [null]
        });
        let id = call(&mw, "eth_newFilter", vec![criteria]).await.unwrap();
        let logs = call(&mw, "eth_getFilterLogs", vec![id]).await.unwrap();
        assert_eq!(logs, json!([]));

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "eth_getLogs");
        assert_eq!(calls[0].params[0]["fromBlock"], json!("0x5"));
        assert_eq!(calls[0].params[0]["topics"], json!([null]));
    }

    #[tokio::test]
    async fn malformed_params_are_rejected() {
        let mock = Arc::new(MockProvider::new());
        let mw = middleware(&mock);

        let err = call(&mw, "eth_getFilterChanges", vec![]).await.unwrap_err();
        assert!(err.is_validation());
        let err = call(&mw, "eth_newFilter", vec![json!("nope")]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Decoding(_)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn block_hash_criteria_are_refused() {
        let mock = Arc::new(MockProvider::new());
        let mw = middleware(&mock);

        let params = vec![json!({ "blockHash": B256::repeat_byte(0x0c), "topics": [] })];
        let err = call(&mw, "eth_newFilter", params).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Validation(ValidationError::InvalidParams { ref method, .. })
                if method == "eth_newFilter"
        ));
        assert!(mw.engine().is_empty());

        let params = vec![json!({ "address": alloy_primitives::Address::ZERO, "topics": null })];
        assert_eq!(call(&mw, "eth_newFilter", params).await.unwrap(), json!("0x1"));
    }
}
