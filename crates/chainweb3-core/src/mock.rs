//! Scripted in-memory provider for tests.
//!
//! Replies are looked up per method: one-shot replies queued with `push_*`
//! are consumed first, then the sticky reply set with [`MockProvider::set_result`].
//! Every request is recorded so tests can assert on call order and params.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;
use crate::provider::Provider;
use crate::request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

#[derive(Debug, Clone)]
enum Reply {
    Result(Value),
    Error(JsonRpcError),
    ConnectionFailed(String),
}

#[derive(Debug, Default)]
struct Script {
    queued: HashMap<String, VecDeque<Reply>>,
    sticky: HashMap<String, Reply>,
    calls: Vec<JsonRpcRequest>,
}

/// A [`Provider`] that answers from a script and records every call.
#[derive(Debug, Default)]
pub struct MockProvider {
    script: Mutex<Script>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, method: &str, reply: Reply) -> &Self {
        self.script().queued.entry(method.to_string()).or_default().push_back(reply);
        self
    }

    /// Answer the next `method` call with `result`.
    pub fn push_result(&self, method: &str, result: Value) -> &Self {
        self.push(method, Reply::Result(result))
    }

    /// Answer the next `method` call with a JSON-RPC error object.
    pub fn push_error(&self, method: &str, error: JsonRpcError) -> &Self {
        self.push(method, Reply::Error(error))
    }

    /// Fail the next `method` call at the transport.
    pub fn push_connection_failure(&self, method: &str, reason: &str) -> &Self {
        self.push(method, Reply::ConnectionFailed(reason.to_string()))
    }

    /// Answer every `method` call with `result` once the queue is empty.
    pub fn set_result(&self, method: &str, result: Value) -> &Self {
        self.script().sticky.insert(method.to_string(), Reply::Result(result));
        self
    }

    /// All recorded requests, in arrival order.
    pub fn calls(&self) -> Vec<JsonRpcRequest> {
        self.script().calls.clone()
    }

    /// Method names of all recorded requests, in arrival order.
    pub fn methods(&self) -> Vec<String> {
        self.script().calls.iter().map(|c| c.method.clone()).collect()
    }

    /// Number of recorded calls to `method`.
    pub fn count(&self, method: &str) -> usize {
        self.script().calls.iter().filter(|c| c.method == method).count()
    }

    pub fn clear_calls(&self) {
        self.script().calls.clear();
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, ProviderError> {
        let reply = {
            let mut script = self.script();
            script.calls.push(req.clone());
            let queued = script.queued.get_mut(&req.method).and_then(VecDeque::pop_front);
            queued.or_else(|| script.sticky.get(&req.method).cloned())
        };
        match reply {
            Some(Reply::Result(value)) => Ok(JsonRpcResponse::success(req.id, value)),
            Some(Reply::Error(err)) => Ok(JsonRpcResponse::failure(req.id, err)),
            Some(Reply::ConnectionFailed(reason)) => Err(ProviderError::ConnectionFailed(reason)),
            None => Ok(JsonRpcResponse::failure(
                req.id,
                JsonRpcError::new(-32601, format!("method not found: {}", req.method)),
            )),
        }
    }

    fn url(&self) -> &str {
        "mock"
    }
}
