//! The `Provider` trait: the single capability every layer of the stack implements.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// Send one JSON-RPC request and return its response.
///
/// Transports implement this at the bottom of a stack; middlewares implement
/// it by wrapping an inner `Arc<dyn Provider>`. A middleware either answers a
/// method it owns entirely from its own state (never touching the inner
/// provider) or forwards the request unchanged.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn Provider>`.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Send a single JSON-RPC request and return the response.
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, ProviderError>;

    /// Identifier of the endpoint at the bottom of the stack (URL or name).
    fn url(&self) -> &str;
}

#[async_trait]
impl<P: Provider + ?Sized> Provider for Arc<P> {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, ProviderError> {
        (**self).send(req).await
    }

    fn url(&self) -> &str {
        (**self).url()
    }
}
