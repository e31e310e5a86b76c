//! HTTP JSON-RPC provider backed by `reqwest`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use chainweb3_core::{JsonRpcRequest, JsonRpcResponse, Provider, ProviderError};

/// Configuration for [`HttpProvider`].
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Upper bound for one request, connect included.
    pub request_timeout: Duration,
    /// Extra headers sent with every request (API keys and the like).
    pub headers: HashMap<String, String>,
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            headers: HashMap::new(),
        }
    }
}

/// Sends each request as one JSON-RPC POST. No retries: callers that want
/// them wrap the provider.
pub struct HttpProvider {
    url: String,
    http: reqwest::Client,
}

impl HttpProvider {
    /// Create a provider for the JSON-RPC endpoint at `url`.
    pub fn new(url: impl Into<String>, config: HttpProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(header_map(&config.headers)?)
            .build()
            .map_err(|e| ProviderError::RequestFailed(format!("building http client: {e}")))?;
        Ok(Self { url: url.into(), http })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new(url, HttpProviderConfig::default())
    }
}

fn header_map(headers: &HashMap<String, String>) -> Result<HeaderMap, ProviderError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ProviderError::RequestFailed(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ProviderError::RequestFailed(format!("header {name:?}: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_connect() || err.is_timeout() {
        ProviderError::ConnectionFailed(err.to_string())
    } else {
        ProviderError::RequestFailed(err.to_string())
    }
}

/// Decode a response body and check that it answers `req`.
fn decode_response(req: &JsonRpcRequest, body: &[u8]) -> Result<JsonRpcResponse, ProviderError> {
    let resp: JsonRpcResponse = serde_json::from_slice(body)?;
    if resp.id != req.id {
        return Err(ProviderError::Decoding(format!(
            "response id {} does not match request id {}",
            resp.id, req.id
        )));
    }
    Ok(resp)
}

#[async_trait]
impl Provider for HttpProvider {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, ProviderError> {
        tracing::debug!(method = %req.method, id = %req.id, url = %self.url, "http request");
        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), url = %self.url, "http error status");
            return Err(ProviderError::ServerError { status: status.as_u16(), body });
        }

        let body = resp.bytes().await.map_err(transport_error)?;
        decode_response(&req, &body)
    }

    fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider").field("url", &self.url).finish()
    }
}
