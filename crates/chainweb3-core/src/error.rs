//! Error taxonomy shared by every layer of the provider stack.

use alloy_primitives::Address;
use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur while a request travels through the provider stack.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The response carried neither a result nor an error.
    #[error("empty response")]
    EmptyResponse,

    /// The request could not be built or dispatched.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Connection refused, reset or timed out at the transport.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The endpoint answered with a non-success HTTP status.
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },

    /// The external signer refused or failed.
    #[error("signer error: {0}")]
    Signer(#[from] SignerError),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// A response or payload could not be decoded.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// The request is malformed or missing mandatory data.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No installed filter has this id.
    #[error("filter not found: {0:#x}")]
    FilterNotFound(u64),
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decoding(err.to_string())
    }
}

impl ProviderError {
    /// Returns `true` if the failure happened at the transport boundary.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::RequestFailed(_) | Self::ConnectionFailed(_) | Self::ServerError { .. }
        )
    }

    /// Returns `true` if the request itself was rejected before any I/O.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// A request or payload failed local validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("mandatory field missing: {0}")]
    MissingField(&'static str),

    #[error("network version is not a base-10 integer: {0:?}")]
    NonIntegerNetworkVersion(String),

    #[error("invalid params for {method}: {reason}")]
    InvalidParams { method: String, reason: String },

    #[error("signature must be 65 bytes, got {len}")]
    MalformedSignature { len: usize },

    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),
}

/// Failures reported by an external signer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("signing rejected: {0}")]
    Rejected(String),

    #[error("unknown account {0}")]
    UnknownAccount(Address),

    #[error("signer unavailable: {0}")]
    Unavailable(String),
}
