//! chainweb3-core: foundation traits and types for chainweb3.
//!
//! # Overview
//!
//! chainweb3 turns high-level calls into Ethereum JSON-RPC requests through a
//! stack of provider middlewares. The core crate defines:
//!
//! - [`Provider`]: the async trait every transport and middleware implements
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`]: wire types
//! - [`ProviderError`]: structured error taxonomy
//! - [`RequestIdCounter`]: shared request id source
//! - [`methods`]: typed method table and the base [`RpcClient`]
//! - [`types`]: block tags, topics, logs, transactions

pub mod error;
pub mod id;
pub mod methods;
pub mod provider;
pub mod request;
pub mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::{ProviderError, SignerError, ValidationError};
pub use id::RequestIdCounter;
pub use methods::{RpcClient, RpcMethod};
pub use provider::Provider;
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use types::{
    BlockSnapshot, BlockTag, CallRequest, FilterChanges, LogEntry, LogFilter, LogQuery, Topic,
    TransactionRequest, TypedData,
};
