//! chainweb3-http: the bottom of a chainweb3 provider stack.
//!
//! [`HttpProvider`] POSTs each JSON-RPC request to a node and maps HTTP
//! failures onto [`ProviderError`](chainweb3_core::ProviderError):
//! connect/timeout failures become `ConnectionFailed`, non-2xx statuses
//! `ServerError`, and unreadable or mismatched bodies `Decoding`.

pub mod client;

pub use client::{HttpProvider, HttpProviderConfig};
