//! chainweb3-signer: local signing for a chainweb3 provider stack.
//!
//! [`SigningMiddleware`] owns the account and signing methods
//! (`eth_accounts`, `eth_sign`, `personal_sign`, `eth_signTypedData`,
//! `eth_sendTransaction`). Signatures come from an external [`Signer`]; the
//! middleware fills in nonce and gas, folds the chain id into `v` (EIP-155)
//! and submits the RLP-encoded result with `eth_sendRawTransaction`.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chainweb3_core::{Provider, RequestIdCounter};
//! use chainweb3_signer::{Signer, SigningConfig, SigningMiddleware};
//!
//! # fn wrap(node: Arc<dyn Provider>, wallet: Arc<dyn Signer>) -> SigningMiddleware {
//! let ids = Arc::new(RequestIdCounter::new());
//! SigningMiddleware::new(node, wallet, ids, SigningConfig::with_chain_id(1))
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod middleware;
pub mod network;
pub mod pipeline;
pub mod signer;
pub mod transaction;

pub use codec::CodecError;
pub use config::SigningConfig;
pub use middleware::{SigningMethod, SigningMiddleware};
pub use network::{parse_network_version, NetworkIdentity};
pub use signer::Signer;
pub use transaction::{RawSignature, SignedTransaction, UnsignedTransaction};
