//! chainweb3-filters: client-side filter emulation.
//!
//! Many hosted endpoints reject `eth_newFilter` and friends. [`FilterMiddleware`]
//! answers those methods itself from a [`FilterEngine`] that polls the wrapped
//! provider for new blocks and logs, so callers can keep using filter ids.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chainweb3_core::{Provider, RequestIdCounter};
//! use chainweb3_filters::{FilterEngineConfig, FilterMiddleware};
//!
//! # fn wrap(node: Arc<dyn Provider>) -> FilterMiddleware {
//! let ids = Arc::new(RequestIdCounter::new());
//! FilterMiddleware::new(node, ids, FilterEngineConfig::default())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod filter;
pub mod middleware;

pub use config::FilterEngineConfig;
pub use engine::FilterEngine;
pub use filter::{topic_matches, ChainUpdate, Filter, FilterKind};
pub use middleware::{FilterMethod, FilterMiddleware};
