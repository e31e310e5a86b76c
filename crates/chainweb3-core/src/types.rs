//! Ethereum JSON-RPC data types used by the middlewares.
//!
//! Only the fields the filter engine and the signing pipeline actually read
//! are modelled; unknown fields in node responses are ignored.

use std::str::FromStr;

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

/// Block selector: a concrete number or one of the named tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BlockTag {
    Number(u64),
    #[default]
    Latest,
    Earliest,
    Pending,
}

impl BlockTag {
    /// The block number, if this tag names a concrete block.
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// A string that is neither a named block tag nor a hex quantity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid block tag: {0:?}")]
pub struct InvalidBlockTag(pub String);

impl FromStr for BlockTag {
    type Err = InvalidBlockTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(Self::Latest),
            "earliest" => Ok(Self::Earliest),
            "pending" => Ok(Self::Pending),
            other => other
                .strip_prefix("0x")
                .and_then(|hex| u64::from_str_radix(hex, 16).ok())
                .map(Self::Number)
                .ok_or_else(|| InvalidBlockTag(other.to_string())),
        }
    }
}

impl std::fmt::Display for BlockTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n:#x}"),
            Self::Latest => write!(f, "latest"),
            Self::Earliest => write!(f, "earliest"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

impl Serialize for BlockTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BlockTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Positional topic matcher.
///
/// On the wire `null` is [`Topic::Any`], a hex string is [`Topic::Exact`] and
/// an array is [`Topic::Or`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Topic {
    Any,
    Exact(B256),
    Or(Vec<Topic>),
}

/// Log selection criteria, as passed to `eth_newFilter`.
///
/// The EIP-234 `blockHash` form lives on [`LogQuery`]; installed filters
/// refuse it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_block: Option<BlockTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_block: Option<BlockTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<Topic>,
}

/// Parameters of `eth_getLogs`: filter criteria or a single block hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    #[serde(flatten)]
    pub filter: LogFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<B256>,
}

impl LogQuery {
    /// All logs of one block, unfiltered.
    pub fn at_block_hash(hash: B256) -> Self {
        Self { filter: LogFilter::default(), block_hash: Some(hash) }
    }
}

impl From<LogFilter> for LogQuery {
    fn from(filter: LogFilter) -> Self {
        Self { filter, block_hash: None }
    }
}

/// A log emitted by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub address: Address,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<U64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_index: Option<U64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<U64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed: Option<bool>,
}

/// The header data filter matching needs from `eth_getBlockByNumber(tag, false)`.
///
/// Pending blocks may carry no hash (and on some nodes no number).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSnapshot {
    #[serde(default)]
    pub number: Option<U64>,
    #[serde(default)]
    pub hash: Option<B256>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub transactions: Vec<B256>,
}

impl BlockSnapshot {
    pub fn number_u64(&self) -> Option<u64> {
        self.number.map(|n| n.to::<u64>())
    }
}

/// Result of `eth_getFilterChanges`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterChanges {
    /// Block hashes (block filters) or transaction hashes (pending filters).
    Hashes(Vec<B256>),
    Logs(Vec<LogEntry>),
}

impl FilterChanges {
    pub fn len(&self) -> usize {
        match self {
            Self::Hashes(h) => h.len(),
            Self::Logs(l) => l.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Transaction as submitted to `eth_sendTransaction`.
///
/// Every field but `from` may be left for the signing pipeline to fill;
/// each pipeline step returns a new value rather than mutating in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// Gas limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, alias = "input", skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U256>,
}

impl TransactionRequest {
    pub fn with_nonce(self, nonce: U256) -> Self {
        Self { nonce: Some(nonce), ..self }
    }

    pub fn with_gas(self, gas: U256) -> Self {
        Self { gas: Some(gas), ..self }
    }

    pub fn with_gas_price(self, gas_price: U256) -> Self {
        Self { gas_price: Some(gas_price), ..self }
    }
}

/// Call shape for `eth_estimateGas` / `eth_call`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
}

/// EIP-712 typed data, opaque to this library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypedData(pub Value);

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
