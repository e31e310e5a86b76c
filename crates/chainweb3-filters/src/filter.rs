//! Installed filters and the matching rules they apply to new chain data.
//!
//! A [`Filter`] only ever buffers changes; fetching is the engine's job.
//! Every kind reacts to the [`ChainUpdate`]s it cares about and ignores the
//! rest, and [`Filter::drain`] hands out what accumulated since the last read.

use alloy_primitives::B256;
use chainweb3_core::{BlockSnapshot, FilterChanges, LogEntry, LogFilter, Topic};

/// New chain data observed by one poll.
#[derive(Debug, Clone, Copy)]
pub enum ChainUpdate<'a> {
    /// The current `latest` block.
    Latest(&'a BlockSnapshot),
    /// The current `pending` block.
    Pending(&'a BlockSnapshot),
    /// All logs of a newly seen `latest` block.
    Logs {
        block: &'a BlockSnapshot,
        logs: &'a [LogEntry],
    },
}

/// Which `eth_new*Filter` call created a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Block,
    PendingTransactions,
    Logs,
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Block => write!(f, "block"),
            Self::PendingTransactions => write!(f, "pending-transactions"),
            Self::Logs => write!(f, "logs"),
        }
    }
}

/// Reports the hash of every newer `latest` block.
#[derive(Debug, Clone, Default)]
pub struct BlockFilter {
    last_seen: Option<u64>,
    hashes: Vec<B256>,
}

impl BlockFilter {
    fn apply(&mut self, block: &BlockSnapshot) {
        let (Some(number), Some(hash)) = (block.number_u64(), block.hash) else {
            return;
        };
        if self.last_seen.is_some_and(|seen| number <= seen) {
            return;
        }
        self.last_seen = Some(number);
        self.hashes.push(hash);
    }
}

/// Reports the transaction hashes of the newest `pending` block.
///
/// A newer pending block replaces whatever is still buffered: the previous
/// pending set is stale once the node has moved on.
#[derive(Debug, Clone, Default)]
pub struct PendingTransactionFilter {
    last_seen: Option<u64>,
    hashes: Vec<B256>,
}

impl PendingTransactionFilter {
    fn apply(&mut self, block: &BlockSnapshot) {
        let Some(number) = block.number_u64() else {
            return;
        };
        if self.last_seen.is_some_and(|seen| number <= seen) {
            return;
        }
        self.last_seen = Some(number);
        self.hashes = block.transactions.clone();
    }
}

/// Buffers the logs of new blocks that satisfy its criteria.
#[derive(Debug, Clone)]
pub struct LogsFilter {
    criteria: LogFilter,
    logs: Vec<LogEntry>,
}

impl LogsFilter {
    pub fn new(criteria: LogFilter) -> Self {
        Self { criteria, logs: Vec::new() }
    }

    pub fn criteria(&self) -> &LogFilter {
        &self.criteria
    }

    /// Whether `log`, found in `block`, satisfies the criteria.
    ///
    /// `toBlock` is not consulted. When the log carries no block number the
    /// block's number is used for the `fromBlock` bound.
    pub fn matches(&self, log: &LogEntry, block: &BlockSnapshot) -> bool {
        if let Some(from) = self.criteria.from_block.and_then(|tag| tag.as_number()) {
            let number = log.block_number.map(|n| n.to::<u64>()).or_else(|| block.number_u64());
            if number.is_some_and(|n| from > n) {
                return false;
            }
        }
        if self.criteria.address.is_some_and(|address| address != log.address) {
            return false;
        }
        self.criteria
            .topics
            .iter()
            .enumerate()
            .all(|(position, topic)| topic_matches(topic, &log.topics, position))
    }

    fn apply(&mut self, block: &BlockSnapshot, logs: &[LogEntry]) {
        let matched = logs.iter().filter(|log| self.matches(log, block)).cloned().collect::<Vec<_>>();
        self.logs.extend(matched);
    }
}

/// Match `topic` against the log topic at `position`.
///
/// [`Topic::Any`] only requires the position to exist. An empty
/// [`Topic::Or`] never matches.
pub fn topic_matches(topic: &Topic, topics: &[B256], position: usize) -> bool {
    match topic {
        Topic::Any => topics.len() > position,
        Topic::Exact(expected) => topics.get(position) == Some(expected),
        Topic::Or(alternatives) => {
            alternatives.iter().any(|alt| topic_matches(alt, topics, position))
        }
    }
}

/// A filter installed in the engine.
#[derive(Debug, Clone)]
pub enum Filter {
    Block(BlockFilter),
    PendingTransactions(PendingTransactionFilter),
    Logs(LogsFilter),
}

impl Filter {
    pub fn block() -> Self {
        Self::Block(BlockFilter::default())
    }

    pub fn pending_transactions() -> Self {
        Self::PendingTransactions(PendingTransactionFilter::default())
    }

    pub fn logs(criteria: LogFilter) -> Self {
        Self::Logs(LogsFilter::new(criteria))
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            Self::Block(_) => FilterKind::Block,
            Self::PendingTransactions(_) => FilterKind::PendingTransactions,
            Self::Logs(_) => FilterKind::Logs,
        }
    }

    /// Log criteria, for log filters only.
    pub fn criteria(&self) -> Option<&LogFilter> {
        match self {
            Self::Logs(f) => Some(f.criteria()),
            _ => None,
        }
    }

    /// Fold newly observed chain data into the buffer.
    pub fn apply(&mut self, update: ChainUpdate<'_>) {
        match (self, update) {
            (Self::Block(f), ChainUpdate::Latest(block)) => f.apply(block),
            (Self::PendingTransactions(f), ChainUpdate::Pending(block)) => f.apply(block),
            (Self::Logs(f), ChainUpdate::Logs { block, logs }) => f.apply(block, logs),
            _ => {}
        }
    }

    /// Take everything buffered since the previous drain.
    pub fn drain(&mut self) -> FilterChanges {
        match self {
            Self::Block(f) => FilterChanges::Hashes(std::mem::take(&mut f.hashes)),
            Self::PendingTransactions(f) => FilterChanges::Hashes(std::mem::take(&mut f.hashes)),
            Self::Logs(f) => FilterChanges::Logs(std::mem::take(&mut f.logs)),
        }
    }
}
