//! Polling filter engine.
//!
//! The engine keeps a registry of installed filters and, while at least one
//! is installed, polls the wrapped provider on a fixed interval:
//!
//! 1. filters not read within `filter_ttl` are purged; an empty registry
//!    stops the timer,
//! 2. the `latest` block feeds block filters, and, once per new block, that
//!    block's logs feed log filters,
//! 3. the `pending` block feeds pending-transaction filters.
//!
//! Fetch failures inside a poll are logged and dropped; the next poll retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use alloy_primitives::B256;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use chainweb3_core::{
    BlockSnapshot, BlockTag, FilterChanges, LogEntry, LogFilter, LogQuery, ProviderError,
    RpcClient,
};

use crate::config::FilterEngineConfig;
use crate::filter::{ChainUpdate, Filter, FilterKind};

struct InstalledFilter {
    filter: Filter,
    last_read: Instant,
}

struct PollTimer {
    epoch: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    filters: HashMap<u64, InstalledFilter>,
    /// Newest `latest` block whose logs were handed to log filters.
    last_log_block: Option<u64>,
    timer: Option<PollTimer>,
    /// Bumped on every timer start; a poll holding a stale epoch must not
    /// touch the registry.
    timer_epoch: u64,
}

impl Registry {
    fn insert(&mut self, filter: Filter) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.filters.insert(id, InstalledFilter { filter, last_read: Instant::now() });
        id
    }

    fn has_kind(&self, kind: FilterKind) -> bool {
        self.filters.values().any(|f| f.filter.kind() == kind)
    }

    /// `None` marks a poll driven by hand rather than by the timer.
    fn accepts(&self, epoch: Option<u64>) -> bool {
        match epoch {
            None => true,
            Some(epoch) => self.timer.as_ref().is_some_and(|t| t.epoch == epoch),
        }
    }

    fn purge_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let before = self.filters.len();
        self.filters.retain(|id, f| {
            let alive = now.duration_since(f.last_read) < ttl;
            if !alive {
                debug!(id, kind = %f.filter.kind(), "filter expired");
            }
            alive
        });
        before - self.filters.len()
    }

    fn broadcast(&mut self, update: ChainUpdate<'_>) {
        for installed in self.filters.values_mut() {
            installed.filter.apply(update);
        }
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
            info!(epoch = timer.epoch, "filter polling stopped");
        }
    }
}

struct EngineInner {
    client: RpcClient,
    config: FilterEngineConfig,
    registry: Mutex<Registry>,
}

impl EngineInner {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One poll. Returns `false` once the timer holding `epoch` should exit.
    async fn poll(&self, epoch: Option<u64>) -> bool {
        let (want_latest, want_pending) = {
            let mut registry = self.registry();
            if !registry.accepts(epoch) {
                return false;
            }
            let purged = registry.purge_expired(Instant::now(), self.config.filter_ttl);
            if purged > 0 {
                info!(purged, remaining = registry.filters.len(), "purged expired filters");
            }
            if registry.filters.is_empty() {
                registry.stop_timer();
                return false;
            }
            (
                registry.has_kind(FilterKind::Block) || registry.has_kind(FilterKind::Logs),
                registry.has_kind(FilterKind::PendingTransactions),
            )
        };
        trace!(want_latest, want_pending, "polling filters");

        let latest = async {
            if want_latest {
                self.refresh_latest(epoch).await;
            }
        };
        let pending = async {
            if want_pending {
                self.refresh_pending(epoch).await;
            }
        };
        futures::join!(latest, pending);
        true
    }

    async fn fetch_block(&self, tag: BlockTag) -> Option<BlockSnapshot> {
        match self.client.block_by_number(tag).await {
            Ok(Some(block)) => Some(block),
            Ok(None) => {
                trace!(%tag, "block not available yet");
                None
            }
            Err(e) => {
                warn!(%tag, error = %e, "failed to fetch block");
                None
            }
        }
    }

    async fn refresh_latest(&self, epoch: Option<u64>) {
        let Some(block) = self.fetch_block(BlockTag::Latest).await else {
            return;
        };
        let logs_for = {
            let mut registry = self.registry();
            if !registry.accepts(epoch) {
                return;
            }
            registry.broadcast(ChainUpdate::Latest(&block));
            self.pending_logs_block(&registry, &block)
        };
        if let Some((number, hash)) = logs_for {
            self.refresh_logs(&block, number, hash, epoch).await;
        }
    }

    /// The block whose logs still need fetching, if any.
    fn pending_logs_block(&self, registry: &Registry, block: &BlockSnapshot) -> Option<(u64, B256)> {
        if !registry.has_kind(FilterKind::Logs) {
            return None;
        }
        let number = block.number_u64()?;
        let hash = block.hash?;
        match registry.last_log_block {
            Some(last) if number <= last => None,
            _ => Some((number, hash)),
        }
    }

    async fn refresh_logs(&self, block: &BlockSnapshot, number: u64, hash: B256, epoch: Option<u64>) {
        let logs = match self.client.logs(LogQuery::at_block_hash(hash)).await {
            Ok(logs) => logs,
            Err(e) => {
                // The cursor stays put so the next poll asks for this block again.
                warn!(block = number, error = %e, "failed to fetch block logs");
                return;
            }
        };
        let mut registry = self.registry();
        if !registry.accepts(epoch) {
            return;
        }
        if registry.last_log_block.is_some_and(|last| number <= last) {
            return;
        }
        registry.last_log_block = Some(number);
        registry.broadcast(ChainUpdate::Logs { block, logs: &logs });
        trace!(block = number, logs = logs.len(), "applied block logs");
    }

    async fn refresh_pending(&self, epoch: Option<u64>) {
        let Some(block) = self.fetch_block(BlockTag::Pending).await else {
            return;
        };
        let mut registry = self.registry();
        if registry.accepts(epoch) {
            registry.broadcast(ChainUpdate::Pending(&block));
        }
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        let registry = self.registry.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = registry.timer.take() {
            timer.handle.abort();
        }
    }
}

async fn poll_loop(engine: Weak<EngineInner>, epoch: u64, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(engine) = engine.upgrade() else {
            break;
        };
        if !engine.poll(Some(epoch)).await {
            break;
        }
    }
}

/// Client-side filter emulation over a provider without filter support.
///
/// Cloning is cheap and every clone shares one registry. The poll timer is
/// aborted once the last clone is dropped.
#[derive(Clone)]
pub struct FilterEngine {
    inner: Arc<EngineInner>,
}

impl FilterEngine {
    /// Create an idle engine; polling starts with the first installed filter.
    pub fn new(client: RpcClient, config: FilterEngineConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                client,
                config,
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    pub fn config(&self) -> &FilterEngineConfig {
        &self.inner.config
    }

    /// Install `filter` and return its id, starting the timer if idle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn install(&self, filter: Filter) -> u64 {
        let kind = filter.kind();
        let mut registry = self.inner.registry();
        let id = registry.insert(filter);
        if registry.timer.is_none() {
            registry.timer_epoch += 1;
            let epoch = registry.timer_epoch;
            let handle = tokio::spawn(poll_loop(
                Arc::downgrade(&self.inner),
                epoch,
                self.inner.config.poll_interval,
            ));
            registry.timer = Some(PollTimer { epoch, handle });
            info!(epoch, interval = ?self.inner.config.poll_interval, "filter polling started");
        }
        info!(id, %kind, "filter installed");
        id
    }

    pub fn new_log_filter(&self, criteria: LogFilter) -> u64 {
        self.install(Filter::logs(criteria))
    }

    pub fn new_block_filter(&self) -> u64 {
        self.install(Filter::block())
    }

    pub fn new_pending_transaction_filter(&self) -> u64 {
        self.install(Filter::pending_transactions())
    }

    /// Remove filter `id`. Returns `false` if no such filter was installed.
    pub fn uninstall(&self, id: u64) -> bool {
        let mut registry = self.inner.registry();
        let removed = registry.filters.remove(&id).is_some();
        if removed {
            info!(id, "filter uninstalled");
            if registry.filters.is_empty() {
                registry.stop_timer();
            }
        }
        removed
    }

    /// Drain the changes buffered for filter `id` and refresh its TTL.
    pub fn changes(&self, id: u64) -> Result<FilterChanges, ProviderError> {
        let mut registry = self.inner.registry();
        let installed = registry.filters.get_mut(&id).ok_or(ProviderError::FilterNotFound(id))?;
        installed.last_read = Instant::now();
        Ok(installed.filter.drain())
    }

    /// Every log matching log filter `id`, fetched with its stored criteria.
    pub async fn logs(&self, id: u64) -> Result<Vec<LogEntry>, ProviderError> {
        let criteria = {
            let registry = self.inner.registry();
            registry
                .filters
                .get(&id)
                .and_then(|f| f.filter.criteria().cloned())
                .ok_or(ProviderError::FilterNotFound(id))?
        };
        self.inner.client.logs(LogQuery::from(criteria)).await
    }

    /// Run one poll immediately, independent of the timer.
    pub async fn poll_once(&self) {
        self.inner.poll(None).await;
    }

    pub fn is_polling(&self) -> bool {
        self.inner.registry().timer.is_some()
    }

    /// Number of installed filters.
    pub fn len(&self) -> usize {
        self.inner.registry().filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for FilterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterEngine")
            .field("filters", &self.len())
            .field("polling", &self.is_polling())
            .finish()
    }
}
