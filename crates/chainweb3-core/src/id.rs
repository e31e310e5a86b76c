//! Request id generation.

use std::sync::atomic::{AtomicU32, Ordering};

/// Thread-safe monotonic JSON-RPC id source.
///
/// Ids start at 1 and wrap from `u32::MAX` back to 1; 0 is never issued.
/// A single counter is shared by every component of a provider stack so
/// that ids stay unique across middlewares.
#[derive(Debug, Default)]
pub struct RequestIdCounter {
    last: AtomicU32,
}

impl RequestIdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter whose next id is `last + 1` (or 1 if `last == u32::MAX`).
    pub fn starting_after(last: u32) -> Self {
        Self { last: AtomicU32::new(last) }
    }

    /// Allocate the next id.
    pub fn next(&self) -> u64 {
        let prev = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(successor(v)))
            .unwrap_or_else(|v| v);
        u64::from(successor(prev))
    }
}

fn successor(v: u32) -> u32 {
    if v == u32::MAX {
        1
    } else {
        v + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn starts_at_one() {
        let ids = RequestIdCounter::new();
        assert_eq!(ids.next(), 1);
        assert_eq!(ids.next(), 2);
    }

    #[test]
    fn wraps_to_one_not_zero() {
        let ids = RequestIdCounter::starting_after(u32::MAX - 1);
        assert_eq!(ids.next(), u64::from(u32::MAX));
        assert_eq!(ids.next(), 1);
        assert_eq!(ids.next(), 2);
    }

    #[test]
    fn unique_across_threads() {
        let ids = Arc::new(RequestIdCounter::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..1000).map(|_| ids.next()).collect::<Vec<_>>())
            })
            .collect();
        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(id != 0);
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
