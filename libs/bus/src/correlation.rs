//! # Time-Bounded Correlation Table
//!
//! Maps a correlation code to whatever is waiting for the matching response.
//!
//! - Every entry lives for a fixed TTL from insertion
//! - Expired entries are invisible to lookups even before they are swept
//! - Each insertion sweeps at most `sweep_depth` of the oldest entries, so
//!   cleanup cost is spread over writers instead of a background timer
//! - [`CorrelationTable::purge_expired`] runs a full sweep for idle tables

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Default lifetime of a pending entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15);

/// Default number of sweep passes per insertion.
pub const DEFAULT_SWEEP_DEPTH: usize = 2;

struct Slot<V> {
    value: V,
    inserted_at: Instant,
    seq: u64,
}

struct Inner<V> {
    slots: HashMap<i64, Slot<V>>,
    /// Insertion order, oldest first. Entries may point at slots that were
    /// already taken or replaced; `seq` tells them apart.
    order: VecDeque<(Instant, i64, u64)>,
    next_seq: u64,
}

impl<V> Inner<V> {
    fn is_live(&self, code: i64, now: Instant, ttl: Duration) -> bool {
        self.slots
            .get(&code)
            .is_some_and(|slot| now.duration_since(slot.inserted_at) < ttl)
    }

    /// Evict expired entries from the front of the insertion order.
    fn sweep(&mut self, now: Instant, ttl: Duration, max_passes: Option<usize>) -> Vec<V> {
        let mut evicted = Vec::new();
        let mut passes = 0;

        while let Some(&(inserted_at, code, seq)) = self.order.front() {
            if max_passes.is_some_and(|max| passes >= max) {
                break;
            }
            if now.duration_since(inserted_at) < ttl {
                break;
            }

            self.order.pop_front();
            passes += 1;

            if self.slots.get(&code).is_some_and(|slot| slot.seq == seq) {
                if let Some(slot) = self.slots.remove(&code) {
                    evicted.push(slot.value);
                }
            }
        }

        evicted
    }

    fn insert(&mut self, code: i64, value: V, now: Instant) -> Option<V> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.order.push_back((now, code, seq));
        self.slots
            .insert(
                code,
                Slot {
                    value,
                    inserted_at: now,
                    seq,
                },
            )
            .map(|old| old.value)
    }
}

/// Thread-safe, time-bounded map from correlation code to caller context.
///
/// Values are never inspected or mutated by the table. Values that leave the
/// table through eviction are dropped after the lock is released.
pub struct CorrelationTable<V> {
    ttl: Duration,
    sweep_depth: usize,
    inner: Mutex<Inner<V>>,
}

impl<V> CorrelationTable<V> {
    /// Create a table with the default TTL and sweep depth.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_TTL, DEFAULT_SWEEP_DEPTH)
    }

    /// Create a table with a custom TTL and sweep depth (at least 1).
    #[must_use]
    pub fn with_config(ttl: Duration, sweep_depth: usize) -> Self {
        Self {
            ttl,
            sweep_depth: sweep_depth.max(1),
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                order: VecDeque::new(),
                next_seq: 0,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store `value` under `code`, replacing any previous entry.
    pub fn put(&self, code: i64, value: V) {
        let now = Instant::now();
        let (_evicted, _replaced) = {
            let mut inner = self.inner.lock();
            let evicted = inner.sweep(now, self.ttl, Some(self.sweep_depth));
            let replaced = inner.insert(code, value, now);
            (evicted, replaced)
        };
    }

    /// Store `value` under a freshly generated code and return the code.
    ///
    /// The code is nonzero and unique among live entries.
    pub fn insert_fresh(&self, value: V) -> i64 {
        let now = Instant::now();
        let (code, _evicted, _replaced) = {
            let mut inner = self.inner.lock();
            let evicted = inner.sweep(now, self.ttl, Some(self.sweep_depth));
            let code = loop {
                let candidate: i64 = rand::random();
                if candidate != 0 && !inner.is_live(candidate, now, self.ttl) {
                    break candidate;
                }
            };
            let replaced = inner.insert(code, value, now);
            (code, evicted, replaced)
        };
        code
    }

    /// Remove and return the entry for `code` if it has not expired.
    pub fn try_take(&self, code: i64) -> Option<V> {
        let now = Instant::now();
        let slot = self.inner.lock().slots.remove(&code)?;
        if now.duration_since(slot.inserted_at) < self.ttl {
            Some(slot.value)
        } else {
            None
        }
    }

    /// Drop the entry for `code`. Returns whether a live entry was removed.
    pub fn remove(&self, code: i64) -> bool {
        self.try_take(code).is_some()
    }

    pub fn contains(&self, code: i64) -> bool {
        self.inner.lock().is_live(code, Instant::now(), self.ttl)
    }

    /// Sweep every expired entry. Returns how many were evicted.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let evicted = self.inner.lock().sweep(now, self.ttl, None);
        evicted.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let inner = self.inner.lock();
        inner
            .slots
            .values()
            .filter(|slot| now.duration_since(slot.inserted_at) < self.ttl)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Abandon every entry.
    pub fn clear(&self) {
        let _abandoned = {
            let mut inner = self.inner.lock();
            inner.order.clear();
            std::mem::take(&mut inner.slots)
        };
    }
}

impl<V> Default for CorrelationTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const TTL: Duration = Duration::from_secs(15);

    fn stored<V>(table: &CorrelationTable<V>) -> usize {
        table.inner.lock().slots.len()
    }

    #[tokio::test(start_paused = true)]
    async fn take_returns_value_once() {
        let table = CorrelationTable::new();
        table.put(7, "ctx");

        assert_eq!(table.try_take(7), Some("ctx"));
        assert_eq!(table.try_take(7), None);
        assert!(table.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn put_is_last_write_wins() {
        let table = CorrelationTable::new();
        table.put(1, "first");
        table.put(1, "second");

        assert_eq!(table.len(), 1);
        assert_eq!(table.try_take(1), Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_absent_before_sweep() {
        let table = CorrelationTable::with_config(TTL, 2);
        table.put(5, ());

        tokio::time::advance(TTL).await;

        assert_eq!(stored(&table), 1);
        assert!(!table.contains(5));
        assert_eq!(table.len(), 0);
        assert_eq!(table.try_take(5), None);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_just_inside_ttl_is_live() {
        let table = CorrelationTable::with_config(TTL, 2);
        table.put(5, ());

        tokio::time::advance(TTL - Duration::from_millis(1)).await;

        assert_eq!(table.try_take(5), Some(()));
    }

    #[tokio::test(start_paused = true)]
    async fn insertion_sweeps_at_most_depth_entries() {
        let table = CorrelationTable::with_config(TTL, 2);
        for code in 1..=5 {
            table.put(code, code);
        }

        tokio::time::advance(TTL).await;
        table.put(100, 100);

        // 5 expired - 2 swept + 1 new
        assert_eq!(stored(&table), 4);
        assert_eq!(table.len(), 1);

        table.put(101, 101);
        assert_eq!(stored(&table), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_every_expired_entry() {
        let table = CorrelationTable::with_config(TTL, 1);
        for code in 1..=10 {
            table.put(code, ());
        }
        tokio::time::advance(TTL / 2).await;
        table.put(11, ());
        tokio::time::advance(TTL / 2).await;

        assert_eq!(table.purge_expired(), 10);
        assert_eq!(stored(&table), 1);
        assert!(table.contains(11));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_skips_replaced_entries() {
        let table = CorrelationTable::with_config(TTL, 2);
        table.put(3, "old");

        tokio::time::advance(TTL / 2).await;
        table.put(3, "new");

        tokio::time::advance(TTL / 2).await;
        // The first insertion's order record is expired, the slot is not
        table.put(4, "other");

        assert_eq!(table.try_take(3), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn remove_reports_live_entries() {
        let table = CorrelationTable::new();
        table.put(9, ());

        assert!(table.remove(9));
        assert!(!table.remove(9));
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_codes_are_nonzero_and_distinct() {
        let table = CorrelationTable::new();
        let codes: std::collections::HashSet<i64> =
            (0..1000).map(|i| table.insert_fresh(i)).collect();

        assert_eq!(codes.len(), 1000);
        assert!(!codes.contains(&0));
        assert_eq!(table.len(), 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn evicted_values_are_dropped() {
        let marker = Arc::new(());
        let table = CorrelationTable::with_config(TTL, 2);
        table.put(1, Arc::clone(&marker));

        tokio::time::advance(TTL).await;
        table.purge_expired();

        assert_eq!(Arc::strong_count(&marker), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_abandons_everything() {
        let table = CorrelationTable::new();
        table.put(1, ());
        table.put(2, ());
        table.clear();

        assert!(table.is_empty());
        assert_eq!(table.purge_expired(), 0);
    }

    #[test]
    fn concurrent_put_and_take() {
        let table = Arc::new(CorrelationTable::<u64>::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    for i in 0..1000u64 {
                        let code = (t * 10_000 + i + 1) as i64;
                        table.put(code, i);
                        assert_eq!(table.try_take(code), Some(i));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(table.is_empty());
    }
}
