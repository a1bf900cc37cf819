//! Per-source sliding-window activity tracking.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Suspicious-event timestamps for one source, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ActivityRecord {
    events: VecDeque<Instant>,
}

impl ActivityRecord {
    /// Drop events older than `window` relative to `now`.
    pub fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.events.front() {
            if now.saturating_duration_since(oldest) > window {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    /// Insert an event at `now`, prune, and return the events still in the window.
    ///
    /// Events stay sorted even when callers race and arrive slightly out of order.
    pub fn record(&mut self, now: Instant, window: Duration) -> usize {
        let position = self
            .events
            .iter()
            .rposition(|&t| t <= now)
            .map_or(0, |p| p + 1);
        self.events.insert(position, now);
        self.prune(now, window);
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Newest recorded event.
    pub fn last_seen(&self) -> Option<Instant> {
        self.events.back().copied()
    }
}

/// Concurrent map of source → activity record.
///
/// Each source's record is guarded by its map entry, so a record is only
/// ever mutated by one caller at a time.
#[derive(Debug, Default)]
pub struct ActivityTracker {
    records: DashMap<String, ActivityRecord>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a suspicious event and return the count inside the window.
    pub fn record_event(&self, source: &str, now: Instant, window: Duration) -> usize {
        self.with_record(source, |record| record.record(now, window))
    }

    /// Run `f` with exclusive access to the source's record, creating it if needed.
    ///
    /// The entry stays locked for the duration of `f`. `f` must not touch this
    /// tracker again.
    pub fn with_record<R>(&self, source: &str, f: impl FnOnce(&mut ActivityRecord) -> R) -> R {
        let mut entry = self.records.entry(source.to_string()).or_default();
        f(entry.value_mut())
    }

    /// Number of events currently stored for `source` (without pruning).
    pub fn count(&self, source: &str) -> usize {
        self.records.get(source).map(|r| r.len()).unwrap_or(0)
    }

    /// Number of sources with a record.
    pub fn sources(&self) -> usize {
        self.records.len()
    }

    /// Remove sources whose newest event has left the window. Returns the number removed.
    pub fn purge_idle(&self, now: Instant, window: Duration) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| {
            record.prune(now, window);
            !record.is_empty()
        });
        before.saturating_sub(self.records.len())
    }
}
