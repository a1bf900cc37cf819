//! Temporary per-source blocks with lazy expiry.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Result of a block lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// The source is blocked for `ttl` more.
    Blocked { ttl: Duration },
    /// No active block.
    Clear,
}

impl BlockStatus {
    pub fn is_blocked(&self) -> bool {
        matches!(self, BlockStatus::Blocked { .. })
    }

    /// Remaining block time, zero when clear.
    pub fn ttl(&self) -> Duration {
        match self {
            BlockStatus::Blocked { ttl } => *ttl,
            BlockStatus::Clear => Duration::ZERO,
        }
    }
}

/// Concurrent map of source → block expiry.
#[derive(Debug, Default)]
pub struct BlockRegistry {
    expiries: DashMap<String, Instant>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a block, evicting it if it has expired.
    pub fn check_blocked(&self, source: &str, now: Instant) -> BlockStatus {
        if let Some(expiry) = self.expiries.get(source).map(|e| *e) {
            if now < expiry {
                return BlockStatus::Blocked { ttl: expiry - now };
            }
            // Only remove the entry we saw; a concurrent re-block must survive.
            self.expiries.remove_if(source, |_, current| *current == expiry);
        }
        BlockStatus::Clear
    }

    /// Block `source` until `now + duration`, replacing any existing block.
    pub fn block(&self, source: &str, now: Instant, duration: Duration) -> Instant {
        let expiry = now + duration;
        self.expiries.insert(source.to_string(), expiry);
        expiry
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }

    /// Sources with an active block and their remaining time.
    pub fn active(&self, now: Instant) -> Vec<(String, Duration)> {
        self.expiries
            .iter()
            .filter(|e| now < *e.value())
            .map(|e| (e.key().clone(), *e.value() - now))
            .collect()
    }

    /// Evict every expired block. Returns the number removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.expiries.len();
        self.expiries.retain(|_, expiry| now < *expiry);
        before.saturating_sub(self.expiries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: Duration = Duration::from_secs(30);

    #[test]
    fn test_unknown_source_is_clear() {
        let registry = BlockRegistry::new();
        assert_eq!(registry.check_blocked("10.0.0.1", Instant::now()), BlockStatus::Clear);
    }

    #[test]
    fn test_block_reports_ttl() {
        let registry = BlockRegistry::new();
        let t0 = Instant::now();
        registry.block("10.0.0.1", t0, BLOCK);

        let status = registry.check_blocked("10.0.0.1", t0 + Duration::from_secs(1));
        assert!(status.is_blocked());
        assert_eq!(status.ttl(), Duration::from_secs(29));
        assert_eq!(registry.check_blocked("10.0.0.2", t0), BlockStatus::Clear);
    }

    #[test]
    fn test_expired_entry_removed_once() {
        let registry = BlockRegistry::new();
        let t0 = Instant::now();
        registry.block("src", t0, BLOCK);
        assert_eq!(registry.len(), 1);

        let later = t0 + Duration::from_secs(31);
        assert_eq!(registry.check_blocked("src", later), BlockStatus::Clear);
        assert!(registry.is_empty());
        assert_eq!(registry.check_blocked("src", later), BlockStatus::Clear);
        assert_eq!(registry.check_blocked("src", later).ttl(), Duration::ZERO);
    }

    #[test]
    fn test_expiry_is_exclusive() {
        let registry = BlockRegistry::new();
        let t0 = Instant::now();
        registry.block("src", t0, BLOCK);
        assert_eq!(registry.check_blocked("src", t0 + BLOCK), BlockStatus::Clear);
    }

    #[test]
    fn test_reblock_overwrites() {
        let registry = BlockRegistry::new();
        let t0 = Instant::now();
        registry.block("src", t0, BLOCK);
        registry.block("src", t0 + Duration::from_secs(10), BLOCK);

        let status = registry.check_blocked("src", t0 + Duration::from_secs(35));
        assert_eq!(status.ttl(), Duration::from_secs(5));
    }

    #[test]
    fn test_purge_and_active() {
        let registry = BlockRegistry::new();
        let t0 = Instant::now();
        registry.block("a", t0, BLOCK);
        registry.block("b", t0 + Duration::from_secs(20), BLOCK);

        let now = t0 + Duration::from_secs(40);
        assert_eq!(registry.active(now), vec![("b".to_string(), Duration::from_secs(10))]);
        assert_eq!(registry.purge_expired(now), 1);
        assert_eq!(registry.len(), 1);
    }
}
