use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Process-wide traffic counters. The admission controller only reads
/// `tx()`; handlers own the increments so the count stays accurate on every
/// dispatch path, including the overload-ack path.
#[derive(Debug, Default)]
pub struct Stats {
    in_flight: AtomicI64,
    inbound_bytes: AtomicU64,
}

impl Stats {
    /// Handlers currently in flight.
    pub fn tx(&self) -> i64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn tx_do(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tx_done(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    /// Accumulates inbound payload bytes.
    pub fn ib(&self, n: u64) {
        self.inbound_bytes.fetch_add(n, Ordering::Relaxed);
    }

    pub fn ib_total(&self) -> u64 {
        self.inbound_bytes.load(Ordering::Relaxed)
    }
}

/// RAII pairing of `tx_do`/`tx_done`, so the counter is released on every
/// exit path, panics included.
pub struct TxGuard {
    stats: Arc<Stats>,
}

impl TxGuard {
    pub fn new(stats: Arc<Stats>) -> Self {
        stats.tx_do();
        Self { stats }
    }
}

impl Drop for TxGuard {
    fn drop(&mut self) {
        self.stats.tx_done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_counting() {
        let stats = Stats::default();
        assert_eq!(stats.tx(), 0);
        stats.tx_do();
        stats.tx_do();
        assert_eq!(stats.tx(), 2);
        stats.tx_done();
        assert_eq!(stats.tx(), 1);
    }

    #[test]
    fn test_ib_accumulates() {
        let stats = Stats::default();
        stats.ib(10);
        stats.ib(32);
        assert_eq!(stats.ib_total(), 42);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let stats = Arc::new(Stats::default());
        {
            let _g = TxGuard::new(stats.clone());
            assert_eq!(stats.tx(), 1);
        }
        assert_eq!(stats.tx(), 0);
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let stats = Arc::new(Stats::default());
        let inner = stats.clone();
        let _ = std::panic::catch_unwind(move || {
            let _g = TxGuard::new(inner);
            panic!("boom");
        });
        assert_eq!(stats.tx(), 0);
    }
}
