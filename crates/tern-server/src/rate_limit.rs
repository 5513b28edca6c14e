use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self, rate: f64, capacity: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;

        self.tokens = (self.tokens + elapsed * rate).min(capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-connection frame-frequency guard ("hertz"). One bucket per
/// connection id, refilled at `hertz` frames per second with a burst of 2x.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<u64, TokenBucket>>>,
    rate: f64,
    capacity: f64,
}

impl RateLimiter {
    pub fn new(hertz: f64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            rate: hertz,
            capacity: hertz * 2.0,
        }
    }

    pub async fn check(&self, conn_id: u64) -> bool {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry(conn_id)
            .or_insert_with(|| TokenBucket::new(self.capacity));
        bucket.try_consume(self.rate, self.capacity)
    }

    pub async fn remove(&self, conn_id: u64) {
        self.buckets.lock().await.remove(&conn_id);
    }

    pub async fn purge_stale(&self, max_idle_secs: f64) {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        buckets.retain(|_, bucket| {
            now.duration_since(bucket.last_refill).as_secs_f64() < max_idle_secs
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_allows_burst() {
        let limiter = RateLimiter::new(2.5);

        for _ in 0..5 {
            assert!(limiter.check(1).await);
        }

        assert!(!limiter.check(1).await);
    }

    #[tokio::test]
    async fn test_rate_limiter_per_connection() {
        let limiter = RateLimiter::new(1.0);

        assert!(limiter.check(1).await);
        assert!(limiter.check(1).await);
        assert!(!limiter.check(1).await);

        assert!(limiter.check(2).await);
    }

    #[tokio::test]
    async fn test_remove_resets_budget() {
        let limiter = RateLimiter::new(1.0);
        assert!(limiter.check(7).await);
        assert!(limiter.check(7).await);
        assert!(!limiter.check(7).await);

        limiter.remove(7).await;
        assert!(limiter.check(7).await);
    }

    #[tokio::test]
    async fn test_purge_stale() {
        let limiter = RateLimiter::new(5.0);
        assert!(limiter.check(9).await);

        limiter.purge_stale(0.0).await;

        let buckets = limiter.buckets.lock().await;
        assert!(buckets.is_empty());
    }
}
