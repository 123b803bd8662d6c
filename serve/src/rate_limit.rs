//! Per-user, per-route-group token buckets. Kept deliberately simple: a
//! fixed capacity refilled at a fixed rate, guarded by a `Mutex` per bucket —
//! the same shape as [`pipeline::gate::GateCoordinator`]'s waiter map, just
//! for throttling instead of gating.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A named group of routes that share one rate-limit budget per user (e.g.
/// "pipeline-control" for start/respond, "read" for polling routes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteGroup {
    PipelineControl,
    Read,
    Sse,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket limiter keyed by `(user_id, RouteGroup)`.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    buckets: Mutex<HashMap<(String, RouteGroup), Bucket>>,
}

impl RateLimiter {
    pub fn new(capacity: u32, refill_per_sec: u32) -> Self {
        Self {
            capacity: capacity as f64,
            refill_per_sec: refill_per_sec as f64,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Attempts to take one token for `user_id` in `group`. Returns `true` if
    /// the request is admitted, `false` if the caller should be told to back
    /// off (429).
    pub fn try_admit(&self, user_id: &str, group: RouteGroup) -> bool {
        let mut buckets = self.buckets.lock().unwrap();
        let now = Instant::now();
        let bucket = buckets
            .entry((user_id.to_string(), group))
            .or_insert_with(|| Bucket {
                tokens: self.capacity,
                last_refill: now,
            });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_capacity_then_refuses() {
        let limiter = RateLimiter::new(2, 1);
        assert!(limiter.try_admit("u1", RouteGroup::Read));
        assert!(limiter.try_admit("u1", RouteGroup::Read));
        assert!(!limiter.try_admit("u1", RouteGroup::Read));
    }

    #[test]
    fn buckets_are_independent_per_user_and_group() {
        let limiter = RateLimiter::new(1, 1);
        assert!(limiter.try_admit("u1", RouteGroup::Read));
        assert!(limiter.try_admit("u2", RouteGroup::Read));
        assert!(limiter.try_admit("u1", RouteGroup::PipelineControl));
    }

    #[test]
    fn refill_restores_tokens_over_time() {
        let limiter = RateLimiter::new(1, 1_000_000);
        assert!(limiter.try_admit("u1", RouteGroup::Read));
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.try_admit("u1", RouteGroup::Read));
    }
}
