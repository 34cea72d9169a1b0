//! Token bucket rate limiter for Claude API requests.

use std::time::Instant;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

/// Token bucket with continuous refill.
///
/// Capacity equals the refill rate, so short bursts up to one second of
/// budget are allowed and the sustained rate converges to
/// `requests_per_second`.
pub struct TokenBucketRateLimiter {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucketRateLimiter {
    pub fn new(requests_per_second: f64) -> Self {
        assert!(
            requests_per_second > 0.0,
            "requests_per_second must be positive"
        );
        Self {
            state: Mutex::new(BucketState {
                tokens: requests_per_second,
                last_refill: Instant::now(),
            }),
            capacity: requests_per_second,
            refill_rate: requests_per_second,
        }
    }

    /// Wait until a token is available, then consume it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                let refilled = (state.tokens + elapsed * self.refill_rate).min(self.capacity);

                if refilled >= 1.0 {
                    state.tokens = refilled - 1.0;
                    state.last_refill = now;
                    return;
                }

                state.tokens = refilled;
                state.last_refill = now;
                (1.0 - refilled) / self.refill_rate
            };
            sleep(Duration::from_secs_f64(wait.min(1.0))).await;
        }
    }
}
