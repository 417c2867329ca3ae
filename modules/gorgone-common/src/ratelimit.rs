use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Token-bucket rate limiter for outbound provider calls.
///
/// Each worker pool holds its own instance configured at startup; there are
/// no shared mutable globals. `acquire` blocks until a token is available or
/// the deadline passes, in which case the caller treats the attempt as a
/// retryable failure.
#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_per_sec: f64,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("rate limit deadline exceeded")]
pub struct DeadlineExceeded;

impl TokenBucket {
    /// `rate_per_sec` tokens accrue per second up to `burst`.
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        assert!(rate_per_sec > 0.0, "rate must be positive");
        Self {
            state: Mutex::new(BucketState {
                tokens: burst as f64,
                last_refill: Instant::now(),
            }),
            capacity: burst as f64,
            refill_per_sec: rate_per_sec,
        }
    }

    /// Take one token, waiting up to `deadline` for one to accrue.
    pub async fn acquire(&self, deadline: Duration) -> Result<(), DeadlineExceeded> {
        let started = Instant::now();
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_sec)
            };

            let remaining = deadline.saturating_sub(started.elapsed());
            if remaining.is_zero() || wait > remaining {
                return Err(DeadlineExceeded);
            }
            tokio::time::sleep(wait).await;
        }
    }

    /// Non-blocking variant used by tests and opportunistic callers.
    pub async fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_then_refill() {
        let bucket = TokenBucket::new(2.0, 3);

        // Burst drains the initial capacity.
        for _ in 0..3 {
            assert!(bucket.try_acquire().await);
        }
        assert!(!bucket.try_acquire().await);

        // One second at 2 tokens/sec refills two.
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(bucket.try_acquire().await);
        assert!(bucket.try_acquire().await);
        assert!(!bucket.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_waits_for_token() {
        let bucket = TokenBucket::new(1.0, 1);
        assert!(bucket.try_acquire().await);

        // Next acquire must wait ~1s; deadline of 2s is enough.
        bucket
            .acquire(Duration::from_secs(2))
            .await
            .expect("token should accrue within deadline");
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_fails_past_deadline() {
        let bucket = TokenBucket::new(0.1, 1); // 10s per token
        assert!(bucket.try_acquire().await);

        let result = bucket.acquire(Duration::from_secs(1)).await;
        assert_eq!(result, Err(DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_never_exceed_capacity() {
        let bucket = TokenBucket::new(100.0, 2);
        tokio::time::advance(Duration::from_secs(60)).await;

        assert!(bucket.try_acquire().await);
        assert!(bucket.try_acquire().await);
        assert!(!bucket.try_acquire().await);
    }
}
