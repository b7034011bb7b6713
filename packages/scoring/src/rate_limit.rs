//! Token-bucket rate limiter for real-scorer calls.
//!
//! The bucket holds up to `capacity` tokens and refills continuously at
//! `capacity` tokens per `refill_interval`. Each call takes one token,
//! waiting for a refill when the bucket is empty.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// An async token bucket.
pub struct TokenBucket {
    capacity: f64,
    tokens_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Creates a full bucket.
    ///
    /// A zero `capacity` is treated as 1; a zero `refill_interval` as 1ms.
    #[must_use]
    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        let capacity = f64::from(capacity.max(1));
        let interval = refill_interval.max(Duration::from_millis(1)).as_secs_f64();

        Self {
            capacity,
            tokens_per_sec: capacity / interval,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = elapsed
            .mul_add(self.tokens_per_sec, state.tokens)
            .min(self.capacity);
        state.last_refill = now;
    }

    /// Takes a token if one is available right now.
    pub async fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Waits until a token is available and takes it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.tokens_per_sec)
            };

            log::trace!("rate limiter empty, waiting {wait:?}");
            tokio::time::sleep(wait).await;
        }
    }
}
