//! Engine-global rate limiter.
//!
//! This limiter is global to the engine, and `reset()` is called on every
//! newly-resolved host's crawl delay — so under concurrency it effectively
//! tracks "whichever host was touched most recently", not a true per-host
//! delay. A per-host limiter keyed off `HostRecord` would be the more
//! principled design; see DESIGN.md for why the simpler shape was kept.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct State {
    min_interval: Duration,
    last_acquire: Option<Instant>,
}

pub struct RateLimiter {
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            state: Mutex::new(State {
                min_interval,
                last_acquire: None,
            }),
        }
    }

    /// Block the caller until at least `min_interval` has elapsed since the
    /// previous `acquire`.
    pub async fn acquire(&self) {
        let sleep_for = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let wait = match state.last_acquire {
                Some(last) => {
                    let elapsed = now.saturating_duration_since(last);
                    state.min_interval.saturating_sub(elapsed)
                }
                None => Duration::ZERO,
            };
            state.last_acquire = Some(now + wait);
            wait
        };
        if !sleep_for.is_zero() {
            tokio::time::sleep(sleep_for).await;
        }
    }

    /// Atomically replace the interval and clear the last-acquire time.
    pub async fn reset(&self, new_interval: Duration) {
        let mut state = self.state.lock().await;
        state.min_interval = new_interval;
        state.last_acquire = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn acquire_spaces_out_calls_by_min_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;

        assert!(Instant::now().saturating_duration_since(start) >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_last_acquire() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        limiter.acquire().await;
        limiter.reset(Duration::from_millis(1)).await;

        let start = Instant::now();
        limiter.acquire().await;
        assert!(Instant::now().saturating_duration_since(start) < Duration::from_millis(50));
    }
}
