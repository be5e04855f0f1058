//! Global, token-scoped throttle shared by every worker.
//!
//! GitHub's REST API grants a fixed number of calls per rolling hour. A
//! single [`RateBudget`] instance is the sole authority over that quota —
//! every outbound call goes through it, and its accounting is refreshed from
//! the server's own rate-limit headers after each response, which always
//! win over the local estimate.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Jitter added on top of `reset_at` before refilling, so that many workers
/// waiting on the same reset don't all wake in the same instant.
const RESET_JITTER_MS: u64 = 250;

struct State {
    remaining: u32,
    reset_at: DateTime<Utc>,
    cap: u32,
}

/// A snapshot of the budget's accounting, for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSnapshot {
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Mutex-protected accountant for the remaining GitHub API calls in the
/// current hour. Cloning is cheap (`Arc` internally); every worker holds a
/// clone and calls [`RateBudget::acquire`] before issuing a request.
#[derive(Clone)]
pub struct RateBudget {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    min_intercall_spacing: StdDuration,
    last_call_at: Mutex<Option<Instant>>,
}

impl RateBudget {
    /// `cap` is the per-hour quota (5000 with a token, 60 anonymous).
    /// `min_intercall_spacing` smooths bursts on top of the quota itself.
    pub fn new(cap: u32, reset_at: DateTime<Utc>, min_intercall_spacing: StdDuration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    remaining: cap,
                    reset_at,
                    cap,
                }),
                min_intercall_spacing,
                last_call_at: Mutex::new(None),
            }),
        }
    }

    /// Reserves `n` call permits, blocking until the current hour's
    /// remaining permits are at least `n`. Also enforces the minimum
    /// inter-call spacing regardless of remaining budget.
    pub async fn acquire(&self, n: u32) {
        loop {
            {
                let mut state = self.inner.state.lock().await;
                if state.remaining >= n {
                    state.remaining -= n;
                    drop(state);
                    self.space_out().await;
                    tracing::debug!(remaining = %self.inner_remaining().await, "rate_budget.acquired");
                    return;
                }
            }
            self.wait_for_reset().await;
        }
    }

    async fn wait_for_reset(&self) {
        let reset_at = {
            let state = self.inner.state.lock().await;
            state.reset_at
        };
        let now = Utc::now();
        let wait = (reset_at - now).to_std().unwrap_or(StdDuration::ZERO) + StdDuration::from_millis(RESET_JITTER_MS);
        tracing::info!(wait_ms = wait.as_millis() as u64, "rate_wait");
        tokio::time::sleep(wait).await;

        let mut state = self.inner.state.lock().await;
        if Utc::now() >= state.reset_at {
            state.remaining = state.cap;
            state.reset_at = Utc::now() + chrono::Duration::hours(1);
        }
    }

    async fn space_out(&self) {
        let mut last_call = self.inner.last_call_at.lock().await;
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.inner.min_intercall_spacing {
                tokio::time::sleep(self.inner.min_intercall_spacing - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }

    async fn inner_remaining(&self) -> u32 {
        self.inner.state.lock().await.remaining
    }

    /// Replaces the local estimate with the server's authoritative value
    /// from a response's rate-limit headers. Always wins over the local
    /// count, since GitHub's view of the quota is ground truth.
    pub async fn observe(&self, remaining: u32, reset_at: DateTime<Utc>) {
        let mut state = self.inner.state.lock().await;
        state.remaining = remaining;
        state.reset_at = reset_at;
        tracing::debug!(remaining, %reset_at, "rate_budget.observed");
    }

    pub async fn snapshot(&self) -> RateSnapshot {
        let state = self.inner.state.lock().await;
        RateSnapshot {
            remaining: state.remaining,
            reset_at: state.reset_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn acquire_does_not_block_while_permits_remain() {
        let budget = RateBudget::new(5, Utc::now() + chrono::Duration::hours(1), StdDuration::ZERO);
        for _ in 0..5 {
            budget.acquire(1).await;
        }
        assert_eq!(budget.snapshot().await.remaining, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_blocks_until_reset_then_refills() {
        let reset_at = Utc::now() + chrono::Duration::milliseconds(50);
        let budget = RateBudget::new(5, reset_at, StdDuration::ZERO);
        budget.acquire(5).await;
        assert_eq!(budget.snapshot().await.remaining, 0);

        // This should block until the reset fires, then succeed against a
        // refilled budget.
        budget.acquire(1).await;
        let snap = budget.snapshot().await;
        assert_eq!(snap.remaining, 4);
    }

    #[tokio::test]
    async fn observe_overwrites_local_estimate_even_upward() {
        let budget = RateBudget::new(5, Utc::now() + chrono::Duration::hours(1), StdDuration::ZERO);
        budget.acquire(5).await;
        assert_eq!(budget.snapshot().await.remaining, 0);
        let new_reset = Utc::now() + chrono::Duration::minutes(30);
        budget.observe(4999, new_reset).await;
        let snap = budget.snapshot().await;
        assert_eq!(snap.remaining, 4999);
        assert_eq!(snap.reset_at, new_reset);
    }

    #[tokio::test(start_paused = true)]
    async fn min_intercall_spacing_is_enforced() {
        let budget = RateBudget::new(100, Utc::now() + chrono::Duration::hours(1), StdDuration::from_millis(50));
        let start = Instant::now();
        budget.acquire(1).await;
        budget.acquire(1).await;
        assert!(start.elapsed() >= StdDuration::from_millis(50));
    }
}
