//! Primary rate budget tracking
//!
//! The remote API allows a fixed number of search calls per time window
//! and reports the remaining allowance in response headers. The budget is
//! the one piece of mutable state shared by all crawl workers, so it lives
//! behind an async mutex; a worker that finds the budget exhausted sleeps
//! until the window resets without holding the lock.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Searches per minute the platform allows with an access token.
pub const AUTHENTICATED_SEARCHES_PER_MINUTE: u32 = 30;

/// Searches per minute the platform allows anonymously.
pub const UNAUTHENTICATED_SEARCHES_PER_MINUTE: u32 = 10;

/// Fallback window length when no reset header has been seen yet.
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Call budget for the current rate-limit window.
#[derive(Debug)]
struct RateBudget {
    /// Calls left in the current window, locally decremented per call and
    /// corrected from response headers.
    remaining: u32,

    /// When the window resets, if known.
    reset_at: Option<Instant>,

    /// Allowance assumed for a fresh window.
    window_limit: u32,
}

impl RateBudget {
    fn new(window_limit: u32) -> Self {
        Self {
            remaining: window_limit,
            reset_at: None,
            window_limit,
        }
    }

    /// Takes one call from the budget, or returns how long to wait before
    /// trying again.
    fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        if let Some(reset) = self.reset_at {
            if now >= reset {
                self.remaining = self.window_limit;
                self.reset_at = None;
            }
        }

        if self.remaining > 0 {
            self.remaining -= 1;
            return Ok(());
        }

        // No reset time known: assume a full window from now so the next
        // attempt replenishes.
        let reset = *self.reset_at.get_or_insert(now + DEFAULT_WINDOW);
        Err(reset.saturating_duration_since(now))
    }

    fn note_response(&mut self, remaining: u32, reset_after: Option<Duration>, now: Instant) {
        self.remaining = remaining;
        if let Some(after) = reset_after {
            self.reset_at = Some(now + after);
        }
    }
}

/// Shared handle to the rate budget, cloneable across workers.
#[derive(Debug, Clone)]
pub struct SharedBudget {
    inner: Arc<Mutex<RateBudget>>,
}

impl SharedBudget {
    pub fn new(window_limit: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateBudget::new(window_limit))),
        }
    }

    /// Suspends until one call's worth of budget is available, then
    /// consumes it. The lock is never held across a sleep.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut budget = self.inner.lock().await;
                match budget.try_take(Instant::now()) {
                    Ok(()) => return,
                    Err(wait) => wait,
                }
            };

            tracing::debug!(
                "Search budget exhausted, waiting {:?} for the window to reset",
                wait
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Feeds the allowance reported by a response back into the budget.
    pub async fn note_response(&self, remaining: u32, reset_after: Option<Duration>) {
        let mut budget = self.inner.lock().await;
        budget.note_response(remaining, reset_after, Instant::now());
    }
}
