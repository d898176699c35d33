//! Token bucket admission control for the Alibaba Cloud APIs.
//!
//! The bucket holds at most `burst` tokens and a background task adds one token
//! every `1s / requests_per_second`. A tick that finds the bucket full is
//! dropped, so sustained throughput never exceeds the configured rate while
//! bursts up to `burst` calls are admitted at once.

use crate::error::{
    ClientError,
    Result,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::Semaphore,
    time::{
        interval_at,
        Instant,
        MissedTickBehavior,
    },
};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct RateLimiter {
    tokens: Arc<Semaphore>,
    burst: usize,
    period: Duration,
    shutdown: CancellationToken,
}

impl RateLimiter {
    /// Starts the refill task, so this must be called inside a tokio runtime.
    /// Zero values are raised to one.
    pub fn new(requests_per_second: u32, burst: u32) -> Self {
        let requests_per_second = requests_per_second.max(1);
        let burst = burst.max(1) as usize;
        let period = Duration::from_secs(1) / requests_per_second;
        let tokens = Arc::new(Semaphore::new(burst));
        let shutdown = CancellationToken::new();

        tokio::spawn(refill(tokens.clone(), burst, period, shutdown.clone()));
        debug!(requests_per_second, burst, "Rate limiter started");

        Self {
            tokens,
            burst,
            period,
            shutdown,
        }
    }

    /// Takes one token, waiting at most `max_wait` for the next refill.
    pub async fn acquire(&self, cancel: &CancellationToken, max_wait: Duration) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            acquired = tokio::time::timeout(max_wait, self.tokens.acquire()) => match acquired {
                Ok(Ok(permit)) => {
                    permit.forget();
                    Ok(())
                }
                Ok(Err(_)) => Err(ClientError::RateLimiterClosed),
                Err(_) => {
                    trace!(?max_wait, "Rate limiter wait timed out");
                    Err(ClientError::RateLimitTimeout)
                }
            },
        }
    }

    pub fn available(&self) -> usize {
        self.tokens.available_permits()
    }

    pub fn burst(&self) -> usize {
        self.burst
    }

    pub fn refill_period(&self) -> Duration {
        self.period
    }

    /// Stops the refill task. Waiting and later `acquire` calls fail with
    /// [`ClientError::RateLimiterClosed`]. Calling it again has no effect.
    pub fn close(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        self.tokens.close();
        debug!("Rate limiter closed");
    }

    pub fn is_closed(&self) -> bool {
        self.tokens.is_closed()
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn refill(tokens: Arc<Semaphore>, burst: usize, period: Duration, shutdown: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                // Only this task adds tokens, so the check cannot race past `burst`.
                if tokens.available_permits() < burst {
                    tokens.add_permits(1);
                }
            }
        }
    }

    trace!("Rate limiter refill task stopped");
}
