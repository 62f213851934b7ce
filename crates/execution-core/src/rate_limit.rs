//! Token-bucket rate limiting for order submission.

use crate::error::ExecError;
use model::OrderId;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Continuous-refill token bucket over a monotonic clock. Tokens never exceed
/// capacity.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        let capacity = f64::from(capacity);
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now
            .checked_duration_since(self.last_refill)
            .unwrap_or_default();
        let to_add = elapsed.as_secs_f64() * self.refill_per_sec;
        if to_add > 0.0 {
            self.tokens = (self.tokens + to_add).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// Take one token if available.
    pub fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Take one token regardless of balance (used after a deficit wait).
    pub fn force_acquire(&mut self) {
        self.refill();
        self.tokens = (self.tokens - 1.0).max(0.0);
    }

    /// Time until one token becomes available.
    pub fn time_until_available(&mut self) -> Duration {
        self.refill();
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((1.0 - self.tokens) / self.refill_per_sec)
    }

    pub fn available(&mut self) -> f64 {
        self.refill();
        self.tokens
    }
}

/// What to do when the bucket is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitMode {
    /// Reject the operation now.
    Reject,
    /// Sleep by the token deficit, then proceed.
    Wait,
    /// Notify the caller and reject.
    Callback,
}

pub type RateLimitCallback = Arc<dyn Fn(OrderId, Duration) + Send + Sync>;

#[derive(Clone)]
pub struct RateLimitConfig {
    /// Max burst tokens.
    pub capacity: u32,
    /// Tokens per second.
    pub refill_per_sec: f64,
    pub mode: RateLimitMode,
    /// Invoked by [`RateLimitMode::Callback`] with the wait until a token
    /// frees up.
    pub on_rate_limited: Option<RateLimitCallback>,
}

impl std::fmt::Debug for RateLimitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitConfig")
            .field("capacity", &self.capacity)
            .field("refill_per_sec", &self.refill_per_sec)
            .field("mode", &self.mode)
            .field("on_rate_limited", &self.on_rate_limited.as_ref().map(|_| "..."))
            .finish()
    }
}

impl RateLimitConfig {
    fn validate(&self) -> Result<(), ExecError> {
        if self.capacity == 0 || self.refill_per_sec <= 0.0 {
            return Err(ExecError::InvalidConfig(
                "rate limit capacity and refill rate must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Gate consulted by an executor before each operation. Monomorphized, so a
/// disabled gate costs nothing.
pub trait RateLimitPolicy: Send + Sync + 'static {
    fn try_acquire(&self, id: OrderId) -> impl Future<Output = bool> + Send;
}

/// Disabled rate limiting: constant true, no state, no synchronization.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRateLimit;

impl RateLimitPolicy for NoRateLimit {
    fn try_acquire(&self, _id: OrderId) -> impl Future<Output = bool> + Send {
        std::future::ready(true)
    }
}

/// Active token-bucket gate with a configurable overflow mode.
pub struct ActiveRateLimit {
    bucket: Mutex<TokenBucket>,
    mode: RateLimitMode,
    on_rate_limited: Option<RateLimitCallback>,
}

impl ActiveRateLimit {
    pub fn new(config: RateLimitConfig) -> Result<Self, ExecError> {
        config.validate()?;
        Ok(Self {
            bucket: Mutex::new(TokenBucket::new(config.capacity, config.refill_per_sec)),
            mode: config.mode,
            on_rate_limited: config.on_rate_limited,
        })
    }
}

impl RateLimitPolicy for ActiveRateLimit {
    fn try_acquire(&self, id: OrderId) -> impl Future<Output = bool> + Send {
        async move {
            let wait = {
                let mut bucket = self.bucket.lock();
                if bucket.try_acquire() {
                    return true;
                }
                bucket.time_until_available()
            };

            match self.mode {
                RateLimitMode::Reject => {
                    warn!(
                        order_id = id,
                        wait_ms = wait.as_millis() as u64,
                        "rate limit exceeded, rejecting"
                    );
                    false
                }
                RateLimitMode::Wait => {
                    tokio::time::sleep(wait).await;
                    self.bucket.lock().force_acquire();
                    true
                }
                RateLimitMode::Callback => {
                    if let Some(cb) = &self.on_rate_limited {
                        cb(id, wait);
                    }
                    false
                }
            }
        }
    }
}
