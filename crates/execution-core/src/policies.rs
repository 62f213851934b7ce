//! Compile-time policy bundles for order executors.
//!
//! Executors are generic over `ExecutorPolicies<R, T>`; disabled policies are
//! empty structs whose methods compile to no-ops, so the enabled/disabled
//! matrix costs nothing on the disabled paths.

use crate::rate_limit::{ActiveRateLimit, NoRateLimit};
use crate::timeout::TimeoutOrderTracker;
use model::OrderId;
use std::sync::Arc;

/// Timeout bookkeeping consulted by an executor around each operation.
pub trait TimeoutTracking: Send + Sync + 'static {
    fn track_submit(&self, id: OrderId) {
        let _ = id;
    }

    fn track_cancel(&self, id: OrderId) {
        let _ = id;
    }

    fn track_replace(&self, id: OrderId) {
        let _ = id;
    }

    fn clear_pending(&self, id: OrderId) {
        let _ = id;
    }
}

/// Disabled timeout tracking.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTimeouts;

impl TimeoutTracking for NoTimeouts {}

/// Active timeout tracking over a shared [`TimeoutOrderTracker`].
#[derive(Clone)]
pub struct WithTimeouts {
    tracker: Arc<TimeoutOrderTracker>,
}

impl WithTimeouts {
    pub fn new(tracker: Arc<TimeoutOrderTracker>) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &TimeoutOrderTracker {
        &self.tracker
    }
}

impl TimeoutTracking for WithTimeouts {
    fn track_submit(&self, id: OrderId) {
        self.tracker.track_submit(id);
    }

    fn track_cancel(&self, id: OrderId) {
        self.tracker.track_cancel(id);
    }

    fn track_replace(&self, id: OrderId) {
        self.tracker.track_replace(id);
    }

    fn clear_pending(&self, id: OrderId) {
        self.tracker.clear_pending(id);
    }
}

/// Rate-limit and timeout policies composed into one bundle.
pub struct ExecutorPolicies<R, T> {
    pub rate_limit: R,
    pub timeout: T,
}

pub type NoPolicies = ExecutorPolicies<NoRateLimit, NoTimeouts>;
pub type FullPolicies = ExecutorPolicies<ActiveRateLimit, WithTimeouts>;

impl NoPolicies {
    pub fn none() -> Self {
        Self {
            rate_limit: NoRateLimit,
            timeout: NoTimeouts,
        }
    }
}

impl Default for NoPolicies {
    fn default() -> Self {
        Self::none()
    }
}

impl<R, T> ExecutorPolicies<R, T> {
    pub fn new(rate_limit: R, timeout: T) -> Self {
        Self { rate_limit, timeout }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeout::OrderTimeoutConfig;

    #[tokio::test]
    async fn test_with_timeouts_forwards() {
        let tracker = Arc::new(TimeoutOrderTracker::new(OrderTimeoutConfig::default()).unwrap());
        let policy = WithTimeouts::new(Arc::clone(&tracker));

        policy.track_submit(1);
        assert!(tracker.has_pending(1));
        policy.clear_pending(1);
        assert!(!tracker.has_pending(1));
    }

    #[test]
    fn test_disabled_timeouts_are_noops() {
        let policy = NoTimeouts;
        policy.track_submit(1);
        policy.clear_pending(1);
    }
}
