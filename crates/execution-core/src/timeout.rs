//! Deadline tracking for in-flight submit/cancel/replace operations.
//!
//! Executors call `track_*` before dispatching a REST call and
//! `clear_pending` from both outcome paths. A background checker wakes every
//! `check_interval`, extracts expired entries under the lock, and applies the
//! configured policy after releasing it.

use crate::error::ExecError;
use model::OrderId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Action taken when a venue fails to answer within the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// Log and move on.
    LogOnly,
    /// Invoke `on_reject` so the caller can mark the local order rejected.
    Reject,
    /// Invoke `on_timeout` for custom handling.
    Callback,
    /// Log as reconcile-needed, then invoke `on_timeout` so the caller can
    /// poll the venue.
    Reconcile,
}

/// Invoked with the order id and the operation name (`"submit"`, `"cancel"`,
/// `"replace"`) or the reject reason (`"<op> timeout"`).
pub type TimeoutCallback = Arc<dyn Fn(OrderId, &str) + Send + Sync>;

#[derive(Clone)]
pub struct OrderTimeoutConfig {
    pub submit_timeout: Duration,
    pub cancel_timeout: Duration,
    pub replace_timeout: Duration,
    pub check_interval: Duration,
    pub policy: TimeoutPolicy,
    pub on_timeout: Option<TimeoutCallback>,
    pub on_reject: Option<TimeoutCallback>,
}

impl Default for OrderTimeoutConfig {
    fn default() -> Self {
        Self {
            submit_timeout: Duration::from_millis(5000),
            cancel_timeout: Duration::from_millis(3000),
            replace_timeout: Duration::from_millis(5000),
            check_interval: Duration::from_millis(100),
            policy: TimeoutPolicy::Reject,
            on_timeout: None,
            on_reject: None,
        }
    }
}

impl std::fmt::Debug for OrderTimeoutConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderTimeoutConfig")
            .field("submit_timeout", &self.submit_timeout)
            .field("cancel_timeout", &self.cancel_timeout)
            .field("replace_timeout", &self.replace_timeout)
            .field("check_interval", &self.check_interval)
            .field("policy", &self.policy)
            .finish()
    }
}

impl OrderTimeoutConfig {
    fn validate(&self) -> Result<(), ExecError> {
        let positive = [
            self.submit_timeout,
            self.cancel_timeout,
            self.replace_timeout,
            self.check_interval,
        ]
        .iter()
        .all(|d| !d.is_zero());
        if !positive {
            return Err(ExecError::InvalidConfig(
                "timeouts and check interval must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpType {
    Submit,
    Cancel,
    Replace,
}

impl OpType {
    fn as_str(self) -> &'static str {
        match self {
            OpType::Submit => "submit",
            OpType::Cancel => "cancel",
            OpType::Replace => "replace",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingOp {
    op: OpType,
    started: Instant,
}

struct TrackerInner {
    config: OrderTimeoutConfig,
    pending: Mutex<HashMap<OrderId, PendingOp>>,
}

impl TrackerInner {
    fn timeout_for(&self, op: OpType) -> Duration {
        match op {
            OpType::Submit => self.config.submit_timeout,
            OpType::Cancel => self.config.cancel_timeout,
            OpType::Replace => self.config.replace_timeout,
        }
    }

    fn check_timeouts(&self) {
        let now = Instant::now();
        let mut timed_out = Vec::new();
        {
            let mut pending = self.pending.lock();
            pending.retain(|id, op| {
                let elapsed = now.saturating_duration_since(op.started);
                if elapsed >= self.timeout_for(op.op) {
                    timed_out.push((*id, op.op));
                    false
                } else {
                    true
                }
            });
        }

        // Policy actions run without the lock so callbacks may re-enter.
        for (id, op) in timed_out {
            let op_name = op.as_str();
            match self.config.policy {
                TimeoutPolicy::LogOnly => {
                    warn!(order_id = id, op = op_name, "operation timed out");
                }
                TimeoutPolicy::Reject => {
                    warn!(order_id = id, op = op_name, "rejecting timed out operation");
                    if let Some(on_reject) = &self.config.on_reject {
                        on_reject(id, &format!("{op_name} timeout"));
                    }
                }
                TimeoutPolicy::Callback => {
                    if let Some(on_timeout) = &self.config.on_timeout {
                        on_timeout(id, op_name);
                    } else {
                        warn!(order_id = id, op = op_name, "timeout with no callback");
                    }
                }
                TimeoutPolicy::Reconcile => {
                    info!(order_id = id, op = op_name, "reconcile needed");
                    if let Some(on_timeout) = &self.config.on_timeout {
                        on_timeout(id, op_name);
                    }
                }
            }
        }
    }
}

/// Tracks in-flight order operations and fires the configured policy action
/// when a venue fails to respond within the deadline.
pub struct TimeoutOrderTracker {
    inner: Arc<TrackerInner>,
    worker: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl TimeoutOrderTracker {
    /// Fails on non-positive timeouts; no checker is spawned until `start`.
    pub fn new(config: OrderTimeoutConfig) -> Result<Self, ExecError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(TrackerInner {
                config,
                pending: Mutex::new(HashMap::new()),
            }),
            worker: Mutex::new(None),
        })
    }

    /// Spawn the checker task. Idempotent.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(run_checker(inner, shutdown_rx));
        *worker = Some((shutdown_tx, handle));
    }

    /// Stop and join the checker. Idempotent.
    pub async fn stop(&self) {
        let taken = self.worker.lock().take();
        if let Some((shutdown_tx, handle)) = taken {
            let _ = shutdown_tx.send(true);
            let _ = handle.await;
        }
    }

    /// Track a submit. Re-tracking an id replaces its pending entry.
    pub fn track_submit(&self, id: OrderId) {
        self.track(id, OpType::Submit);
    }

    pub fn track_cancel(&self, id: OrderId) {
        self.track(id, OpType::Cancel);
    }

    pub fn track_replace(&self, id: OrderId) {
        self.track(id, OpType::Replace);
    }

    fn track(&self, id: OrderId, op: OpType) {
        self.inner.pending.lock().insert(
            id,
            PendingOp {
                op,
                started: Instant::now(),
            },
        );
    }

    /// Remove a pending entry. Unknown ids are a no-op.
    pub fn clear_pending(&self, id: OrderId) {
        self.inner.pending.lock().remove(&id);
    }

    pub fn has_pending(&self, id: OrderId) -> bool {
        self.inner.pending.lock().contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }
}

impl Drop for TimeoutOrderTracker {
    fn drop(&mut self) {
        if let Some((shutdown_tx, handle)) = self.worker.lock().take() {
            let _ = shutdown_tx.send(true);
            handle.abort();
        }
    }
}

async fn run_checker(inner: Arc<TrackerInner>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(inner.config.check_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                inner.check_timeouts();
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    fn recorder() -> (TimeoutCallback, Arc<PlMutex<Vec<(OrderId, String)>>>) {
        let seen: Arc<PlMutex<Vec<(OrderId, String)>>> = Arc::new(PlMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let cb: TimeoutCallback = Arc::new(move |id, reason| {
            sink.lock().push((id, reason.to_string()));
        });
        (cb, seen)
    }

    #[test]
    fn test_rejects_non_positive_config() {
        let config = OrderTimeoutConfig {
            submit_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(TimeoutOrderTracker::new(config).is_err());
    }

    #[tokio::test]
    async fn test_reject_policy_fires_once() {
        let (on_reject, seen) = recorder();
        let tracker = TimeoutOrderTracker::new(OrderTimeoutConfig {
            submit_timeout: Duration::from_millis(100),
            check_interval: Duration::from_millis(10),
            policy: TimeoutPolicy::Reject,
            on_reject: Some(on_reject),
            ..Default::default()
        })
        .unwrap();
        tracker.start();

        tracker.track_submit(42);
        tokio::time::sleep(Duration::from_millis(250)).await;

        let recorded = seen.lock().clone();
        assert_eq!(recorded, vec![(42, "submit timeout".to_string())]);

        // Already fired: entry gone, clear is a no-op.
        assert!(!tracker.has_pending(42));
        tracker.clear_pending(42);
        assert_eq!(tracker.pending_count(), 0);

        tracker.stop().await;
    }

    #[tokio::test]
    async fn test_clear_pending_prevents_timeout() {
        let (on_timeout, seen) = recorder();
        let tracker = TimeoutOrderTracker::new(OrderTimeoutConfig {
            submit_timeout: Duration::from_millis(50),
            check_interval: Duration::from_millis(10),
            policy: TimeoutPolicy::Callback,
            on_timeout: Some(on_timeout),
            ..Default::default()
        })
        .unwrap();
        tracker.start();

        tracker.track_submit(1);
        tracker.clear_pending(1);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(seen.lock().is_empty());
        tracker.stop().await;
    }

    #[tokio::test]
    async fn test_retrack_replaces_entry() {
        let tracker = TimeoutOrderTracker::new(OrderTimeoutConfig::default()).unwrap();
        tracker.track_submit(5);
        tracker.track_cancel(5);
        assert_eq!(tracker.pending_count(), 1);
        assert!(tracker.has_pending(5));
    }

    #[tokio::test]
    async fn test_callback_policy_passes_op_name() {
        let (on_timeout, seen) = recorder();
        let tracker = TimeoutOrderTracker::new(OrderTimeoutConfig {
            cancel_timeout: Duration::from_millis(40),
            check_interval: Duration::from_millis(10),
            policy: TimeoutPolicy::Callback,
            on_timeout: Some(on_timeout),
            ..Default::default()
        })
        .unwrap();
        tracker.start();

        tracker.track_cancel(9);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(seen.lock().clone(), vec![(9, "cancel".to_string())]);
        tracker.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let tracker = TimeoutOrderTracker::new(OrderTimeoutConfig::default()).unwrap();
        tracker.start();
        tracker.start();
        tracker.stop().await;
        tracker.stop().await;
    }
}
