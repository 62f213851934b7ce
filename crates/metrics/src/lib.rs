//! Thread-safe counters shared by connector workers.
//!
//! Emission (exporters, dashboards) is outside this layer; the counters exist
//! so the owning process can observe feed health.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ConnectorMetrics {
    messages_received: AtomicU64,
    parse_errors: AtomicU64,
    book_events_published: AtomicU64,
    trades_published: AtomicU64,
    pool_exhausted: AtomicU64,
    ws_errors: AtomicU64,
    reconnects: AtomicU64,
}

impl ConnectorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_messages_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_parse_errors(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_book_events_published(&self) {
        self.book_events_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_trades_published(&self) {
        self.trades_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_pool_exhausted(&self) {
        self.pool_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ws_errors(&self) {
        self.ws_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reconnects(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed)
    }

    pub fn book_events_published(&self) -> u64 {
        self.book_events_published.load(Ordering::Relaxed)
    }

    pub fn trades_published(&self) -> u64 {
        self.trades_published.load(Ordering::Relaxed)
    }

    pub fn pool_exhausted(&self) -> u64 {
        self.pool_exhausted.load(Ordering::Relaxed)
    }

    pub fn ws_errors(&self) -> u64 {
        self.ws_errors.load(Ordering::Relaxed)
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }
}

pub type SharedMetrics = Arc<ConnectorMetrics>;

pub fn shared() -> SharedMetrics {
    Arc::new(ConnectorMetrics::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let m = ConnectorMetrics::new();
        m.inc_messages_received();
        m.inc_messages_received();
        m.inc_parse_errors();
        assert_eq!(m.messages_received(), 2);
        assert_eq!(m.parse_errors(), 1);
        assert_eq!(m.reconnects(), 0);
    }
}
