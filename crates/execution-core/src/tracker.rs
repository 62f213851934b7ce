//! Order tracker contract and an in-memory implementation.
//!
//! The tracker is the source of truth for per-order state; executors advance
//! it only on venue-confirmed success.

use dashmap::DashMap;
use model::{Order, OrderId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderLifecycle {
    PreSubmit,
    Submitted,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderLifecycle {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Rejected | Self::Expired
        )
    }
}

#[derive(Debug, Clone)]
pub struct OrderState {
    pub local_order: Order,
    pub exchange_order_id: Option<String>,
    /// Caller-chosen id used by wallet-signed venues for cancel/replace.
    pub client_order_id: Option<String>,
    pub status: OrderLifecycle,
}

/// External mutable map of `OrderId -> OrderState`, advanced by executor
/// continuations and private-channel events.
pub trait OrderTracker: Send + Sync {
    fn on_submitted(&self, order: &Order, exchange_order_id: &str, client_order_id: Option<&str>);

    fn on_canceled(&self, id: OrderId);

    fn on_replaced(
        &self,
        old_id: OrderId,
        new_order: &Order,
        exchange_order_id: &str,
        client_order_id: Option<&str>,
    );

    fn get(&self, id: OrderId) -> Option<OrderState>;
}

/// Concurrent in-memory tracker for tests and single-process wiring.
#[derive(Default)]
pub struct InMemoryOrderTracker {
    orders: DashMap<OrderId, OrderState>,
}

impl InMemoryOrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a local order before it is handed to an executor.
    pub fn pre_register(&self, order: Order) {
        self.orders.insert(
            order.id,
            OrderState {
                local_order: order,
                exchange_order_id: None,
                client_order_id: None,
                status: OrderLifecycle::PreSubmit,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

impl OrderTracker for InMemoryOrderTracker {
    fn on_submitted(&self, order: &Order, exchange_order_id: &str, client_order_id: Option<&str>) {
        self.orders.insert(
            order.id,
            OrderState {
                local_order: *order,
                exchange_order_id: (!exchange_order_id.is_empty())
                    .then(|| exchange_order_id.to_string()),
                client_order_id: client_order_id.map(str::to_string),
                status: OrderLifecycle::Submitted,
            },
        );
    }

    fn on_canceled(&self, id: OrderId) {
        if let Some(mut state) = self.orders.get_mut(&id) {
            state.status = OrderLifecycle::Canceled;
        }
    }

    fn on_replaced(
        &self,
        old_id: OrderId,
        new_order: &Order,
        exchange_order_id: &str,
        client_order_id: Option<&str>,
    ) {
        self.orders.remove(&old_id);
        self.on_submitted(new_order, exchange_order_id, client_order_id);
    }

    fn get(&self, id: OrderId) -> Option<OrderState> {
        self.orders.get(&id).map(|s| s.value().clone())
    }
}
