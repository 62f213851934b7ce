use async_trait::async_trait;
use model::{Order, OrderId};

/// Venue order executor. All three operations return immediately; outcomes
/// are delivered asynchronously through the order tracker.
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn submit_order(&self, order: Order);

    async fn cancel_order(&self, id: OrderId);

    async fn replace_order(&self, old_id: OrderId, new_order: Order);
}
