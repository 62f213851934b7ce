//! Downstream bus channels.
//!
//! The buses are external collaborators; connectors only need a sink that
//! accepts an event with backpressure. Bounded mpsc senders model that: a
//! publish awaits channel capacity, and a closed receiver tells the worker to
//! stop.

use crate::pool::PoolHandle;
use model::{BookUpdateEvent, OrderEvent, TradeEvent};
use tokio::sync::mpsc;

/// A book event travelling with its pool slot.
pub type PooledBookUpdate = PoolHandle<BookUpdateEvent>;

pub type BookUpdateBus = mpsc::Sender<PooledBookUpdate>;
pub type BookUpdateReceiver = mpsc::Receiver<PooledBookUpdate>;

pub type TradeBus = mpsc::Sender<TradeEvent>;
pub type TradeReceiver = mpsc::Receiver<TradeEvent>;

pub type OrderEventBus = mpsc::Sender<OrderEvent>;
pub type OrderEventReceiver = mpsc::Receiver<OrderEvent>;

pub fn book_update_channel(capacity: usize) -> (BookUpdateBus, BookUpdateReceiver) {
    mpsc::channel(capacity)
}

pub fn trade_channel(capacity: usize) -> (TradeBus, TradeReceiver) {
    mpsc::channel(capacity)
}

pub fn order_event_channel(capacity: usize) -> (OrderEventBus, OrderEventReceiver) {
    mpsc::channel(capacity)
}
