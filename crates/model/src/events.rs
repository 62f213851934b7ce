use crate::fixed::{Price, Quantity};
use crate::types::{InstrumentType, OptionType, OrderId, Side, SymbolId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookUpdateType {
    /// Full visible depth at one instant.
    Snapshot,
    /// Only changed price levels.
    Delta,
}

/// Bid/ask levels for one symbol, either a snapshot or a delta.
#[derive(Debug, Clone)]
pub struct BookUpdate {
    pub symbol: SymbolId,
    pub instrument: InstrumentType,
    pub update_type: BookUpdateType,
    pub bids: Vec<(Price, Quantity)>,
    pub asks: Vec<(Price, Quantity)>,
    /// Venue timestamp in nanoseconds since the Unix epoch, 0 when absent.
    pub exchange_ts_ns: u64,
    pub strike: Option<Price>,
    pub expiry_ns: Option<u64>,
    pub option_type: Option<OptionType>,
}

impl Default for BookUpdate {
    fn default() -> Self {
        Self {
            symbol: SymbolId(0),
            instrument: InstrumentType::Spot,
            update_type: BookUpdateType::Snapshot,
            bids: Vec::new(),
            asks: Vec::new(),
            exchange_ts_ns: 0,
            strike: None,
            expiry_ns: None,
            option_type: None,
        }
    }
}

impl BookUpdate {
    /// Reset dynamic fields, keeping level capacity for reuse.
    pub fn clear(&mut self) {
        self.symbol = SymbolId(0);
        self.instrument = InstrumentType::Spot;
        self.update_type = BookUpdateType::Snapshot;
        self.bids.clear();
        self.asks.clear();
        self.exchange_ts_ns = 0;
        self.strike = None;
        self.expiry_ns = None;
        self.option_type = None;
    }
}

/// Pool-allocated book event with receive and publish timestamps.
#[derive(Debug, Clone, Default)]
pub struct BookUpdateEvent {
    pub update: BookUpdate,
    pub recv_ts_ns: u64,
    pub publish_ts_ns: u64,
}

impl BookUpdateEvent {
    pub fn clear(&mut self) {
        self.update.clear();
        self.recv_ts_ns = 0;
        self.publish_ts_ns = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeEvent {
    pub symbol: SymbolId,
    pub instrument: InstrumentType,
    pub price: Price,
    pub quantity: Quantity,
    pub is_buy: bool,
    /// Venue timestamp in nanoseconds since the Unix epoch, 0 when absent.
    pub exchange_ts_ns: u64,
}

/// A strategy-local order as handed to an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub symbol: SymbolId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub filled_quantity: Quantity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEventStatus {
    Submitted,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

/// Lifecycle event observed on a venue's private channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderEvent {
    pub order: Order,
    pub status: OrderEventStatus,
}
