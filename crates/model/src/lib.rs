//! Shared market and order model for the venue connectors.

mod events;
mod fixed;
mod time;
mod types;

pub use events::{
    BookUpdate, BookUpdateEvent, BookUpdateType, Order, OrderEvent, OrderEventStatus, TradeEvent,
};
pub use fixed::{Fixed, FixedParseError, Price, Quantity, Volume};
pub use time::{now_ms, now_ns};
pub use types::{InstrumentType, OptionType, OrderId, Side, SymbolId, SymbolInfo};
