//! Core abstractions shared by every venue connector: the connector trait,
//! error type, downstream bus channels, the symbol registry contract and the
//! bounded book-event pool.

mod bus;
mod cache;
mod connector;
mod error;
mod pool;
mod registry;

pub use bus::{
    book_update_channel, order_event_channel, trade_channel, BookUpdateBus, BookUpdateReceiver,
    OrderEventBus, OrderEventReceiver, PooledBookUpdate, TradeBus, TradeReceiver,
};
pub use cache::SymbolCache;
pub use connector::ExchangeConnector;
pub use error::ConnectorError;
pub use pool::{EventPool, PoolHandle, Poolable};
pub use registry::{MemorySymbolRegistry, SymbolRegistry};
