//! Polymarket market-data connector: CLOB book snapshots and trades.

mod config;
mod connector;
mod parser;

pub use config::PolymarketConfig;
pub use connector::{PolymarketConnector, BOOK_POOL_CAPACITY};
pub use parser::{parse_message, BookFrame, PolyMessage, TradeFrame};
