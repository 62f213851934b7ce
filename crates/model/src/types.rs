use crate::fixed::Price;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense identifier assigned by the symbol registry.
///
/// One-to-one with a `(venue, symbol-string)` pair for the lifetime of the
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Locally assigned order identifier.
pub type OrderId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentType {
    Spot,
    Future,
    Inverse,
    Option,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionType {
    Call,
    Put,
}

/// Instrument metadata kept by the symbol registry.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    /// Venue name, e.g. `"bybit"`.
    pub exchange: String,
    /// Venue-native symbol string, e.g. `"BTCUSDT"`.
    pub symbol: String,
    pub instrument: InstrumentType,
    /// Strike price; options only.
    pub strike: Option<Price>,
    /// Expiry as nanoseconds since the Unix epoch; options only.
    pub expiry_ns: Option<u64>,
    pub option_type: Option<OptionType>,
}

impl SymbolInfo {
    /// Plain (non-option) instrument.
    pub fn new(exchange: impl Into<String>, symbol: impl Into<String>, instrument: InstrumentType) -> Self {
        Self {
            exchange: exchange.into(),
            symbol: symbol.into(),
            instrument,
            strike: None,
            expiry_ns: None,
            option_type: None,
        }
    }
}
