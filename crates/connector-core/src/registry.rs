//! Symbol registry contract and a simple in-memory implementation.

use model::{SymbolId, SymbolInfo};
use parking_lot::RwLock;
use std::collections::HashMap;

/// External lookup table mapping `(venue, symbol-string)` to a dense
/// [`SymbolId`] plus instrument metadata.
///
/// Resolution is stable: once a pair resolves to an id, every later
/// resolution returns the same id.
pub trait SymbolRegistry: Send + Sync {
    fn get_symbol_id(&self, exchange: &str, symbol: &str) -> Option<SymbolId>;

    /// Register a symbol, returning its id. Registering an already-known
    /// `(venue, symbol)` pair returns the existing id unchanged.
    fn register_symbol(&self, info: SymbolInfo) -> SymbolId;

    fn get_symbol_info(&self, id: SymbolId) -> Option<SymbolInfo>;
}

/// In-memory registry used in tests and single-process wiring.
#[derive(Default)]
pub struct MemorySymbolRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    by_key: HashMap<(String, String), SymbolId>,
    infos: Vec<SymbolInfo>,
}

impl MemorySymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SymbolRegistry for MemorySymbolRegistry {
    fn get_symbol_id(&self, exchange: &str, symbol: &str) -> Option<SymbolId> {
        self.inner
            .read()
            .by_key
            .get(&(exchange.to_string(), symbol.to_string()))
            .copied()
    }

    fn register_symbol(&self, info: SymbolInfo) -> SymbolId {
        let mut inner = self.inner.write();
        let key = (info.exchange.clone(), info.symbol.clone());
        if let Some(id) = inner.by_key.get(&key) {
            return *id;
        }
        let id = SymbolId(inner.infos.len() as u32);
        inner.infos.push(info);
        inner.by_key.insert(key, id);
        id
    }

    fn get_symbol_info(&self, id: SymbolId) -> Option<SymbolInfo> {
        self.inner.read().infos.get(id.0 as usize).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::InstrumentType;

    #[test]
    fn test_register_is_idempotent() {
        let registry = MemorySymbolRegistry::new();
        let a = registry.register_symbol(SymbolInfo::new("bybit", "BTCUSDT", InstrumentType::Spot));
        let b = registry.register_symbol(SymbolInfo::new("bybit", "BTCUSDT", InstrumentType::Spot));
        assert_eq!(a, b);
        assert_eq!(registry.get_symbol_id("bybit", "BTCUSDT"), Some(a));
    }

    #[test]
    fn test_distinct_venues_get_distinct_ids() {
        let registry = MemorySymbolRegistry::new();
        let a = registry.register_symbol(SymbolInfo::new("bybit", "BTCUSDT", InstrumentType::Spot));
        let b = registry.register_symbol(SymbolInfo::new("bitget", "BTCUSDT", InstrumentType::Spot));
        assert_ne!(a, b);

        let info = registry.get_symbol_info(b).unwrap();
        assert_eq!(info.exchange, "bitget");
    }

    #[test]
    fn test_unknown_lookups() {
        let registry = MemorySymbolRegistry::new();
        assert!(registry.get_symbol_id("bybit", "ETHUSDT").is_none());
        assert!(registry.get_symbol_info(SymbolId(9)).is_none());
    }
}
