//! Per-connector symbol cache in front of the shared registry.

use model::SymbolId;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Registry lookups sit behind a shared lock; connectors keep a local
/// string-to-id cache so the hot parse path resolves without touching it.
/// Inserts are idempotent.
#[derive(Default)]
pub struct SymbolCache {
    map: Mutex<HashMap<String, SymbolId>>,
}

impl SymbolCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<SymbolId> {
        self.map.lock().get(symbol).copied()
    }

    pub fn insert(&self, symbol: &str, id: SymbolId) {
        self.map.lock().entry(symbol.to_string()).or_insert(id);
    }

    /// Cached id, or resolve through `f` and remember the result.
    pub fn get_or_resolve(&self, symbol: &str, f: impl FnOnce() -> SymbolId) -> SymbolId {
        if let Some(id) = self.get(symbol) {
            return id;
        }
        let id = f();
        self.insert(symbol, id);
        id
    }
}
