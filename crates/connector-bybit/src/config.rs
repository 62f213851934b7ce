use auth::ApiCredentials;
use connector_core::ConnectorError;
use model::InstrumentType;

/// One subscribed instrument.
#[derive(Debug, Clone)]
pub struct BybitSymbol {
    /// Venue-native name, e.g. `"BTCUSDT"`.
    pub name: String,
    pub instrument: InstrumentType,
    /// Order-book depth to subscribe at. Valid values depend on the
    /// instrument: Spot 1/50/200, Future 1/50/200/500, Option 25/100.
    pub depth: u16,
}

#[derive(Debug, Clone)]
pub struct BybitConfig {
    /// Public websocket URL, e.g. `wss://stream.bybit.com/v5/public/linear`.
    pub public_endpoint: String,
    /// Authenticated websocket URL; required when `enable_private` is set.
    pub private_endpoint: String,
    pub symbols: Vec<BybitSymbol>,
    pub reconnect_delay_ms: u64,
    pub credentials: Option<ApiCredentials>,
    pub enable_private: bool,
}

impl Default for BybitConfig {
    fn default() -> Self {
        Self {
            public_endpoint: "wss://stream.bybit.com/v5/public/linear".to_string(),
            private_endpoint: "wss://stream.bybit.com/v5/private".to_string(),
            symbols: Vec::new(),
            reconnect_delay_ms: 1000,
            credentials: None,
            enable_private: false,
        }
    }
}

impl BybitConfig {
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.public_endpoint.is_empty() {
            return Err(ConnectorError::InvalidConfig(
                "public endpoint is empty".into(),
            ));
        }
        if self.enable_private && (self.private_endpoint.is_empty() || self.credentials.is_none()) {
            return Err(ConnectorError::InvalidConfig(
                "private channel enabled without endpoint or credentials".into(),
            ));
        }

        for symbol in &self.symbols {
            if symbol.name.is_empty() {
                return Err(ConnectorError::InvalidConfig("symbol name is empty".into()));
            }
            let allowed: &[u16] = match symbol.instrument {
                InstrumentType::Spot => &[1, 50, 200],
                InstrumentType::Future | InstrumentType::Inverse => &[1, 50, 200, 500],
                InstrumentType::Option => &[25, 100],
            };
            if !allowed.contains(&symbol.depth) {
                return Err(ConnectorError::InvalidConfig(format!(
                    "symbol {} has unsupported book depth {} for {:?}",
                    symbol.name, symbol.depth, symbol.instrument
                )));
            }
        }
        Ok(())
    }
}
