use auth::ApiCredentials;
use connector_core::ConnectorError;
use model::InstrumentType;

/// One subscribed instrument. `depth` of 0 subscribes the full `books`
/// channel; 1, 5 and 15 subscribe the partial `books{N}` channels.
#[derive(Debug, Clone)]
pub struct BitgetSymbol {
    pub name: String,
    pub instrument: InstrumentType,
    pub depth: u16,
}

/// Order-placement parameters shared by every request of one executor.
#[derive(Debug, Clone)]
pub struct BitgetParams {
    pub product_type: String,
    pub margin_mode: String,
    pub margin_coin: String,
    /// Time-in-force sent as `force`.
    pub force: String,
}

impl Default for BitgetParams {
    fn default() -> Self {
        Self {
            product_type: "USDT-FUTURES".to_string(),
            margin_mode: "crossed".to_string(),
            margin_coin: "USDT".to_string(),
            force: "gtc".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BitgetConfig {
    pub public_endpoint: String,
    pub private_endpoint: String,
    pub symbols: Vec<BitgetSymbol>,
    pub reconnect_delay_ms: u64,
    pub credentials: Option<ApiCredentials>,
    pub enable_private: bool,
}

impl Default for BitgetConfig {
    fn default() -> Self {
        Self {
            public_endpoint: "wss://ws.bitget.com/v2/ws/public".to_string(),
            private_endpoint: "wss://ws.bitget.com/v2/ws/private".to_string(),
            symbols: Vec::new(),
            reconnect_delay_ms: 1000,
            credentials: None,
            enable_private: false,
        }
    }
}

impl BitgetConfig {
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.public_endpoint.is_empty() {
            return Err(ConnectorError::InvalidConfig(
                "public endpoint is empty".into(),
            ));
        }
        if self.enable_private {
            let has_passphrase = self
                .credentials
                .as_ref()
                .is_some_and(|c| c.expose_passphrase().is_some());
            if self.private_endpoint.is_empty() || !has_passphrase {
                return Err(ConnectorError::InvalidConfig(
                    "private channel requires endpoint, key, secret and passphrase".into(),
                ));
            }
        }
        for symbol in &self.symbols {
            if symbol.name.is_empty() {
                return Err(ConnectorError::InvalidConfig("symbol name is empty".into()));
            }
            if ![0, 1, 5, 15].contains(&symbol.depth) {
                return Err(ConnectorError::InvalidConfig(format!(
                    "symbol {} has unsupported book depth {}",
                    symbol.name, symbol.depth
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_validation() {
        for depth in [0u16, 1, 5, 15] {
            let config = BitgetConfig {
                symbols: vec![BitgetSymbol {
                    name: "BTCUSDT".into(),
                    instrument: InstrumentType::Future,
                    depth,
                }],
                ..Default::default()
            };
            assert!(config.validate().is_ok());
        }

        let config = BitgetConfig {
            symbols: vec![BitgetSymbol {
                name: "BTCUSDT".into(),
                instrument: InstrumentType::Future,
                depth: 50,
            }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_private_requires_passphrase() {
        let config = BitgetConfig {
            enable_private: true,
            credentials: Some(ApiCredentials::new("k".into(), "s".into())),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BitgetConfig {
            enable_private: true,
            credentials: Some(ApiCredentials::with_passphrase(
                "k".into(),
                "s".into(),
                "p".into(),
            )),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
