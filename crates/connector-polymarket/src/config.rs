use connector_core::ConnectorError;

#[derive(Debug, Clone)]
pub struct PolymarketConfig {
    pub ws_endpoint: String,
    /// CLOB token ids to subscribe to.
    pub token_ids: Vec<String>,
    pub reconnect_delay_ms: u64,
    pub ping_interval_sec: u64,
}

impl Default for PolymarketConfig {
    fn default() -> Self {
        Self {
            ws_endpoint: "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string(),
            token_ids: Vec::new(),
            reconnect_delay_ms: 1000,
            ping_interval_sec: 5,
        }
    }
}

impl PolymarketConfig {
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.ws_endpoint.is_empty() {
            return Err(ConnectorError::InvalidConfig("ws endpoint is empty".into()));
        }
        Ok(())
    }
}
