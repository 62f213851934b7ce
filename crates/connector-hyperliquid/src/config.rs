use crate::signer::SignerConfig;
use connector_core::ConnectorError;
use secrecy::SecretString;

#[derive(Debug, Clone)]
pub struct HyperliquidConfig {
    pub ws_endpoint: String,
    /// Coins to subscribe, e.g. `["BTC", "ETH"]`.
    pub symbols: Vec<String>,
    pub reconnect_delay_ms: u64,
}

impl Default for HyperliquidConfig {
    fn default() -> Self {
        Self {
            ws_endpoint: "wss://api.hyperliquid.xyz/ws".to_string(),
            symbols: Vec::new(),
            reconnect_delay_ms: 1000,
        }
    }
}

impl HyperliquidConfig {
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.ws_endpoint.is_empty() {
            return Err(ConnectorError::InvalidConfig("ws endpoint is empty".into()));
        }
        if self.symbols.iter().any(|s| s.is_empty()) {
            return Err(ConnectorError::InvalidConfig("symbol name is empty".into()));
        }
        Ok(())
    }
}

/// Executor-side configuration: endpoints, wallet key handed to the signer
/// daemon, and optional vault address.
#[derive(Clone)]
pub struct HyperliquidExecutorConfig {
    pub exchange_endpoint: String,
    pub info_endpoint: String,
    /// Hex private key forwarded to the external signer per request.
    pub private_key: SecretString,
    pub vault_address: Option<String>,
    pub is_mainnet: bool,
    pub signer: SignerConfig,
}

impl HyperliquidExecutorConfig {
    pub fn new(private_key: impl Into<String>) -> Self {
        Self {
            exchange_endpoint: "https://api.hyperliquid.xyz/exchange".to_string(),
            info_endpoint: "https://api.hyperliquid.xyz/info".to_string(),
            private_key: SecretString::from(private_key.into()),
            vault_address: None,
            is_mainnet: true,
            signer: SignerConfig::default(),
        }
    }
}

impl std::fmt::Debug for HyperliquidExecutorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperliquidExecutorConfig")
            .field("exchange_endpoint", &self.exchange_endpoint)
            .field("info_endpoint", &self.info_endpoint)
            .field("private_key", &"[REDACTED]")
            .field("vault_address", &self.vault_address)
            .field("is_mainnet", &self.is_mainnet)
            .finish()
    }
}
