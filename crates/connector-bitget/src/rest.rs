//! HMAC-signed REST client for the Bitget v2 mix order endpoints.

use auth::{bitget_preimage, hmac_sha256_base64, ApiCredentials};
use model::now_ms;
use net::{Transport, TransportError};
use std::sync::Arc;

pub struct BitgetRestClient {
    credentials: ApiCredentials,
    endpoint: String,
    transport: Arc<dyn Transport>,
}

impl BitgetRestClient {
    pub fn new(
        credentials: ApiCredentials,
        endpoint: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            credentials,
            endpoint: endpoint.into(),
            transport,
        }
    }

    /// Sign and POST a JSON body. The signed pre-image is
    /// `ts || "POST" || path || body`; the signature is base64 of the raw
    /// HMAC digest.
    pub async fn post(&self, path: &str, body: String) -> Result<String, TransportError> {
        let timestamp = now_ms().to_string();
        let preimage = bitget_preimage(&timestamp, "POST", path, &body);
        let signature = hmac_sha256_base64(self.credentials.expose_secret(), &preimage);

        let headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            (
                "ACCESS-KEY".to_string(),
                self.credentials.api_key().to_string(),
            ),
            ("ACCESS-SIGN".to_string(), signature),
            ("ACCESS-TIMESTAMP".to_string(), timestamp),
            (
                "ACCESS-PASSPHRASE".to_string(),
                self.credentials
                    .expose_passphrase()
                    .unwrap_or_default()
                    .to_string(),
            ),
        ];

        let url = format!("{}{}", self.endpoint, path);
        self.transport.post(&url, body, &headers).await
    }
}
