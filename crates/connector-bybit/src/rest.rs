//! HMAC-signed REST client for the Bybit v5 order endpoints.

use auth::{bybit_preimage, hmac_sha256_hex, ApiCredentials, BYBIT_RECV_WINDOW};
use model::now_ms;
use net::{Transport, TransportError};
use std::sync::Arc;

pub struct BybitRestClient {
    credentials: ApiCredentials,
    endpoint: String,
    transport: Arc<dyn Transport>,
}

impl BybitRestClient {
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
    /// `ts || api_key || recv_window || body`, byte for byte.
    pub async fn post(&self, path: &str, body: String) -> Result<String, TransportError> {
        let timestamp = now_ms().to_string();
        let preimage = bybit_preimage(
            &timestamp,
            self.credentials.api_key(),
            BYBIT_RECV_WINDOW,
            &body,
        );
        let signature = hmac_sha256_hex(self.credentials.expose_secret(), &preimage);

        let headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            (
                "X-BAPI-API-KEY".to_string(),
                self.credentials.api_key().to_string(),
            ),
            ("X-BAPI-SIGN".to_string(), signature),
            ("X-BAPI-SIGN-TYPE".to_string(), "2".to_string()),
            ("X-BAPI-TIMESTAMP".to_string(), timestamp),
            (
                "X-BAPI-RECV-WINDOW".to_string(),
                BYBIT_RECV_WINDOW.to_string(),
            ),
        ];

        let url = format!("{}{}", self.endpoint, path);
        self.transport.post(&url, body, &headers).await
    }
}
