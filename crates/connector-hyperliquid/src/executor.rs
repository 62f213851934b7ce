//! Hyperliquid order executor: wallet-signed actions over REST.

use crate::config::HyperliquidExecutorConfig;
use crate::signer::{SignRequest, Signer, SignerDaemonClient};
use async_trait::async_trait;
use connector_core::SymbolRegistry;
use execution_core::{
    ExecutorPolicies, NoRateLimit, NoTimeouts, OrderExecutor, OrderTracker, RateLimitPolicy,
    TimeoutTracking,
};
use model::{now_ms, Order, OrderId, Side};
use net::Transport;
use parking_lot::Mutex;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Coin name to venue asset index, populated lazily from `/info` metadata.
struct AssetMap {
    map: Mutex<HashMap<String, u32>>,
    loaded: AtomicBool,
}

impl AssetMap {
    fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
            loaded: AtomicBool::new(false),
        }
    }

    fn get(&self, coin: &str) -> Option<u32> {
        self.map.lock().get(coin).copied()
    }
}

#[derive(Deserialize)]
struct RawMeta {
    universe: Vec<RawAsset>,
}

#[derive(Deserialize)]
struct RawAsset {
    name: String,
}

#[derive(Deserialize)]
struct RawExchangeResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    response: serde_json::Value,
}

/// Submit acknowledgement: `status == "ok"` and
/// `response.data.statuses[0]` carrying `resting.oid` or `filled.oid`.
fn parse_submit_ack(body: &str) -> Result<String, String> {
    let response: RawExchangeResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed response: {e}"))?;
    if response.status != "ok" {
        return Err(format!("status={}", response.status));
    }

    let status0 = &response.response["data"]["statuses"][0];
    if let Some(err) = status0.get("error").and_then(|e| e.as_str()) {
        return Err(err.to_string());
    }
    let oid = status0["resting"]["oid"]
        .as_u64()
        .or_else(|| status0["filled"]["oid"].as_u64())
        .ok_or_else(|| "no oid in response".to_string())?;
    Ok(oid.to_string())
}

/// Cancel/modify acknowledgement: top-level `status == "ok"`.
fn parse_status_ok(body: &str) -> Result<(), String> {
    let response: RawExchangeResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed response: {e}"))?;
    if response.status != "ok" {
        return Err(format!("status={}", response.status));
    }
    Ok(())
}

/// 128-bit hex client order id, `0x` prefixed.
fn generate_cloid() -> String {
    format!("0x{:032x}", uuid::Uuid::new_v4().as_u128())
}

pub struct HyperliquidOrderExecutor<R = NoRateLimit, T = NoTimeouts>
where
    R: RateLimitPolicy,
    T: TimeoutTracking,
{
    config: HyperliquidExecutorConfig,
    signer: Arc<dyn Signer>,
    transport: Arc<dyn Transport>,
    registry: Arc<dyn SymbolRegistry>,
    tracker: Arc<dyn OrderTracker>,
    policies: ExecutorPolicies<R, T>,
    assets: AssetMap,
}

impl<R: RateLimitPolicy, T: TimeoutTracking> HyperliquidOrderExecutor<R, T> {
    /// Executor wired to the external signer daemon from the config.
    pub fn with_daemon_signer(
        config: HyperliquidExecutorConfig,
        transport: Arc<dyn Transport>,
        registry: Arc<dyn SymbolRegistry>,
        tracker: Arc<dyn OrderTracker>,
        policies: ExecutorPolicies<R, T>,
    ) -> Self {
        let signer = Arc::new(SignerDaemonClient::new(config.signer.clone()));
        Self::new(config, signer, transport, registry, tracker, policies)
    }

    pub fn new(
        config: HyperliquidExecutorConfig,
        signer: Arc<dyn Signer>,
        transport: Arc<dyn Transport>,
        registry: Arc<dyn SymbolRegistry>,
        tracker: Arc<dyn OrderTracker>,
        policies: ExecutorPolicies<R, T>,
    ) -> Self {
        Self {
            config,
            signer,
            transport,
            registry,
            tracker,
            policies,
            assets: AssetMap::new(),
        }
    }

    /// Fetch the asset universe once; later calls are free.
    async fn ensure_assets_loaded(&self) {
        if self.assets.loaded.swap(true, Ordering::SeqCst) {
            return;
        }
        let headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        match self
            .transport
            .post(
                &self.config.info_endpoint,
                r#"{"type":"meta"}"#.to_string(),
                &headers,
            )
            .await
        {
            Ok(body) => match serde_json::from_str::<RawMeta>(&body) {
                Ok(meta) => {
                    let mut map = self.assets.map.lock();
                    for (index, asset) in meta.universe.iter().enumerate() {
                        map.insert(asset.name.clone(), index as u32);
                    }
                    info!(assets = map.len(), "asset map loaded");
                }
                Err(e) => {
                    // Allow a retry on the next operation.
                    self.assets.loaded.store(false, Ordering::SeqCst);
                    warn!(error = %e, "meta parse error");
                }
            },
            Err(e) => {
                self.assets.loaded.store(false, Ordering::SeqCst);
                warn!(error = %e, "meta fetch failed");
            }
        }
    }

    fn order_json(&self, asset: u32, order: &Order, cloid: &str) -> serde_json::Value {
        serde_json::json!({
            "a": asset,
            "b": order.side == Side::Buy,
            "p": order.price.to_string(),
            "s": order.quantity.to_string(),
            "r": false,
            "t": {"limit": {"tif": "Gtc"}},
            "c": cloid,
        })
    }

    /// Sign `action` and wrap it into the exchange request body.
    async fn signed_body(&self, action: &serde_json::Value, nonce: u64) -> Option<String> {
        let action_json = action.to_string();
        let signature = match self
            .signer
            .sign(SignRequest {
                action_json: &action_json,
                nonce,
                is_mainnet: self.config.is_mainnet,
                private_key: self.config.private_key.expose_secret(),
                active_pool: self.config.vault_address.as_deref(),
                expires_after: None,
            })
            .await
        {
            Ok(signature) => signature,
            Err(e) => {
                error!(error = %e, "signing failed");
                return None;
            }
        };

        let mut body = serde_json::json!({
            "action": action,
            "nonce": nonce,
            "signature": {
                "r": signature.r,
                "s": signature.s,
                "v": signature.v,
            },
        });
        if let Some(vault) = &self.config.vault_address {
            body["vaultAddress"] = serde_json::Value::from(vault.clone());
        }
        Some(body.to_string())
    }

    fn asset_for(&self, symbol: model::SymbolId) -> Option<(String, u32)> {
        let info = self.registry.get_symbol_info(symbol)?;
        let asset = self.assets.get(&info.symbol)?;
        Some((info.symbol, asset))
    }
}

#[async_trait]
impl<R: RateLimitPolicy, T: TimeoutTracking> OrderExecutor for HyperliquidOrderExecutor<R, T> {
    async fn submit_order(&self, order: Order) {
        if !self.policies.rate_limit.try_acquire(order.id).await {
            return;
        }
        self.ensure_assets_loaded().await;
        let Some((coin, asset)) = self.asset_for(order.symbol) else {
            error!(symbol = %order.symbol, "unknown symbol or asset id not cached");
            return;
        };

        let cloid = generate_cloid();
        let action = serde_json::json!({
            "type": "order",
            "orders": [self.order_json(asset, &order, &cloid)],
            "grouping": "na",
        });
        let nonce = now_ms();

        let Some(body) = self.signed_body(&action, nonce).await else {
            return;
        };

        info!(order_id = order.id, coin = %coin, cloid = %cloid, "submitting order");

        let headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        self.policies.timeout.track_submit(order.id);
        match self
            .transport
            .post(&self.config.exchange_endpoint, body, &headers)
            .await
        {
            Ok(response) => {
                self.policies.timeout.clear_pending(order.id);
                match parse_submit_ack(&response) {
                    Ok(exchange_order_id) => {
                        info!(
                            order_id = order.id,
                            exchange_order_id = %exchange_order_id,
                            "order submitted"
                        );
                        self.tracker
                            .on_submitted(&order, &exchange_order_id, Some(&cloid));
                    }
                    Err(e) => {
                        error!(order_id = order.id, error = %e, "order submission failed");
                    }
                }
            }
            Err(e) => {
                self.policies.timeout.clear_pending(order.id);
                error!(order_id = order.id, error = %e, "submit transport error");
            }
        }
    }

    async fn cancel_order(&self, id: OrderId) {
        if !self.policies.rate_limit.try_acquire(id).await {
            return;
        }
        self.ensure_assets_loaded().await;
        let Some(state) = self.tracker.get(id) else {
            error!(order_id = id, "cannot cancel unknown order");
            return;
        };
        let Some(cloid) = state.client_order_id else {
            error!(order_id = id, "cannot cancel without client order id");
            return;
        };
        let Some((_, asset)) = self.asset_for(state.local_order.symbol) else {
            error!(symbol = %state.local_order.symbol, "unknown symbol or asset id not cached");
            return;
        };

        let action = serde_json::json!({
            "type": "cancelByCloid",
            "cancels": [{"asset": asset, "cloid": cloid}],
        });
        let nonce = now_ms();
        let Some(body) = self.signed_body(&action, nonce).await else {
            return;
        };

        let headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        self.policies.timeout.track_cancel(id);
        match self
            .transport
            .post(&self.config.exchange_endpoint, body, &headers)
            .await
        {
            Ok(response) => {
                self.policies.timeout.clear_pending(id);
                match parse_status_ok(&response) {
                    Ok(()) => {
                        info!(order_id = id, "cancel successful");
                        self.tracker.on_canceled(id);
                    }
                    Err(e) => {
                        error!(order_id = id, error = %e, "cancel failed");
                    }
                }
            }
            Err(e) => {
                self.policies.timeout.clear_pending(id);
                error!(order_id = id, error = %e, "cancel transport error");
            }
        }
    }

    async fn replace_order(&self, old_id: OrderId, new_order: Order) {
        if !self.policies.rate_limit.try_acquire(old_id).await {
            return;
        }
        self.ensure_assets_loaded().await;
        let Some(state) = self.tracker.get(old_id) else {
            error!(order_id = old_id, "cannot replace unknown order");
            return;
        };
        let Some(exchange_order_id) = state.exchange_order_id else {
            error!(order_id = old_id, "cannot replace before exchange ack");
            return;
        };
        let Ok(oid) = exchange_order_id.parse::<u64>() else {
            error!(order_id = old_id, exchange_order_id = %exchange_order_id, "non-numeric oid");
            return;
        };
        let Some(cloid) = state.client_order_id else {
            error!(order_id = old_id, "cannot replace without client order id");
            return;
        };
        let Some((_, asset)) = self.asset_for(new_order.symbol) else {
            error!(symbol = %new_order.symbol, "unknown symbol or asset id not cached");
            return;
        };

        let action = serde_json::json!({
            "type": "modify",
            "oid": oid,
            "order": self.order_json(asset, &new_order, &cloid),
        });
        let nonce = now_ms();
        let Some(body) = self.signed_body(&action, nonce).await else {
            return;
        };

        let headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        self.policies.timeout.track_replace(old_id);
        match self
            .transport
            .post(&self.config.exchange_endpoint, body, &headers)
            .await
        {
            Ok(response) => {
                self.policies.timeout.clear_pending(old_id);
                match parse_status_ok(&response) {
                    Ok(()) => {
                        info!(order_id = old_id, "replace successful");
                        self.tracker.on_replaced(
                            old_id,
                            &new_order,
                            &exchange_order_id,
                            Some(&cloid),
                        );
                    }
                    Err(e) => {
                        error!(order_id = old_id, error = %e, "replace failed");
                    }
                }
            }
            Err(e) => {
                self.policies.timeout.clear_pending(old_id);
                error!(order_id = old_id, error = %e, "replace transport error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{HlSignature, SignerError};
    use connector_core::MemorySymbolRegistry;
    use execution_core::{InMemoryOrderTracker, OrderLifecycle};
    use model::{InstrumentType, Price, Quantity, SymbolId, SymbolInfo};
    use net::TransportError;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct MockSigner {
        fail: bool,
    }

    #[async_trait]
    impl Signer for MockSigner {
        async fn sign(&self, request: SignRequest<'_>) -> Result<HlSignature, SignerError> {
            if self.fail {
                return Err(SignerError::Unavailable("down".into()));
            }
            assert!(!request.action_json.is_empty());
            Ok(HlSignature {
                r: "0xr".into(),
                s: "0xs".into(),
                v: 27,
            })
        }
    }

    struct MockTransport {
        responses: Mutex<VecDeque<Result<String, TransportError>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl MockTransport {
        fn new(responses: Vec<Result<String, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn post(
            &self,
            url: &str,
            body: String,
            _headers: &[(String, String)],
        ) -> Result<String, TransportError> {
            self.calls.lock().push((url.to_string(), body));
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(r#"{"status":"ok"}"#.to_string()))
        }

        async fn post_with_timeout(
            &self,
            url: &str,
            body: String,
            headers: &[(String, String)],
            _request_timeout: Duration,
        ) -> Result<String, TransportError> {
            self.post(url, body, headers).await
        }
    }

    const META: &str = r#"{"universe":[{"name":"BTC"},{"name":"ETH"}]}"#;
    const SUBMIT_OK: &str =
        r#"{"status":"ok","response":{"data":{"statuses":[{"resting":{"oid":7718}}]}}}"#;

    fn setup(
        transport: Arc<MockTransport>,
        signer_fails: bool,
    ) -> (
        HyperliquidOrderExecutor,
        Arc<InMemoryOrderTracker>,
        SymbolId,
    ) {
        let registry = Arc::new(MemorySymbolRegistry::new());
        let symbol = registry.register_symbol(SymbolInfo::new(
            "hyperliquid",
            "ETH",
            InstrumentType::Future,
        ));
        let tracker = Arc::new(InMemoryOrderTracker::new());
        let executor = HyperliquidOrderExecutor::new(
            HyperliquidExecutorConfig::new("deadbeef"),
            Arc::new(MockSigner { fail: signer_fails }),
            transport,
            registry as Arc<dyn SymbolRegistry>,
            Arc::clone(&tracker) as Arc<dyn OrderTracker>,
            ExecutorPolicies::none(),
        );
        (executor, tracker, symbol)
    }

    fn order(id: OrderId, symbol: SymbolId) -> Order {
        Order {
            id,
            symbol,
            side: Side::Buy,
            price: "2000.5".parse().unwrap(),
            quantity: "1.5".parse().unwrap(),
            filled_quantity: Quantity::ZERO,
        }
    }

    #[test]
    fn test_parse_submit_ack() {
        assert_eq!(parse_submit_ack(SUBMIT_OK).unwrap(), "7718");
        assert_eq!(
            parse_submit_ack(
                r#"{"status":"ok","response":{"data":{"statuses":[{"filled":{"oid":12,"totalSz":"1","avgPx":"2000"}}]}}}"#
            )
            .unwrap(),
            "12"
        );
        assert!(parse_submit_ack(r#"{"status":"err"}"#).is_err());
        assert!(parse_submit_ack(
            r#"{"status":"ok","response":{"data":{"statuses":[{"error":"Insufficient margin"}]}}}"#
        )
        .is_err());
        assert!(parse_submit_ack(r#"{"status":"ok","response":{}}"#).is_err());
    }

    #[test]
    fn test_generate_cloid_format() {
        let cloid = generate_cloid();
        assert!(cloid.starts_with("0x"));
        assert_eq!(cloid.len(), 34);
        assert!(cloid[2..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(cloid, generate_cloid());
    }

    #[tokio::test]
    async fn test_submit_signs_and_posts_action() {
        let transport = MockTransport::new(vec![
            Ok(META.to_string()),
            Ok(SUBMIT_OK.to_string()),
        ]);
        let (executor, tracker, symbol) = setup(Arc::clone(&transport), false);

        executor.submit_order(order(1, symbol)).await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].0.ends_with("/info"));
        assert!(calls[1].0.ends_with("/exchange"));

        let body: serde_json::Value = serde_json::from_str(&calls[1].1).unwrap();
        assert_eq!(body["action"]["type"], "order");
        assert_eq!(body["action"]["grouping"], "na");
        let order_obj = &body["action"]["orders"][0];
        assert_eq!(order_obj["a"], 1);
        assert_eq!(order_obj["b"], true);
        assert_eq!(order_obj["p"], "2000.5");
        assert_eq!(order_obj["s"], "1.5");
        assert_eq!(order_obj["t"]["limit"]["tif"], "Gtc");
        assert_eq!(body["signature"]["r"], "0xr");
        assert_eq!(body["signature"]["v"], 27);

        let state = tracker.get(1).unwrap();
        assert_eq!(state.status, OrderLifecycle::Submitted);
        assert_eq!(state.exchange_order_id.as_deref(), Some("7718"));
        assert!(state.client_order_id.is_some());
    }

    #[tokio::test]
    async fn test_signer_failure_aborts_before_transport() {
        let transport = MockTransport::new(vec![Ok(META.to_string())]);
        let (executor, tracker, symbol) = setup(Arc::clone(&transport), true);

        executor.submit_order(order(1, symbol)).await;

        // Only the meta fetch went out.
        assert_eq!(transport.calls().len(), 1);
        assert!(tracker.get(1).is_none());
    }

    #[tokio::test]
    async fn test_cancel_by_cloid() {
        let transport = MockTransport::new(vec![
            Ok(META.to_string()),
            Ok(SUBMIT_OK.to_string()),
            Ok(r#"{"status":"ok","response":{"data":{"statuses":["success"]}}}"#.to_string()),
        ]);
        let (executor, tracker, symbol) = setup(Arc::clone(&transport), false);

        executor.submit_order(order(1, symbol)).await;
        let cloid = tracker.get(1).unwrap().client_order_id.unwrap();
        executor.cancel_order(1).await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        let body: serde_json::Value = serde_json::from_str(&calls[2].1).unwrap();
        assert_eq!(body["action"]["type"], "cancelByCloid");
        assert_eq!(body["action"]["cancels"][0]["asset"], 1);
        assert_eq!(body["action"]["cancels"][0]["cloid"], cloid.as_str());
        assert_eq!(tracker.get(1).unwrap().status, OrderLifecycle::Canceled);
    }

    #[tokio::test]
    async fn test_replace_is_modify_by_oid() {
        let transport = MockTransport::new(vec![
            Ok(META.to_string()),
            Ok(SUBMIT_OK.to_string()),
            Ok(r#"{"status":"ok"}"#.to_string()),
        ]);
        let (executor, tracker, symbol) = setup(Arc::clone(&transport), false);

        executor.submit_order(order(1, symbol)).await;
        let mut replacement = order(2, symbol);
        replacement.price = "2100".parse::<Price>().unwrap();
        executor.replace_order(1, replacement).await;

        let calls = transport.calls();
        let body: serde_json::Value = serde_json::from_str(&calls[2].1).unwrap();
        assert_eq!(body["action"]["type"], "modify");
        assert_eq!(body["action"]["oid"], 7718);
        assert_eq!(body["action"]["order"]["p"], "2100");

        assert!(tracker.get(1).is_none());
        assert_eq!(tracker.get(2).unwrap().status, OrderLifecycle::Submitted);
    }

    #[tokio::test]
    async fn test_venue_error_leaves_tracker_untouched() {
        let transport = MockTransport::new(vec![
            Ok(META.to_string()),
            Ok(r#"{"status":"ok","response":{"data":{"statuses":[{"error":"Order too small"}]}}}"#
                .to_string()),
        ]);
        let (executor, tracker, symbol) = setup(transport, false);

        executor.submit_order(order(1, symbol)).await;
        assert!(tracker.get(1).is_none());
    }
}
