//! Bitget order executor.

use crate::config::BitgetParams;
use crate::rest::BitgetRestClient;
use async_trait::async_trait;
use connector_core::SymbolRegistry;
use execution_core::{
    ExecutorPolicies, NoRateLimit, NoTimeouts, OrderExecutor, OrderTracker, RateLimitPolicy,
    TimeoutTracking,
};
use model::{Order, OrderId, Side};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

const PATH_PLACE: &str = "/api/v2/mix/order/place-order";
const PATH_CANCEL: &str = "/api/v2/mix/order/cancel-order";
const PATH_MODIFY: &str = "/api/v2/mix/order/modify-order";

const VENUE_OK: &str = "00000";

fn side_str(side: Side) -> &'static str {
    match side {
        Side::Buy => "buy",
        Side::Sell => "sell",
    }
}

#[derive(Debug, Deserialize)]
struct BitgetResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Venue-level acknowledgement: `code == "00000"`.
fn parse_ack(body: &str) -> Result<String, String> {
    let response: BitgetResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed response: {e}"))?;
    if response.code != VENUE_OK {
        return Err(format!("code={} msg={}", response.code, response.msg));
    }
    Ok(response
        .data
        .get("orderId")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string())
}

pub struct BitgetOrderExecutor<R = NoRateLimit, T = NoTimeouts>
where
    R: RateLimitPolicy,
    T: TimeoutTracking,
{
    client: BitgetRestClient,
    registry: Arc<dyn SymbolRegistry>,
    tracker: Arc<dyn OrderTracker>,
    params: BitgetParams,
    policies: ExecutorPolicies<R, T>,
}

impl<R: RateLimitPolicy, T: TimeoutTracking> BitgetOrderExecutor<R, T> {
    pub fn new(
        client: BitgetRestClient,
        registry: Arc<dyn SymbolRegistry>,
        tracker: Arc<dyn OrderTracker>,
        params: BitgetParams,
        policies: ExecutorPolicies<R, T>,
    ) -> Self {
        Self {
            client,
            registry,
            tracker,
            params,
            policies,
        }
    }
}

#[async_trait]
impl<R: RateLimitPolicy, T: TimeoutTracking> OrderExecutor for BitgetOrderExecutor<R, T> {
    async fn submit_order(&self, order: Order) {
        if !self.policies.rate_limit.try_acquire(order.id).await {
            return;
        }
        let Some(info) = self.registry.get_symbol_info(order.symbol) else {
            error!(symbol = %order.symbol, "no symbol info registered");
            return;
        };

        let body = serde_json::json!({
            "symbol": info.symbol,
            "productType": self.params.product_type,
            "marginMode": self.params.margin_mode,
            "marginCoin": self.params.margin_coin,
            "size": order.quantity.to_string(),
            "price": order.price.to_string(),
            "side": side_str(order.side),
            "tradeSide": "open",
            "orderType": "limit",
            "force": self.params.force,
            "clientOid": order.id.to_string(),
        })
        .to_string();

        info!(
            order_id = order.id,
            symbol = %info.symbol,
            side = side_str(order.side),
            "submitting order"
        );

        self.policies.timeout.track_submit(order.id);
        match self.client.post(PATH_PLACE, body).await {
            Ok(response) => {
                self.policies.timeout.clear_pending(order.id);
                match parse_ack(&response) {
                    Ok(exchange_order_id) => {
                        info!(
                            order_id = order.id,
                            exchange_order_id = %exchange_order_id,
                            "order submitted"
                        );
                        self.tracker.on_submitted(&order, &exchange_order_id, None);
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
        let Some(state) = self.tracker.get(id) else {
            error!(order_id = id, "cannot cancel unknown order");
            return;
        };
        let Some(info) = self.registry.get_symbol_info(state.local_order.symbol) else {
            error!(symbol = %state.local_order.symbol, "no symbol info registered");
            return;
        };

        // Cancel by exchange id when acked, otherwise fall back to the
        // client oid the order was placed with.
        let mut body = serde_json::json!({
            "symbol": info.symbol,
            "productType": self.params.product_type,
            "marginCoin": self.params.margin_coin,
        });
        match &state.exchange_order_id {
            Some(exchange_order_id) => {
                body["orderId"] = serde_json::Value::from(exchange_order_id.clone());
            }
            None => {
                body["clientOid"] = serde_json::Value::from(id.to_string());
            }
        }

        self.policies.timeout.track_cancel(id);
        match self.client.post(PATH_CANCEL, body.to_string()).await {
            Ok(response) => {
                self.policies.timeout.clear_pending(id);
                match parse_ack(&response) {
                    Ok(_) => {
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
        let Some(state) = self.tracker.get(old_id) else {
            error!(order_id = old_id, "cannot replace unknown order");
            return;
        };
        let Some(info) = self.registry.get_symbol_info(state.local_order.symbol) else {
            error!(symbol = %state.local_order.symbol, "no symbol info registered");
            return;
        };
        let Some(exchange_order_id) = state.exchange_order_id else {
            error!(order_id = old_id, "cannot replace before exchange ack");
            return;
        };

        let body = serde_json::json!({
            "orderId": exchange_order_id,
            "symbol": info.symbol,
            "productType": self.params.product_type,
            "marginCoin": self.params.margin_coin,
            "newPrice": new_order.price.to_string(),
            "newSize": new_order.quantity.to_string(),
            "newClientOid": new_order.id.to_string(),
        })
        .to_string();

        self.policies.timeout.track_replace(old_id);
        match self.client.post(PATH_MODIFY, body).await {
            Ok(response) => {
                self.policies.timeout.clear_pending(old_id);
                match parse_ack(&response) {
                    Ok(new_exchange_id) => {
                        info!(order_id = old_id, "replace successful");
                        let exchange_id = if new_exchange_id.is_empty() {
                            exchange_order_id
                        } else {
                            new_exchange_id
                        };
                        self.tracker
                            .on_replaced(old_id, &new_order, &exchange_id, None);
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
    use auth::ApiCredentials;
    use connector_core::MemorySymbolRegistry;
    use execution_core::{InMemoryOrderTracker, OrderLifecycle, OrderTimeoutConfig, TimeoutOrderTracker, WithTimeouts};
    use model::{InstrumentType, Quantity, SymbolId, SymbolInfo};
    use net::TransportError;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct MockTransport {
        responses: Mutex<VecDeque<Result<String, TransportError>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl MockTransport {
        fn with_responses(responses: Vec<Result<String, TransportError>>) -> Arc<Self> {
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
    impl net::Transport for MockTransport {
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
                .unwrap_or_else(|| Ok(r#"{"code":"00000","data":{"orderId":"X"}}"#.to_string()))
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

    fn setup(
        transport: Arc<MockTransport>,
    ) -> (
        BitgetOrderExecutor,
        Arc<InMemoryOrderTracker>,
        SymbolId,
    ) {
        let registry = Arc::new(MemorySymbolRegistry::new());
        let symbol =
            registry.register_symbol(SymbolInfo::new("bitget", "BTCUSDT", InstrumentType::Future));
        let tracker = Arc::new(InMemoryOrderTracker::new());
        let client = BitgetRestClient::new(
            ApiCredentials::with_passphrase("k".into(), "s".into(), "p".into()),
            "https://api.test",
            transport,
        );
        let executor = BitgetOrderExecutor::new(
            client,
            registry as Arc<dyn SymbolRegistry>,
            Arc::clone(&tracker) as Arc<dyn OrderTracker>,
            BitgetParams::default(),
            ExecutorPolicies::none(),
        );
        (executor, tracker, symbol)
    }

    fn order(id: OrderId, symbol: SymbolId) -> Order {
        Order {
            id,
            symbol,
            side: Side::Sell,
            price: "30000".parse().unwrap(),
            quantity: "0.5".parse().unwrap(),
            filled_quantity: Quantity::ZERO,
        }
    }

    #[test]
    fn test_parse_ack() {
        assert_eq!(
            parse_ack(r#"{"code":"00000","msg":"success","data":{"orderId":"99"}}"#).unwrap(),
            "99"
        );
        assert!(parse_ack(r#"{"code":"40034","msg":"param error"}"#).is_err());
        assert!(parse_ack("nope").is_err());
    }

    #[tokio::test]
    async fn test_submit_composes_venue_body() {
        let transport = MockTransport::with_responses(vec![Ok(
            r#"{"code":"00000","data":{"orderId":"ex-9"}}"#.to_string(),
        )]);
        let (executor, tracker, symbol) = setup(Arc::clone(&transport));

        executor.submit_order(order(5, symbol)).await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, format!("https://api.test{PATH_PLACE}"));
        let body: serde_json::Value = serde_json::from_str(&calls[0].1).unwrap();
        assert_eq!(body["symbol"], "BTCUSDT");
        assert_eq!(body["productType"], "USDT-FUTURES");
        assert_eq!(body["side"], "sell");
        assert_eq!(body["tradeSide"], "open");
        assert_eq!(body["orderType"], "limit");
        assert_eq!(body["clientOid"], "5");

        let state = tracker.get(5).unwrap();
        assert_eq!(state.status, OrderLifecycle::Submitted);
        assert_eq!(state.exchange_order_id.as_deref(), Some("ex-9"));
    }

    #[tokio::test]
    async fn test_venue_failure_does_not_update_tracker() {
        let transport = MockTransport::with_responses(vec![Ok(
            r#"{"code":"40034","msg":"Parameter does not exist"}"#.to_string(),
        )]);
        let (executor, tracker, symbol) = setup(transport);

        executor.submit_order(order(5, symbol)).await;
        assert!(tracker.get(5).is_none());
    }

    #[tokio::test]
    async fn test_cancel_falls_back_to_client_oid() {
        let transport = MockTransport::with_responses(vec![Ok(
            r#"{"code":"00000","data":{}}"#.to_string(),
        )]);
        let (executor, tracker, symbol) = setup(Arc::clone(&transport));

        // Known locally but never acked: no exchange id yet.
        tracker.pre_register(order(7, symbol));
        executor.cancel_order(7).await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        let body: serde_json::Value = serde_json::from_str(&calls[0].1).unwrap();
        assert_eq!(body["clientOid"], "7");
        assert!(body.get("orderId").is_none());
    }

    #[tokio::test]
    async fn test_timeout_cleared_on_both_paths() {
        let timeout_tracker =
            Arc::new(TimeoutOrderTracker::new(OrderTimeoutConfig::default()).unwrap());
        let transport = MockTransport::with_responses(vec![Err(TransportError::PoolExhausted)]);
        let registry = Arc::new(MemorySymbolRegistry::new());
        let symbol =
            registry.register_symbol(SymbolInfo::new("bitget", "BTCUSDT", InstrumentType::Future));
        let tracker = Arc::new(InMemoryOrderTracker::new());
        let client = BitgetRestClient::new(
            ApiCredentials::with_passphrase("k".into(), "s".into(), "p".into()),
            "https://api.test",
            Arc::clone(&transport) as Arc<dyn net::Transport>,
        );
        let executor = BitgetOrderExecutor::new(
            client,
            registry as Arc<dyn SymbolRegistry>,
            Arc::clone(&tracker) as Arc<dyn OrderTracker>,
            BitgetParams::default(),
            ExecutorPolicies::new(NoRateLimit, WithTimeouts::new(Arc::clone(&timeout_tracker))),
        );

        executor.submit_order(order(1, symbol)).await;
        assert!(!timeout_tracker.has_pending(1));
        assert!(tracker.get(1).is_none());
    }
}
