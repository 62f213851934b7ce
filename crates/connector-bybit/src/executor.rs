//! Bybit order executor.

use crate::rest::BybitRestClient;
use async_trait::async_trait;
use connector_core::SymbolRegistry;
use execution_core::{
    ExecutorPolicies, NoRateLimit, NoTimeouts, OrderExecutor, OrderTracker, RateLimitPolicy,
    TimeoutTracking,
};
use model::{InstrumentType, Order, OrderId, Side};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

fn category(instrument: InstrumentType) -> &'static str {
    match instrument {
        InstrumentType::Spot => "spot",
        InstrumentType::Future => "linear",
        InstrumentType::Inverse => "inverse",
        InstrumentType::Option => "option",
    }
}

fn side_str(side: Side) -> &'static str {
    match side {
        Side::Buy => "Buy",
        Side::Sell => "Sell",
    }
}

#[derive(Debug, Deserialize)]
struct BybitResponse {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    #[serde(default)]
    result: serde_json::Value,
}

/// Venue-level acknowledgement: `retCode == 0`, any order id in `result`.
fn parse_ack(body: &str) -> Result<String, String> {
    let response: BybitResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed response: {e}"))?;
    if response.ret_code != 0 {
        return Err(format!(
            "retCode={} retMsg={}",
            response.ret_code, response.ret_msg
        ));
    }
    Ok(response
        .result
        .get("orderId")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string())
}

pub struct BybitOrderExecutor<R = NoRateLimit, T = NoTimeouts>
where
    R: RateLimitPolicy,
    T: TimeoutTracking,
{
    client: BybitRestClient,
    registry: Arc<dyn SymbolRegistry>,
    tracker: Arc<dyn OrderTracker>,
    policies: ExecutorPolicies<R, T>,
}

impl<R: RateLimitPolicy, T: TimeoutTracking> BybitOrderExecutor<R, T> {
    pub fn new(
        client: BybitRestClient,
        registry: Arc<dyn SymbolRegistry>,
        tracker: Arc<dyn OrderTracker>,
        policies: ExecutorPolicies<R, T>,
    ) -> Self {
        Self {
            client,
            registry,
            tracker,
            policies,
        }
    }
}

#[async_trait]
impl<R: RateLimitPolicy, T: TimeoutTracking> OrderExecutor for BybitOrderExecutor<R, T> {
    async fn submit_order(&self, order: Order) {
        if !self.policies.rate_limit.try_acquire(order.id).await {
            return;
        }
        let Some(info) = self.registry.get_symbol_info(order.symbol) else {
            error!(symbol = %order.symbol, "no symbol info registered");
            return;
        };

        let body = serde_json::json!({
            "category": category(info.instrument),
            "symbol": info.symbol,
            "side": side_str(order.side),
            "orderType": "Limit",
            "qty": order.quantity.to_string(),
            "price": order.price.to_string(),
            "orderLinkId": order.id.to_string(),
        })
        .to_string();

        info!(
            order_id = order.id,
            symbol = %info.symbol,
            side = side_str(order.side),
            qty = %order.quantity,
            price = %order.price,
            "submitting order"
        );

        self.policies.timeout.track_submit(order.id);
        match self.client.post("/v5/order/create", body).await {
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
        let Some(exchange_order_id) = state.exchange_order_id else {
            error!(order_id = id, "cannot cancel before exchange ack");
            return;
        };

        let body = serde_json::json!({
            "category": category(info.instrument),
            "symbol": info.symbol,
            "orderId": exchange_order_id,
        })
        .to_string();

        self.policies.timeout.track_cancel(id);
        match self.client.post("/v5/order/cancel", body).await {
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
        let Some(info) = self.registry.get_symbol_info(new_order.symbol) else {
            error!(symbol = %new_order.symbol, "no symbol info registered");
            return;
        };
        let Some(exchange_order_id) = state.exchange_order_id else {
            error!(order_id = old_id, "cannot replace before exchange ack");
            return;
        };

        let body = serde_json::json!({
            "category": category(info.instrument),
            "symbol": info.symbol,
            "orderId": exchange_order_id,
            "qty": new_order.quantity.to_string(),
            "price": new_order.price.to_string(),
        })
        .to_string();

        info!(
            order_id = old_id,
            exchange_order_id = %exchange_order_id,
            new_qty = %new_order.quantity,
            new_price = %new_order.price,
            "replacing order"
        );

        self.policies.timeout.track_replace(old_id);
        match self.client.post("/v5/order/amend", body).await {
            Ok(response) => {
                self.policies.timeout.clear_pending(old_id);
                match parse_ack(&response) {
                    Ok(_) => {
                        info!(order_id = old_id, "replace successful");
                        self.tracker
                            .on_replaced(old_id, &new_order, &exchange_order_id, None);
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
    use execution_core::{
        ActiveRateLimit, InMemoryOrderTracker, OrderLifecycle, RateLimitConfig, RateLimitMode,
    };
    use model::{Price, Quantity, SymbolId, SymbolInfo};
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
                .unwrap_or_else(|| Ok(r#"{"retCode":0,"result":{"orderId":"X"}}"#.to_string()))
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
        BybitOrderExecutor,
        Arc<InMemoryOrderTracker>,
        Arc<MemorySymbolRegistry>,
        SymbolId,
    ) {
        let registry = Arc::new(MemorySymbolRegistry::new());
        let symbol =
            registry.register_symbol(SymbolInfo::new("bybit", "BTCUSDT", InstrumentType::Future));
        let tracker = Arc::new(InMemoryOrderTracker::new());
        let client = BybitRestClient::new(
            ApiCredentials::new("key".into(), "secret".into()),
            "https://api.test",
            transport,
        );
        let executor = BybitOrderExecutor::new(
            client,
            Arc::clone(&registry) as Arc<dyn SymbolRegistry>,
            Arc::clone(&tracker) as Arc<dyn OrderTracker>,
            ExecutorPolicies::none(),
        );
        (executor, tracker, registry, symbol)
    }

    fn order(id: OrderId, symbol: SymbolId) -> Order {
        Order {
            id,
            symbol,
            side: Side::Buy,
            price: "30000.5".parse().unwrap(),
            quantity: "0.1".parse().unwrap(),
            filled_quantity: Quantity::ZERO,
        }
    }

    #[test]
    fn test_parse_ack() {
        assert_eq!(
            parse_ack(r#"{"retCode":0,"retMsg":"OK","result":{"orderId":"abc"}}"#).unwrap(),
            "abc"
        );
        assert!(parse_ack(r#"{"retCode":10001,"retMsg":"bad param"}"#).is_err());
        assert!(parse_ack("garbage").is_err());
    }

    #[tokio::test]
    async fn test_submit_success_updates_tracker_once() {
        let transport = MockTransport::with_responses(vec![Ok(
            r#"{"retCode":0,"result":{"orderId":"ex-1"}}"#.to_string(),
        )]);
        let (executor, tracker, _registry, symbol) = setup(Arc::clone(&transport));

        executor.submit_order(order(1, symbol)).await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "https://api.test/v5/order/create");
        let body: serde_json::Value = serde_json::from_str(&calls[0].1).unwrap();
        assert_eq!(body["category"], "linear");
        assert_eq!(body["symbol"], "BTCUSDT");
        assert_eq!(body["side"], "Buy");
        assert_eq!(body["qty"], "0.1");
        assert_eq!(body["price"], "30000.5");

        let state = tracker.get(1).unwrap();
        assert_eq!(state.status, OrderLifecycle::Submitted);
        assert_eq!(state.exchange_order_id.as_deref(), Some("ex-1"));
    }

    #[tokio::test]
    async fn test_venue_failure_leaves_tracker_untouched() {
        let transport = MockTransport::with_responses(vec![Ok(
            r#"{"retCode":10001,"retMsg":"invalid qty"}"#.to_string(),
        )]);
        let (executor, tracker, _registry, symbol) = setup(transport);

        executor.submit_order(order(1, symbol)).await;
        assert!(tracker.get(1).is_none());
    }

    #[tokio::test]
    async fn test_transport_error_leaves_tracker_untouched() {
        let transport = MockTransport::with_responses(vec![Err(TransportError::Http {
            status: 503,
            body: "overloaded".into(),
        })]);
        let (executor, tracker, _registry, symbol) = setup(transport);

        executor.submit_order(order(1, symbol)).await;
        assert!(tracker.get(1).is_none());
    }

    #[tokio::test]
    async fn test_unknown_symbol_aborts_before_transport() {
        let transport = MockTransport::with_responses(vec![]);
        let (executor, tracker, _registry, _symbol) = setup(Arc::clone(&transport));

        executor.submit_order(order(1, SymbolId(999))).await;
        assert!(transport.calls().is_empty());
        assert!(tracker.get(1).is_none());
    }

    #[tokio::test]
    async fn test_rate_limit_reject_blocks_second_submit() {
        let transport = MockTransport::with_responses(vec![Ok(
            r#"{"retCode":0,"result":{"orderId":"ex-1"}}"#.to_string(),
        )]);
        let registry = Arc::new(MemorySymbolRegistry::new());
        let symbol =
            registry.register_symbol(SymbolInfo::new("bybit", "BTCUSDT", InstrumentType::Future));
        let tracker = Arc::new(InMemoryOrderTracker::new());
        let client = BybitRestClient::new(
            ApiCredentials::new("key".into(), "secret".into()),
            "https://api.test",
            Arc::clone(&transport) as Arc<dyn net::Transport>,
        );
        let rate_limit = ActiveRateLimit::new(RateLimitConfig {
            capacity: 1,
            refill_per_sec: 1.0,
            mode: RateLimitMode::Reject,
            on_rate_limited: None,
        })
        .unwrap();
        let executor = BybitOrderExecutor::new(
            client,
            Arc::clone(&registry) as Arc<dyn SymbolRegistry>,
            Arc::clone(&tracker) as Arc<dyn OrderTracker>,
            ExecutorPolicies::new(rate_limit, NoTimeouts),
        );

        executor.submit_order(order(1, symbol)).await;
        executor.submit_order(order(2, symbol)).await;

        assert_eq!(transport.calls().len(), 1);
        assert!(tracker.get(1).is_some());
        assert!(tracker.get(2).is_none());
    }

    #[tokio::test]
    async fn test_cancel_uses_exchange_id() {
        let transport = MockTransport::with_responses(vec![
            Ok(r#"{"retCode":0,"result":{"orderId":"ex-1"}}"#.to_string()),
            Ok(r#"{"retCode":0,"result":{"orderId":"ex-1"}}"#.to_string()),
        ]);
        let (executor, tracker, _registry, symbol) = setup(Arc::clone(&transport));

        executor.submit_order(order(1, symbol)).await;
        executor.cancel_order(1).await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].0, "https://api.test/v5/order/cancel");
        let body: serde_json::Value = serde_json::from_str(&calls[1].1).unwrap();
        assert_eq!(body["orderId"], "ex-1");
        assert_eq!(tracker.get(1).unwrap().status, OrderLifecycle::Canceled);
    }

    #[tokio::test]
    async fn test_replace_amends_existing_order() {
        let transport = MockTransport::with_responses(vec![
            Ok(r#"{"retCode":0,"result":{"orderId":"ex-1"}}"#.to_string()),
            Ok(r#"{"retCode":0,"result":{"orderId":"ex-1"}}"#.to_string()),
        ]);
        let (executor, tracker, _registry, symbol) = setup(Arc::clone(&transport));

        executor.submit_order(order(1, symbol)).await;
        let mut replacement = order(2, symbol);
        replacement.price = "31000".parse::<Price>().unwrap();
        executor.replace_order(1, replacement).await;

        let calls = transport.calls();
        assert_eq!(calls[1].0, "https://api.test/v5/order/amend");
        let body: serde_json::Value = serde_json::from_str(&calls[1].1).unwrap();
        assert_eq!(body["orderId"], "ex-1");
        assert_eq!(body["price"], "31000");

        assert!(tracker.get(1).is_none());
        assert_eq!(tracker.get(2).unwrap().status, OrderLifecycle::Submitted);
    }

    #[tokio::test]
    async fn test_cancel_unknown_order_no_transport_call() {
        let transport = MockTransport::with_responses(vec![]);
        let (executor, _tracker, _registry, _symbol) = setup(Arc::clone(&transport));

        executor.cancel_order(77).await;
        assert!(transport.calls().is_empty());
    }
}
