//! Bybit private stream: auth, `order` and `execution` topics fanned out to
//! the order-event bus.

use async_trait::async_trait;
use auth::{bybit_ws_auth_payload, ApiCredentials};
use connector_core::{OrderEventBus, SymbolCache, SymbolRegistry};
use metrics::SharedMetrics;
use model::{
    now_ms, InstrumentType, Order, OrderEvent, OrderEventStatus, Price, Quantity, Side, SymbolInfo,
};
use net::{WsHandler, WsSender};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Auth frames expire this far in the future.
const AUTH_WINDOW_MS: u64 = 10_000;

pub(crate) struct BybitPrivateFeed {
    credentials: ApiCredentials,
    registry: Arc<dyn SymbolRegistry>,
    order_bus: OrderEventBus,
    cache: SymbolCache,
    metrics: SharedMetrics,
}

#[derive(Deserialize)]
struct RawPrivateFrame {
    op: Option<String>,
    success: Option<bool>,
    topic: Option<String>,
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawOrderRow {
    symbol: String,
    #[serde(rename = "orderLinkId", default)]
    order_link_id: String,
    #[serde(rename = "orderId", default)]
    order_id: String,
    side: String,
    #[serde(default)]
    price: String,
    #[serde(default)]
    qty: String,
    #[serde(rename = "cumExecQty", default)]
    cum_exec_qty: String,
    #[serde(rename = "orderStatus", default)]
    order_status: String,
}

#[derive(Deserialize)]
struct RawExecutionRow {
    symbol: String,
    #[serde(rename = "orderLinkId", default)]
    order_link_id: String,
    #[serde(rename = "orderId", default)]
    order_id: String,
    side: String,
    #[serde(rename = "execType", default)]
    exec_type: String,
    #[serde(rename = "execPrice", default)]
    exec_price: String,
    #[serde(rename = "execQty", default)]
    exec_qty: String,
    #[serde(rename = "orderQty", default)]
    order_qty: String,
}

fn map_order_status(status: &str) -> Option<OrderEventStatus> {
    match status {
        "New" => Some(OrderEventStatus::Submitted),
        "PartiallyFilled" => Some(OrderEventStatus::PartiallyFilled),
        "Filled" => Some(OrderEventStatus::Filled),
        "Cancelled" | "Canceled" => Some(OrderEventStatus::Canceled),
        "Rejected" => Some(OrderEventStatus::Rejected),
        "Expired" | "Deactivated" => Some(OrderEventStatus::Expired),
        _ => None,
    }
}

/// Local ids travel in `orderLinkId`; fall back to a numeric exchange id.
fn local_order_id(order_link_id: &str, order_id: &str) -> Option<u64> {
    order_link_id
        .parse::<u64>()
        .or_else(|_| order_id.parse::<u64>())
        .ok()
}

impl BybitPrivateFeed {
    pub(crate) fn new(
        credentials: ApiCredentials,
        registry: Arc<dyn SymbolRegistry>,
        order_bus: OrderEventBus,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            credentials,
            registry,
            order_bus,
            cache: SymbolCache::new(),
            metrics,
        }
    }

    fn resolve_symbol(&self, symbol: &str) -> model::SymbolId {
        self.cache.get_or_resolve(symbol, || {
            self.registry
                .get_symbol_id("bybit", symbol)
                .unwrap_or_else(|| {
                    self.registry.register_symbol(SymbolInfo::new(
                        "bybit",
                        symbol,
                        InstrumentType::Spot,
                    ))
                })
        })
    }

    async fn publish(&self, event: OrderEvent) {
        if self.order_bus.send(event).await.is_err() {
            warn!("order bus closed, dropping event");
        }
    }

    async fn handle_order_topic(&self, rows: Vec<serde_json::Value>) {
        for row in rows {
            let Ok(row) = serde_json::from_value::<RawOrderRow>(row) else {
                self.metrics.inc_parse_errors();
                warn!("skipping malformed order row");
                continue;
            };
            let Some(status) = map_order_status(&row.order_status) else {
                debug!(status = %row.order_status, "ignoring order status");
                continue;
            };
            let Some(id) = local_order_id(&row.order_link_id, &row.order_id) else {
                debug!(order_id = %row.order_id, "order event without numeric id");
                continue;
            };

            let event = OrderEvent {
                order: Order {
                    id,
                    symbol: self.resolve_symbol(&row.symbol),
                    side: if crate::parser::is_buy_side(&row.side) {
                        Side::Buy
                    } else {
                        Side::Sell
                    },
                    price: row.price.parse().unwrap_or(Price::ZERO),
                    quantity: row.qty.parse().unwrap_or(Quantity::ZERO),
                    filled_quantity: row.cum_exec_qty.parse().unwrap_or(Quantity::ZERO),
                },
                status,
            };
            self.publish(event).await;
        }
    }

    async fn handle_execution_topic(&self, rows: Vec<serde_json::Value>) {
        for row in rows {
            let Ok(row) = serde_json::from_value::<RawExecutionRow>(row) else {
                self.metrics.inc_parse_errors();
                warn!("skipping malformed execution row");
                continue;
            };
            // Trade executions surface as partial fills; the order topic
            // reports the terminal Filled state.
            if row.exec_type != "Trade" {
                continue;
            }
            let Some(id) = local_order_id(&row.order_link_id, &row.order_id) else {
                continue;
            };

            let event = OrderEvent {
                order: Order {
                    id,
                    symbol: self.resolve_symbol(&row.symbol),
                    side: if crate::parser::is_buy_side(&row.side) {
                        Side::Buy
                    } else {
                        Side::Sell
                    },
                    price: row.exec_price.parse().unwrap_or(Price::ZERO),
                    quantity: row.order_qty.parse().unwrap_or(Quantity::ZERO),
                    filled_quantity: row.exec_qty.parse().unwrap_or(Quantity::ZERO),
                },
                status: OrderEventStatus::PartiallyFilled,
            };
            self.publish(event).await;
        }
    }

    pub(crate) async fn handle_message(&self, text: &str, out: &WsSender) {
        let frame: RawPrivateFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                self.metrics.inc_parse_errors();
                warn!(error = %e, "failed to parse private frame");
                return;
            }
        };

        if frame.op.as_deref() == Some("auth") {
            if frame.success == Some(true) {
                info!("private channel authenticated, subscribing");
                out.send(
                    serde_json::json!({"op": "subscribe", "args": ["order", "execution"]})
                        .to_string(),
                );
            } else {
                warn!("private channel auth failed");
            }
            return;
        }

        match frame.topic.as_deref() {
            Some("order") => self.handle_order_topic(frame.data).await,
            Some("execution") => self.handle_execution_topic(frame.data).await,
            _ => {}
        }
    }
}

#[async_trait]
impl WsHandler for BybitPrivateFeed {
    async fn on_open(&self, out: &WsSender) {
        let expires_ms = now_ms() + AUTH_WINDOW_MS;
        out.send(bybit_ws_auth_payload(&self.credentials, expires_ms));
    }

    async fn on_message(&self, text: &str, out: &WsSender) {
        self.handle_message(text, out).await;
    }
}
