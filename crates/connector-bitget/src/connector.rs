//! Bitget market-data connector with optional private orders channel.

use crate::config::BitgetConfig;
use crate::parser::{parse_message, BitgetMessage};
use async_trait::async_trait;
use auth::bitget_ws_login_payload;
use connector_core::{
    BookUpdateBus, ConnectorError, EventPool, ExchangeConnector, OrderEventBus, SymbolCache,
    SymbolRegistry, TradeBus,
};
use metrics::SharedMetrics;
use model::{
    now_ms, now_ns, BookUpdateEvent, BookUpdateType, InstrumentType, Order, OrderEvent,
    OrderEventStatus, Price, Quantity, Side, SymbolId, SymbolInfo,
};
use net::{WsClient, WsConfig, WsHandler, WsPing, WsSender};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub const BOOK_POOL_CAPACITY: usize = 2047;

const BITGET_ORIGIN: &str = "https://www.bitget.com";

/// Symbols per subscribe frame.
const SUBSCRIBE_BATCH: usize = 10;

fn ws_inst_type(instrument: InstrumentType) -> &'static str {
    match instrument {
        InstrumentType::Spot => "sp",
        InstrumentType::Future => "mc",
        InstrumentType::Inverse => "dmc",
        InstrumentType::Option => "cmc",
    }
}

fn book_channel(depth: u16) -> String {
    if depth == 0 {
        "books".to_string()
    } else {
        format!("books{depth}")
    }
}

pub(crate) struct BitgetFeed {
    config: BitgetConfig,
    registry: Arc<dyn SymbolRegistry>,
    book_bus: BookUpdateBus,
    trade_bus: TradeBus,
    pool: EventPool<BookUpdateEvent>,
    cache: SymbolCache,
    metrics: SharedMetrics,
}

impl BitgetFeed {
    pub(crate) fn new(
        config: BitgetConfig,
        registry: Arc<dyn SymbolRegistry>,
        book_bus: BookUpdateBus,
        trade_bus: TradeBus,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            config,
            registry,
            book_bus,
            trade_bus,
            pool: EventPool::new(BOOK_POOL_CAPACITY),
            cache: SymbolCache::new(),
            metrics,
        }
    }

    /// Subscribe frames, at most [`SUBSCRIBE_BATCH`] symbols each.
    fn subscription_payloads(&self) -> Vec<String> {
        self.config
            .symbols
            .chunks(SUBSCRIBE_BATCH)
            .map(|chunk| {
                let args: Vec<serde_json::Value> = chunk
                    .iter()
                    .flat_map(|symbol| {
                        let inst_type = ws_inst_type(symbol.instrument);
                        [
                            serde_json::json!({
                                "instType": inst_type,
                                "channel": book_channel(symbol.depth),
                                "instId": symbol.name,
                            }),
                            serde_json::json!({
                                "instType": inst_type,
                                "channel": "trade",
                                "instId": symbol.name,
                            }),
                        ]
                    })
                    .collect();
                serde_json::json!({"op": "subscribe", "args": args}).to_string()
            })
            .collect()
    }

    fn resolve_symbol(&self, symbol: &str) -> SymbolId {
        self.cache.get_or_resolve(symbol, || {
            if let Some(id) = self.registry.get_symbol_id("bitget", symbol) {
                return id;
            }
            let instrument = self
                .config
                .symbols
                .iter()
                .find(|s| s.name == symbol)
                .map(|s| s.instrument)
                .unwrap_or(InstrumentType::Spot);
            self.registry
                .register_symbol(SymbolInfo::new("bitget", symbol, instrument))
        })
    }

    pub(crate) async fn handle_message(&self, text: &str) {
        let recv_ts_ns = now_ns();

        match parse_message(text) {
            Ok(BitgetMessage::Book(frame)) => {
                if frame.bids.is_empty() && frame.asks.is_empty() {
                    return;
                }
                let Some(mut event) = self.pool.acquire() else {
                    self.metrics.inc_pool_exhausted();
                    warn!(symbol = %frame.symbol, "book pool exhausted, dropping frame");
                    return;
                };

                let symbol = self.resolve_symbol(&frame.symbol);
                event.recv_ts_ns = recv_ts_ns;
                event.update.symbol = symbol;
                event.update.update_type = if frame.is_snapshot {
                    BookUpdateType::Snapshot
                } else {
                    BookUpdateType::Delta
                };
                event.update.exchange_ts_ns = frame.exchange_ts_ns;
                event.update.bids.extend_from_slice(&frame.bids);
                event.update.asks.extend_from_slice(&frame.asks);
                if let Some(info) = self.registry.get_symbol_info(symbol) {
                    event.update.instrument = info.instrument;
                }

                event.publish_ts_ns = now_ns();
                if self.book_bus.send(event).await.is_err() {
                    warn!("book bus closed, dropping event");
                    return;
                }
                self.metrics.inc_book_events_published();
            }
            Ok(BitgetMessage::Trades(frames)) => {
                for frame in frames {
                    let symbol = self.resolve_symbol(&frame.symbol);
                    let instrument = self
                        .registry
                        .get_symbol_info(symbol)
                        .map(|info| info.instrument)
                        .unwrap_or(InstrumentType::Spot);

                    let event = model::TradeEvent {
                        symbol,
                        instrument,
                        price: frame.price,
                        quantity: frame.quantity,
                        is_buy: frame.is_buy,
                        exchange_ts_ns: frame.exchange_ts_ns,
                    };
                    if self.trade_bus.send(event).await.is_err() {
                        warn!("trade bus closed, dropping event");
                        return;
                    }
                    self.metrics.inc_trades_published();
                }
            }
            Ok(BitgetMessage::Ignored) => {}
            Err(e) => {
                self.metrics.inc_parse_errors();
                warn!(error = %e, "failed to parse message");
            }
        }
    }
}

#[async_trait]
impl WsHandler for BitgetFeed {
    async fn on_open(&self, out: &WsSender) {
        let payloads = self.subscription_payloads();
        info!(batches = payloads.len(), "connected, subscribing");
        for payload in payloads {
            out.send(payload);
        }
    }

    async fn on_message(&self, text: &str, _out: &WsSender) {
        self.handle_message(text).await;
    }
}

/// Private stream: login on open, then map `orders` channel rows to
/// [`OrderEvent`]s.
pub(crate) struct BitgetPrivateFeed {
    credentials: auth::ApiCredentials,
    registry: Arc<dyn SymbolRegistry>,
    order_bus: OrderEventBus,
    cache: SymbolCache,
    metrics: SharedMetrics,
}

#[derive(Deserialize)]
struct RawPrivateFrame {
    arg: Option<RawPrivateArg>,
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawPrivateArg {
    channel: String,
}

#[derive(Deserialize)]
struct RawOrderRow {
    #[serde(rename = "instId")]
    inst_id: String,
    #[serde(rename = "orderId", default)]
    order_id: String,
    side: String,
    #[serde(default)]
    price: String,
    #[serde(default)]
    size: String,
    #[serde(default)]
    status: String,
}

fn map_order_status(status: &str) -> OrderEventStatus {
    match status {
        "filled" => OrderEventStatus::Filled,
        "partially_filled" => OrderEventStatus::PartiallyFilled,
        "cancelled" | "canceled" => OrderEventStatus::Canceled,
        "rejected" => OrderEventStatus::Rejected,
        _ => OrderEventStatus::Submitted,
    }
}

impl BitgetPrivateFeed {
    pub(crate) fn new(
        credentials: auth::ApiCredentials,
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

    fn resolve_symbol(&self, symbol: &str) -> SymbolId {
        self.cache.get_or_resolve(symbol, || {
            self.registry
                .get_symbol_id("bitget", symbol)
                .unwrap_or_else(|| {
                    self.registry.register_symbol(SymbolInfo::new(
                        "bitget",
                        symbol,
                        InstrumentType::Spot,
                    ))
                })
        })
    }

    pub(crate) async fn handle_message(&self, text: &str) {
        let frame: RawPrivateFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                self.metrics.inc_parse_errors();
                warn!(error = %e, "failed to parse private frame");
                return;
            }
        };
        let Some(arg) = frame.arg else {
            return;
        };
        if arg.channel != "orders" {
            return;
        }

        for row in frame.data {
            let Ok(row) = serde_json::from_value::<RawOrderRow>(row) else {
                self.metrics.inc_parse_errors();
                warn!("skipping malformed order row");
                continue;
            };
            let Ok(id) = row.order_id.parse::<u64>() else {
                warn!(order_id = %row.order_id, "order event without numeric id");
                continue;
            };

            let event = OrderEvent {
                order: Order {
                    id,
                    symbol: self.resolve_symbol(&row.inst_id),
                    side: if row.side == "buy" {
                        Side::Buy
                    } else {
                        Side::Sell
                    },
                    price: row.price.parse().unwrap_or(Price::ZERO),
                    quantity: row.size.parse().unwrap_or(Quantity::ZERO),
                    filled_quantity: Quantity::ZERO,
                },
                status: map_order_status(&row.status),
            };
            if self.order_bus.send(event).await.is_err() {
                warn!("order bus closed, dropping event");
                return;
            }
        }
    }
}

#[async_trait]
impl WsHandler for BitgetPrivateFeed {
    async fn on_open(&self, out: &WsSender) {
        out.send(bitget_ws_login_payload(&self.credentials, now_ms()));
    }

    async fn on_message(&self, text: &str, _out: &WsSender) {
        self.handle_message(text).await;
    }
}

pub struct BitgetConnector {
    feed: Arc<BitgetFeed>,
    ws: WsClient,
    private: Option<(Arc<BitgetPrivateFeed>, WsClient)>,
    running: AtomicBool,
}

impl BitgetConnector {
    pub fn new(
        config: BitgetConfig,
        registry: Arc<dyn SymbolRegistry>,
        book_bus: BookUpdateBus,
        trade_bus: TradeBus,
        order_bus: Option<OrderEventBus>,
        metrics: SharedMetrics,
    ) -> Self {
        let ws = WsClient::new(
            WsConfig {
                url: config.public_endpoint.clone(),
                origin: Some(BITGET_ORIGIN.to_string()),
                reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
                ping: WsPing::Text {
                    payload: "ping".to_string(),
                    interval: Duration::from_secs(30),
                },
            },
            Arc::clone(&metrics),
        );

        let private = match (&config.credentials, order_bus) {
            (Some(credentials), Some(order_bus)) if config.enable_private => {
                let private_feed = Arc::new(BitgetPrivateFeed::new(
                    credentials.clone(),
                    Arc::clone(&registry),
                    order_bus,
                    Arc::clone(&metrics),
                ));
                let private_ws = WsClient::new(
                    WsConfig {
                        url: config.private_endpoint.clone(),
                        origin: Some(BITGET_ORIGIN.to_string()),
                        reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
                        ping: WsPing::Text {
                            payload: "ping".to_string(),
                            interval: Duration::from_secs(30),
                        },
                    },
                    Arc::clone(&metrics),
                );
                Some((private_feed, private_ws))
            }
            _ => None,
        };

        let feed = Arc::new(BitgetFeed::new(
            config,
            registry,
            book_bus,
            trade_bus,
            metrics,
        ));

        Self {
            feed,
            ws,
            private,
            running: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ExchangeConnector for BitgetConnector {
    fn name(&self) -> &'static str {
        "bitget"
    }

    async fn start(&mut self) -> Result<(), ConnectorError> {
        if let Err(e) = self.feed.config.validate() {
            error!(error = %e, "invalid connector config");
            return Err(e);
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.ws.start(Arc::clone(&self.feed) as Arc<dyn WsHandler>);
        if let Some((private_feed, private_ws)) = &mut self.private {
            private_ws.start(Arc::clone(private_feed) as Arc<dyn WsHandler>);
        }
        Ok(())
    }

    async fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.ws.stop().await;
        if let Some((_, private_ws)) = &mut self.private {
            private_ws.stop().await;
        }
        info!("connector stopped");
    }
}
