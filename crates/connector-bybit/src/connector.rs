//! Bybit market-data connector.

use crate::config::BybitConfig;
use crate::parser::{parse_message, BybitMessage};
use crate::private::BybitPrivateFeed;
use crate::symbol::parse_option_symbol;
use async_trait::async_trait;
use connector_core::{
    BookUpdateBus, ConnectorError, EventPool, ExchangeConnector, OrderEventBus, SymbolCache,
    SymbolRegistry, TradeBus,
};
use metrics::SharedMetrics;
use model::{now_ns, BookUpdateEvent, BookUpdateType, InstrumentType, SymbolId, SymbolInfo};
use net::{WsClient, WsConfig, WsHandler, WsPing, WsSender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Book events pooled per venue connector.
pub const BOOK_POOL_CAPACITY: usize = 2047;

const BYBIT_ORIGIN: &str = "https://www.bybit.com";

/// Shared state driven by the public websocket worker.
pub(crate) struct BybitFeed {
    config: BybitConfig,
    registry: Arc<dyn SymbolRegistry>,
    book_bus: BookUpdateBus,
    trade_bus: TradeBus,
    pool: EventPool<BookUpdateEvent>,
    cache: SymbolCache,
    metrics: SharedMetrics,
}

impl BybitFeed {
    pub(crate) fn new(
        config: BybitConfig,
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

    fn subscription_payload(&self) -> String {
        let mut args = Vec::with_capacity(self.config.symbols.len() * 2);
        for symbol in &self.config.symbols {
            args.push(format!("orderbook.{}.{}", symbol.depth, symbol.name));
            args.push(format!("publicTrade.{}", symbol.name));
        }
        serde_json::json!({"op": "subscribe", "args": args}).to_string()
    }

    fn resolve_symbol(&self, symbol: &str) -> SymbolId {
        self.cache.get_or_resolve(symbol, || {
            if let Some(id) = self.registry.get_symbol_id("bybit", symbol) {
                return id;
            }
            if let Some(info) = parse_option_symbol(symbol) {
                return self.registry.register_symbol(info);
            }
            let instrument = self
                .config
                .symbols
                .iter()
                .find(|s| s.name == symbol)
                .map(|s| s.instrument)
                .unwrap_or(InstrumentType::Spot);
            self.registry
                .register_symbol(SymbolInfo::new("bybit", symbol, instrument))
        })
    }

    pub(crate) async fn handle_message(&self, text: &str) {
        let recv_ts_ns = now_ns();

        match parse_message(text) {
            Ok(BybitMessage::Book(frame)) => {
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
                    event.update.strike = info.strike;
                    event.update.expiry_ns = info.expiry_ns;
                    event.update.option_type = info.option_type;
                }

                event.publish_ts_ns = now_ns();
                if self.book_bus.send(event).await.is_err() {
                    warn!("book bus closed, dropping event");
                    return;
                }
                self.metrics.inc_book_events_published();
            }
            Ok(BybitMessage::Trades(frames)) => {
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
            Ok(BybitMessage::Ignored) => {}
            Err(e) => {
                self.metrics.inc_parse_errors();
                warn!(error = %e, "failed to parse message");
            }
        }
    }
}

#[async_trait]
impl WsHandler for BybitFeed {
    async fn on_open(&self, out: &WsSender) {
        let payload = self.subscription_payload();
        info!(args = %payload, "connected, subscribing");
        out.send(payload);
    }

    async fn on_message(&self, text: &str, _out: &WsSender) {
        self.handle_message(text).await;
    }
}

pub struct BybitConnector {
    feed: Arc<BybitFeed>,
    ws: WsClient,
    private: Option<(Arc<BybitPrivateFeed>, WsClient)>,
    running: AtomicBool,
}

impl BybitConnector {
    pub fn new(
        config: BybitConfig,
        registry: Arc<dyn SymbolRegistry>,
        book_bus: BookUpdateBus,
        trade_bus: TradeBus,
        order_bus: Option<OrderEventBus>,
        metrics: SharedMetrics,
    ) -> Self {
        let ws = WsClient::new(
            WsConfig {
                url: config.public_endpoint.clone(),
                origin: Some(BYBIT_ORIGIN.to_string()),
                reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
                ping: WsPing::Protocol(Duration::from_secs(20)),
            },
            Arc::clone(&metrics),
        );

        let private = match (&config.credentials, order_bus) {
            (Some(credentials), Some(order_bus)) if config.enable_private => {
                let private_feed = Arc::new(BybitPrivateFeed::new(
                    credentials.clone(),
                    Arc::clone(&registry),
                    order_bus,
                    Arc::clone(&metrics),
                ));
                let private_ws = WsClient::new(
                    WsConfig {
                        url: config.private_endpoint.clone(),
                        origin: Some(BYBIT_ORIGIN.to_string()),
                        reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
                        ping: WsPing::Protocol(Duration::from_secs(20)),
                    },
                    Arc::clone(&metrics),
                );
                Some((private_feed, private_ws))
            }
            _ => None,
        };

        let feed = Arc::new(BybitFeed::new(
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
impl ExchangeConnector for BybitConnector {
    fn name(&self) -> &'static str {
        "bybit"
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
