//! Polymarket market-data connector.

use crate::config::PolymarketConfig;
use crate::parser::{parse_message, BookFrame, PolyMessage};
use async_trait::async_trait;
use connector_core::{
    BookUpdateBus, ConnectorError, EventPool, ExchangeConnector, SymbolCache, SymbolRegistry,
    TradeBus,
};
use metrics::SharedMetrics;
use model::{now_ns, BookUpdateEvent, BookUpdateType, InstrumentType, SymbolId, SymbolInfo};
use net::{WsClient, WsConfig, WsHandler, WsPing, WsSender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub const BOOK_POOL_CAPACITY: usize = 2047;

const POLYMARKET_ORIGIN: &str = "https://polymarket.com";

pub(crate) struct PolymarketFeed {
    config: PolymarketConfig,
    registry: Arc<dyn SymbolRegistry>,
    book_bus: BookUpdateBus,
    trade_bus: TradeBus,
    pool: EventPool<BookUpdateEvent>,
    /// Token ids are long decimal strings; cache them locally.
    cache: SymbolCache,
    metrics: SharedMetrics,
}

impl PolymarketFeed {
    pub(crate) fn new(
        config: PolymarketConfig,
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
        serde_json::json!({
            "assets_ids": self.config.token_ids,
            "type": "market",
            "operation": "subscribe",
        })
        .to_string()
    }

    fn resolve_symbol(&self, token_id: &str) -> SymbolId {
        self.cache.get_or_resolve(token_id, || {
            self.registry
                .get_symbol_id("polymarket", token_id)
                .unwrap_or_else(|| {
                    self.registry.register_symbol(SymbolInfo::new(
                        "polymarket",
                        token_id,
                        InstrumentType::Spot,
                    ))
                })
        })
    }

    async fn publish_book(&self, frame: BookFrame, recv_ts_ns: u64) {
        if frame.bids.is_empty() && frame.asks.is_empty() {
            return;
        }
        let Some(mut event) = self.pool.acquire() else {
            self.metrics.inc_pool_exhausted();
            warn!(token_id = %frame.token_id, "book pool exhausted, dropping frame");
            return;
        };

        let symbol = self.resolve_symbol(&frame.token_id);
        event.recv_ts_ns = recv_ts_ns;
        event.update.symbol = symbol;
        event.update.update_type = BookUpdateType::Snapshot;
        event.update.instrument = InstrumentType::Spot;
        event.update.exchange_ts_ns = frame.exchange_ts_ns;
        event.update.bids.extend_from_slice(&frame.bids);
        event.update.asks.extend_from_slice(&frame.asks);

        event.publish_ts_ns = now_ns();
        if self.book_bus.send(event).await.is_err() {
            warn!("book bus closed, dropping event");
            return;
        }
        self.metrics.inc_book_events_published();
    }

    pub(crate) async fn handle_message(&self, text: &str) {
        let recv_ts_ns = now_ns();

        match parse_message(text) {
            Ok(PolyMessage::Books(frames)) => {
                for frame in frames {
                    self.publish_book(frame, recv_ts_ns).await;
                }
            }
            Ok(PolyMessage::Trade(frame)) => {
                let event = model::TradeEvent {
                    symbol: self.resolve_symbol(&frame.token_id),
                    instrument: InstrumentType::Spot,
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
            Ok(PolyMessage::Ignored) => {}
            Err(e) => {
                self.metrics.inc_parse_errors();
                warn!(error = %e, "failed to parse message");
            }
        }
    }
}

#[async_trait]
impl WsHandler for PolymarketFeed {
    async fn on_open(&self, out: &WsSender) {
        if self.config.token_ids.is_empty() {
            return;
        }
        info!(tokens = self.config.token_ids.len(), "connected, subscribing");
        out.send(self.subscription_payload());
    }

    async fn on_message(&self, text: &str, _out: &WsSender) {
        self.handle_message(text).await;
    }
}

pub struct PolymarketConnector {
    feed: Arc<PolymarketFeed>,
    ws: WsClient,
    running: AtomicBool,
}

impl PolymarketConnector {
    pub fn new(
        config: PolymarketConfig,
        registry: Arc<dyn SymbolRegistry>,
        book_bus: BookUpdateBus,
        trade_bus: TradeBus,
        metrics: SharedMetrics,
    ) -> Self {
        let ws = WsClient::new(
            WsConfig {
                url: config.ws_endpoint.clone(),
                origin: Some(POLYMARKET_ORIGIN.to_string()),
                reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
                ping: WsPing::Protocol(Duration::from_secs(config.ping_interval_sec.max(1))),
            },
            Arc::clone(&metrics),
        );

        let feed = Arc::new(PolymarketFeed::new(
            config,
            registry,
            book_bus,
            trade_bus,
            metrics,
        ));

        Self {
            feed,
            ws,
            running: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ExchangeConnector for PolymarketConnector {
    fn name(&self) -> &'static str {
        "polymarket"
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
        Ok(())
    }

    async fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.ws.stop().await;
        info!("connector stopped");
    }
}
