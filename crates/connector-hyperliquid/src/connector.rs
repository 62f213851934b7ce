//! Hyperliquid market-data connector.

use crate::config::HyperliquidConfig;
use crate::parser::{parse_message, HlMessage};
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

const HYPERLIQUID_ORIGIN: &str = "https://app.hyperliquid.xyz";

/// The venue drops connections that subscribe too fast; pause after every
/// batch of coins.
const SUBSCRIBE_PACE_EVERY: usize = 5;
const SUBSCRIBE_PACE_DELAY: Duration = Duration::from_millis(50);

/// Application-level ping cadence.
const PING_INTERVAL: Duration = Duration::from_secs(30);

pub(crate) struct HyperliquidFeed {
    config: HyperliquidConfig,
    registry: Arc<dyn SymbolRegistry>,
    book_bus: BookUpdateBus,
    trade_bus: TradeBus,
    pool: EventPool<BookUpdateEvent>,
    cache: SymbolCache,
    metrics: SharedMetrics,
}

impl HyperliquidFeed {
    pub(crate) fn new(
        config: HyperliquidConfig,
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

    fn resolve_symbol(&self, coin: &str) -> SymbolId {
        self.cache.get_or_resolve(coin, || {
            self.registry
                .get_symbol_id("hyperliquid", coin)
                .unwrap_or_else(|| {
                    self.registry.register_symbol(SymbolInfo::new(
                        "hyperliquid",
                        coin,
                        InstrumentType::Future,
                    ))
                })
        })
    }

    pub(crate) async fn handle_message(&self, text: &str) {
        let recv_ts_ns = now_ns();

        match parse_message(text) {
            Ok(HlMessage::Book(frame)) => {
                if frame.bids.is_empty() && frame.asks.is_empty() {
                    return;
                }
                let Some(mut event) = self.pool.acquire() else {
                    self.metrics.inc_pool_exhausted();
                    warn!(coin = %frame.coin, "book pool exhausted, dropping frame");
                    return;
                };

                let symbol = self.resolve_symbol(&frame.coin);
                event.recv_ts_ns = recv_ts_ns;
                event.update.symbol = symbol;
                event.update.update_type = BookUpdateType::Snapshot;
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
            Ok(HlMessage::Trades(frames)) => {
                for frame in frames {
                    let symbol = self.resolve_symbol(&frame.coin);
                    let instrument = self
                        .registry
                        .get_symbol_info(symbol)
                        .map(|info| info.instrument)
                        .unwrap_or(InstrumentType::Future);

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
            Ok(HlMessage::Ignored) => {}
            Err(e) => {
                self.metrics.inc_parse_errors();
                warn!(error = %e, "failed to parse message");
            }
        }
    }
}

fn subscribe_frame(kind: &str, coin: &str) -> String {
    serde_json::json!({
        "method": "subscribe",
        "subscription": {"type": kind, "coin": coin},
    })
    .to_string()
}

#[async_trait]
impl WsHandler for HyperliquidFeed {
    async fn on_open(&self, out: &WsSender) {
        info!(coins = self.config.symbols.len(), "connected, subscribing");
        for (index, coin) in self.config.symbols.iter().enumerate() {
            out.send(subscribe_frame("l2Book", coin));
            out.send(subscribe_frame("trades", coin));

            if (index + 1) % SUBSCRIBE_PACE_EVERY == 0 {
                tokio::time::sleep(SUBSCRIBE_PACE_DELAY).await;
            }
        }
    }

    async fn on_message(&self, text: &str, _out: &WsSender) {
        self.handle_message(text).await;
    }
}

pub struct HyperliquidConnector {
    feed: Arc<HyperliquidFeed>,
    ws: WsClient,
    running: AtomicBool,
}

impl HyperliquidConnector {
    pub fn new(
        config: HyperliquidConfig,
        registry: Arc<dyn SymbolRegistry>,
        book_bus: BookUpdateBus,
        trade_bus: TradeBus,
        metrics: SharedMetrics,
    ) -> Self {
        let ws = WsClient::new(
            WsConfig {
                url: config.ws_endpoint.clone(),
                origin: Some(HYPERLIQUID_ORIGIN.to_string()),
                reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
                ping: WsPing::Text {
                    payload: r#"{"method":"ping"}"#.to_string(),
                    interval: PING_INTERVAL,
                },
            },
            Arc::clone(&metrics),
        );

        let feed = Arc::new(HyperliquidFeed::new(
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
impl ExchangeConnector for HyperliquidConnector {
    fn name(&self) -> &'static str {
        "hyperliquid"
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
