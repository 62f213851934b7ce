//! Reconnecting websocket client.
//!
//! A single worker task owns the connection: it dispatches open/message/close
//! callbacks, answers protocol pings, drains the outbound queue through one
//! writer (so sends from any task never interleave), and reconnects after a
//! fixed delay until stopped.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use metrics::SharedMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Timeout for websocket connection attempts.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Keep-alive mode. Some venues require an application-level text ping
/// instead of a protocol ping.
#[derive(Debug, Clone)]
pub enum WsPing {
    Disabled,
    /// Protocol-level ping frames at the given interval.
    Protocol(Duration),
    /// Application-level text frame at the given interval.
    Text { payload: String, interval: Duration },
}

#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: String,
    /// Origin header value, when the venue requires one.
    pub origin: Option<String>,
    pub reconnect_delay: Duration,
    pub ping: WsPing,
}

/// Queue handle for outbound text frames. The worker's single writer drains
/// the queue in order.
#[derive(Clone)]
pub struct WsSender {
    tx: mpsc::UnboundedSender<String>,
}

impl WsSender {
    /// A detached sender plus the receiving end of its queue. Used for
    /// driving handlers outside a live session, e.g. in tests.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, text: impl Into<String>) {
        // Worker gone means the session is over; the frame is moot.
        let _ = self.tx.send(text.into());
    }
}

/// Connection event callbacks, invoked on the worker task.
#[async_trait]
pub trait WsHandler: Send + Sync + 'static {
    /// Connection established; subscriptions go out here.
    async fn on_open(&self, out: &WsSender);

    async fn on_message(&self, text: &str, out: &WsSender);

    async fn on_close(&self, code: Option<u16>, reason: &str) {
        let _ = (code, reason);
    }
}

enum SessionEnd {
    Shutdown,
    Lost,
}

pub struct WsClient {
    config: WsConfig,
    metrics: SharedMetrics,
    shutdown_tx: watch::Sender<bool>,
    worker: Option<JoinHandle<()>>,
}

impl WsClient {
    pub fn new(config: WsConfig, metrics: SharedMetrics) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            metrics,
            shutdown_tx,
            worker: None,
        }
    }

    /// Spawn the worker. Idempotent; a stopped client stays stopped.
    pub fn start(&mut self, handler: Arc<dyn WsHandler>) {
        if self.worker.is_some() || *self.shutdown_tx.borrow() {
            return;
        }
        let config = self.config.clone();
        let metrics = Arc::clone(&self.metrics);
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.worker = Some(tokio::spawn(run_worker(
            config,
            handler,
            metrics,
            shutdown_rx,
        )));
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Signal shutdown, close the socket and wait for the worker to exit.
    /// Idempotent.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }
}

async fn run_worker(
    config: WsConfig,
    handler: Arc<dyn WsHandler>,
    metrics: SharedMetrics,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            return;
        }

        match connect(&config, &mut shutdown_rx).await {
            Some(Ok(stream)) => {
                info!(url = %config.url, "WebSocket connected");
                if let SessionEnd::Shutdown =
                    run_session(stream, &config, &handler, &metrics, &mut shutdown_rx).await
                {
                    return;
                }
            }
            Some(Err(e)) => {
                warn!(url = %config.url, error = %e, "WebSocket connect failed");
                metrics.inc_ws_errors();
            }
            None => return,
        }

        metrics.inc_reconnects();
        warn!(
            url = %config.url,
            delay_ms = config.reconnect_delay.as_millis() as u64,
            "WebSocket disconnected, reconnecting"
        );

        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return;
                }
            }
        }
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// `None` means shutdown was requested mid-connect.
async fn connect(
    config: &WsConfig,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Option<Result<WsStream, String>> {
    let mut request = match config.url.as_str().into_client_request() {
        Ok(r) => r,
        Err(e) => return Some(Err(e.to_string())),
    };
    if let Some(origin) = &config.origin {
        match origin.parse() {
            Ok(value) => {
                request.headers_mut().insert("Origin", value);
            }
            Err(_) => return Some(Err(format!("invalid origin header: {origin}"))),
        }
    }

    tokio::select! {
        result = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(request)) => {
            Some(match result {
                Ok(Ok((stream, _))) => Ok(stream),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err("connection timeout".to_string()),
            })
        }
        _ = shutdown_rx.changed() => {
            if *shutdown_rx.borrow() {
                None
            } else {
                Some(Err("connection interrupted".to_string()))
            }
        }
    }
}

async fn run_session(
    stream: WsStream,
    config: &WsConfig,
    handler: &Arc<dyn WsHandler>,
    metrics: &SharedMetrics,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let sender = WsSender { tx: out_tx };

    handler.on_open(&sender).await;

    let mut ping_interval = match &config.ping {
        WsPing::Disabled => None,
        WsPing::Protocol(interval) | WsPing::Text { interval, .. } => {
            let mut timer = tokio::time::interval(*interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // Skip the immediate first tick.
            timer.reset();
            Some(timer)
        }
    };

    loop {
        let ping_tick = async {
            match ping_interval.as_mut() {
                Some(timer) => {
                    timer.tick().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("shutdown requested, closing websocket");
                    let _ = write.close().await;
                    return SessionEnd::Shutdown;
                }
            }

            Some(text) = out_rx.recv() => {
                if let Err(e) = write.send(Message::Text(text)).await {
                    warn!(error = %e, "websocket send failed");
                    metrics.inc_ws_errors();
                    return SessionEnd::Lost;
                }
            }

            _ = ping_tick => {
                let frame = match &config.ping {
                    WsPing::Protocol(_) => Message::Ping(Vec::new()),
                    WsPing::Text { payload, .. } => Message::Text(payload.clone()),
                    WsPing::Disabled => continue,
                };
                if let Err(e) = write.send(frame).await {
                    warn!(error = %e, "websocket ping failed");
                    metrics.inc_ws_errors();
                    return SessionEnd::Lost;
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics.inc_messages_received();
                        handler.on_message(&text, &sender).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        debug!("ping received, answering pong");
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            warn!(error = %e, "pong send failed");
                            metrics.inc_ws_errors();
                            return SessionEnd::Lost;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (Some(u16::from(f.code)), f.reason.to_string()))
                            .unwrap_or((None, String::new()));
                        info!(code = ?code, reason = %reason, "websocket closed by server");
                        handler.on_close(code, &reason).await;
                        return SessionEnd::Lost;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket read error");
                        metrics.inc_ws_errors();
                        return SessionEnd::Lost;
                    }
                    None => {
                        info!("websocket stream ended");
                        return SessionEnd::Lost;
                    }
                }
            }
        }
    }
}
