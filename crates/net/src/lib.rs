//! Network plumbing shared by the venue connectors: a connection-pooled HTTPS
//! transport for signed REST calls and a reconnecting websocket client for
//! market-data and private streams.

mod http;
mod ws;

pub use http::{HttpPoolConfig, HttpTransport, HttpTransportConfig, Transport, TransportError};
pub use ws::{WsClient, WsConfig, WsHandler, WsPing, WsSender};
