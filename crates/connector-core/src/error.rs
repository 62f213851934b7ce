use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("channel closed")]
    ChannelClosed,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("shutdown requested")]
    Shutdown,
}
