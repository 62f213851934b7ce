use crate::error::ConnectorError;
use async_trait::async_trait;

/// A venue connector: ingests public (and optionally private) websocket
/// streams and publishes events to the downstream buses.
///
/// Lifecycle is `Idle -> Running -> Stopped`. `start` validates config before
/// any state changes and is idempotent; `stop` joins every owned task before
/// returning and is also idempotent. A stopped connector is not restartable;
/// build a fresh instance.
#[async_trait]
pub trait ExchangeConnector: Send {
    fn name(&self) -> &'static str;

    async fn start(&mut self) -> Result<(), ConnectorError>;

    async fn stop(&mut self);
}
