//! Client for the external signer daemon.
//!
//! Wallet signatures are produced out of process. The wire protocol is
//! length-prefixed JSON over a Unix-domain socket, with a TCP loopback
//! fallback: a big-endian `u32` length, then the payload, in both
//! directions. The daemon must answer within a short deadline or the order
//! operation is aborted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("signer unavailable: {0}")]
    Unavailable(String),

    #[error("signer protocol error: {0}")]
    Protocol(String),

    #[error("signer deadline exceeded")]
    Timeout,
}

#[derive(Debug, Clone)]
pub struct SignerConfig {
    pub socket_path: PathBuf,
    /// `host:port` loopback fallback when the Unix socket is unreachable.
    pub tcp_fallback: Option<String>,
    pub timeout: Duration,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/dev/shm/hl_sign.sock"),
            tcp_fallback: None,
            timeout: Duration::from_millis(50),
        }
    }
}

/// One signing request, serialized verbatim onto the wire.
#[derive(Debug, Serialize)]
pub struct SignRequest<'a> {
    pub action_json: &'a str,
    pub nonce: u64,
    pub is_mainnet: bool,
    pub private_key: &'a str,
    pub active_pool: Option<&'a str>,
    pub expires_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HlSignature {
    pub r: String,
    pub s: String,
    pub v: u8,
}

/// Signature provider consumed by the executor.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, request: SignRequest<'_>) -> Result<HlSignature, SignerError>;
}

pub struct SignerDaemonClient {
    config: SignerConfig,
}

impl SignerDaemonClient {
    pub fn new(config: SignerConfig) -> Self {
        Self { config }
    }

    async fn round_trip(&self, payload: Vec<u8>) -> Result<Vec<u8>, SignerError> {
        match UnixStream::connect(&self.config.socket_path).await {
            Ok(stream) => exchange(stream, payload).await,
            Err(unix_err) => {
                let Some(addr) = &self.config.tcp_fallback else {
                    return Err(SignerError::Unavailable(unix_err.to_string()));
                };
                let stream = TcpStream::connect(addr)
                    .await
                    .map_err(|e| SignerError::Unavailable(e.to_string()))?;
                exchange(stream, payload).await
            }
        }
    }
}

async fn exchange<S>(mut stream: S, payload: Vec<u8>) -> Result<Vec<u8>, SignerError>
where
    S: AsyncReadExt + AsyncWriteExt + Unpin,
{
    let len = u32::try_from(payload.len())
        .map_err(|_| SignerError::Protocol("request too large".into()))?;
    stream
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| SignerError::Unavailable(e.to_string()))?;
    stream
        .write_all(&payload)
        .await
        .map_err(|e| SignerError::Unavailable(e.to_string()))?;

    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| SignerError::Unavailable(e.to_string()))?;
    let response_len = u32::from_be_bytes(len_buf) as usize;

    let mut response = vec![0u8; response_len];
    stream
        .read_exact(&mut response)
        .await
        .map_err(|e| SignerError::Unavailable(e.to_string()))?;
    Ok(response)
}

#[async_trait]
impl Signer for SignerDaemonClient {
    async fn sign(&self, request: SignRequest<'_>) -> Result<HlSignature, SignerError> {
        let payload =
            serde_json::to_vec(&request).map_err(|e| SignerError::Protocol(e.to_string()))?;

        let response = tokio::time::timeout(self.config.timeout, self.round_trip(payload))
            .await
            .map_err(|_| SignerError::Timeout)??;

        serde_json::from_slice(&response).map_err(|e| SignerError::Protocol(e.to_string()))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    fn temp_socket_path() -> PathBuf {
        std::env::temp_dir().join(format!("hl-signer-test-{}.sock", uuid::Uuid::new_v4()))
    }

    async fn serve_once(listener: UnixListener, response: &'static [u8]) {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.unwrap();
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut request = vec![0u8; len];
        stream.read_exact(&mut request).await.unwrap();

        // The request must be well-formed JSON with the expected fields.
        let value: serde_json::Value = serde_json::from_slice(&request).unwrap();
        assert!(value.get("action_json").is_some());
        assert!(value.get("nonce").is_some());
        assert!(value.get("private_key").is_some());

        let len = (response.len() as u32).to_be_bytes();
        stream.write_all(&len).await.unwrap();
        stream.write_all(response).await.unwrap();
    }

    #[tokio::test]
    async fn test_sign_round_trip() {
        let path = temp_socket_path();
        let listener = UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(serve_once(listener, br#"{"r":"0x1","s":"0x2","v":27}"#));

        let client = SignerDaemonClient::new(SignerConfig {
            socket_path: path.clone(),
            tcp_fallback: None,
            timeout: Duration::from_millis(500),
        });

        let signature = client
            .sign(SignRequest {
                action_json: r#"{"type":"order"}"#,
                nonce: 1,
                is_mainnet: true,
                private_key: "deadbeef",
                active_pool: None,
                expires_after: None,
            })
            .await
            .unwrap();

        assert_eq!(
            signature,
            HlSignature {
                r: "0x1".into(),
                s: "0x2".into(),
                v: 27
            }
        );
        server.await.unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_missing_daemon_is_unavailable() {
        let client = SignerDaemonClient::new(SignerConfig {
            socket_path: temp_socket_path(),
            tcp_fallback: None,
            timeout: Duration::from_millis(100),
        });

        let err = client
            .sign(SignRequest {
                action_json: "{}",
                nonce: 1,
                is_mainnet: false,
                private_key: "00",
                active_pool: None,
                expires_after: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SignerError::Unavailable(_)));
    }
}
