use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
