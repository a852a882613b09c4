//! Broker error types.

use thiserror::Error;

pub type BrokerResult<T> = Result<T, BrokerError>;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Declaration failed: {0}")]
    DeclareFailed(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Consume failed: {0}")]
    ConsumeFailed(String),

    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BrokerError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn declare_failed(msg: impl Into<String>) -> Self {
        Self::DeclareFailed(msg.into())
    }
}
