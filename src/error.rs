//! Error types used across the bot

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Error, Debug)]
pub enum BotError {
    /// Message feed could not be reached or refused the request.
    #[error("Message source error: {0}")]
    Source(String),

    /// Gift-box redemption failed before an in-band reply could be decoded.
    #[error("Redeem error: {0}")]
    Redeem(String),

    /// Exchange rejected or failed an order request.
    #[error("Exchange error: {0}")]
    Exchange(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for BotError {
    fn from(e: config::ConfigError) -> Self {
        BotError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(e: serde_json::Error) -> Self {
        BotError::Internal(format!("JSON error: {}", e))
    }
}
