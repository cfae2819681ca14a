//! External capabilities and their HTTP adapters
//!
//! The core loop only sees the three traits here; the concrete clients
//! (Telegram feed, gift-box endpoint, futures exchange) are thin and
//! replaceable behind them.

pub mod binance;
pub mod giftbox;
pub mod telegram;

pub use binance::FuturesClient;
pub use giftbox::GiftBoxClient;
pub use telegram::TelegramSource;

use crate::error::Result;
use crate::types::{OrderConfirmation, OrderRequest, RawMessage, RedeemReply};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Yields recent messages for a named channel
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Most recent `limit` messages for `channel`, oldest first.
    async fn fetch(&self, channel: &str, limit: usize) -> Result<Vec<RawMessage>>;
}

/// Attempts redemption of a reward code
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RewardRedeemer: Send + Sync {
    /// The endpoint reports refusals in-band; `Err` means the reply itself
    /// could not be obtained.
    async fn redeem(&self, code: &str) -> Result<RedeemReply>;
}

/// Places futures orders
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    async fn place_order(&self, order: OrderRequest) -> Result<OrderConfirmation>;
}
