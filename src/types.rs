//! Core types shared across the bot
//!
//! Messages come in from the feed, get classified into events, and events
//! turn into redemption calls or futures orders. Everything the poll loop,
//! dispatcher, and adapters exchange is defined here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One message as fetched from the feed
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    /// Channel the message was posted to (username, no leading @)
    pub channel: String,
    /// Source-assigned message id
    pub message_id: i64,
    /// Message text
    pub text: String,
}

/// Order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// Futures order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    #[serde(rename = "MARKET")]
    Market,
    #[serde(rename = "STOP_MARKET")]
    StopMarket,
    #[serde(rename = "TAKE_PROFIT_MARKET")]
    TakeProfitMarket,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Market => "MARKET",
            OrderKind::StopMarket => "STOP_MARKET",
            OrderKind::TakeProfitMarket => "TAKE_PROFIT_MARKET",
        }
    }
}

/// Classification of one message's text
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// A redeemable reward code
    RewardCode { code: String },
    /// Open a position at market
    TradeEntry {
        symbol: String,
        side: Side,
        entry_price: Decimal,
    },
    /// Place a stop-loss at the given trigger price
    StopLoss {
        symbol: String,
        price: Decimal,
        pnl: String,
    },
    /// Place a take-profit at the given trigger price
    TakeProfit {
        symbol: String,
        price: Decimal,
        pnl: String,
    },
    /// Nothing actionable
    Unrecognized { raw_text: String },
}

impl ParsedEvent {
    /// Short tag for logging and synthetic dedup keys
    pub fn tag(&self) -> &'static str {
        match self {
            ParsedEvent::RewardCode { .. } => "reward",
            ParsedEvent::TradeEntry { .. } => "entry",
            ParsedEvent::StopLoss { .. } => "stop_loss",
            ParsedEvent::TakeProfit { .. } => "take_profit",
            ParsedEvent::Unrecognized { .. } => "unrecognized",
        }
    }
}

/// Order request handed to the trade executor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub kind: OrderKind,
    pub quantity: Decimal,
    /// Trigger price, present only for conditional kinds
    pub stop_price: Option<Decimal>,
}

impl OrderRequest {
    pub fn market(symbol: String, side: Side, quantity: Decimal) -> Self {
        Self {
            symbol,
            side,
            kind: OrderKind::Market,
            quantity,
            stop_price: None,
        }
    }

    /// Conditional stop-loss exit; always a sell
    pub fn stop_market(symbol: String, stop_price: Decimal, quantity: Decimal) -> Self {
        Self {
            symbol,
            side: Side::Sell,
            kind: OrderKind::StopMarket,
            quantity,
            stop_price: Some(stop_price),
        }
    }

    /// Conditional take-profit exit; always a sell
    pub fn take_profit_market(symbol: String, stop_price: Decimal, quantity: Decimal) -> Self {
        Self {
            symbol,
            side: Side::Sell,
            kind: OrderKind::TakeProfitMarket,
            quantity,
            stop_price: Some(stop_price),
        }
    }
}

/// Exchange acknowledgement for a placed order
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    pub order_id: i64,
    pub symbol: String,
    pub status: String,
}

/// Decoded gift-box endpoint reply
#[derive(Debug, Clone, Deserialize)]
pub struct RedeemReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of dispatching one event
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Action went through
    Success,
    /// Code was valid but someone got there first
    AlreadyClaimed,
    /// Code exhausted, nothing left to claim
    FullyClaimed,
    /// Action failed; eligible for retry on a later poll
    Failure(String),
}

impl ActionOutcome {
    /// Terminal outcomes get their key recorded and are never dispatched again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ActionOutcome::Failure(_))
    }
}

/// What one pass did with one message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Redeemed,
    AlreadyClaimed,
    FullyClaimed,
    RedeemFailed,
    Duplicate,
    OrderPlaced,
    OrderFailed,
    Unrecognized,
    DryRun,
}

/// Per-message summary returned by the on-demand pass and logged by ticks
#[derive(Debug, Clone, Serialize)]
pub struct MessageReport {
    pub channel: String,
    pub message_id: i64,
    pub text: String,
    pub disposition: Disposition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub observed_at: DateTime<Utc>,
}
