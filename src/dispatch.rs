//! Action dispatch
//!
//! Takes a classified event to its external action and folds whatever
//! happens into an `ActionOutcome`. Every capability failure is caught
//! here; nothing an adapter does can abort the batch or the process.
//!
//! Reward codes and trade directives report through the same outcome type,
//! but only reward outcomes ever reach the processed-key store. Trade
//! failures are logged and dropped, not retried.

use crate::client::{RewardRedeemer, TradeExecutor};
use crate::types::{ActionOutcome, OrderRequest, ParsedEvent, RedeemReply};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Reply messages that mean the code is spent for good. Matched by exact
/// equality; the redemption service's wording must be preserved bit-exact.
const ALREADY_CLAIMED: &str = "this gift box has already been claimed";
const FULLY_CLAIMED: &str = "this gift box has been fully claimed";

/// Map a decoded redemption reply to its outcome.
pub fn reply_outcome(reply: &RedeemReply) -> ActionOutcome {
    if reply.success {
        return ActionOutcome::Success;
    }
    match reply.message.as_deref() {
        Some(ALREADY_CLAIMED) => ActionOutcome::AlreadyClaimed,
        Some(FULLY_CLAIMED) => ActionOutcome::FullyClaimed,
        Some(other) => ActionOutcome::Failure(other.to_string()),
        None => ActionOutcome::Failure("redemption refused with no message".to_string()),
    }
}

pub struct Dispatcher {
    redeemer: Arc<dyn RewardRedeemer>,
    executor: Arc<dyn TradeExecutor>,
    /// Fixed size for every order; never derived from the message
    quantity: Decimal,
}

impl Dispatcher {
    pub fn new(
        redeemer: Arc<dyn RewardRedeemer>,
        executor: Arc<dyn TradeExecutor>,
        quantity: Decimal,
    ) -> Self {
        Self {
            redeemer,
            executor,
            quantity,
        }
    }

    pub async fn dispatch(&self, event: &ParsedEvent) -> ActionOutcome {
        match event {
            ParsedEvent::RewardCode { code } => self.redeem(code).await,
            ParsedEvent::TradeEntry {
                symbol,
                side,
                entry_price,
            } => {
                info!(
                    "Entry signal: {} {} around {}",
                    side.as_str(),
                    symbol,
                    entry_price
                );
                self.place(OrderRequest::market(symbol.clone(), *side, self.quantity))
                    .await
            }
            ParsedEvent::StopLoss { symbol, price, pnl } => {
                info!("Stop-loss signal: {} at {} (pnl {})", symbol, price, pnl);
                self.place(OrderRequest::stop_market(symbol.clone(), *price, self.quantity))
                    .await
            }
            ParsedEvent::TakeProfit { symbol, price, pnl } => {
                info!("Take-profit signal: {} at {} (pnl {})", symbol, price, pnl);
                self.place(OrderRequest::take_profit_market(
                    symbol.clone(),
                    *price,
                    self.quantity,
                ))
                .await
            }
            ParsedEvent::Unrecognized { raw_text } => {
                debug!("Nothing actionable in: {}", raw_text);
                ActionOutcome::Success
            }
        }
    }

    async fn redeem(&self, code: &str) -> ActionOutcome {
        match self.redeemer.redeem(code).await {
            Ok(reply) => {
                let outcome = reply_outcome(&reply);
                if outcome == ActionOutcome::Success {
                    info!("Redeemed gift box code {}", code);
                }
                outcome
            }
            Err(e) => {
                warn!("Redemption of {} failed: {}", code, e);
                ActionOutcome::Failure(e.to_string())
            }
        }
    }

    async fn place(&self, order: OrderRequest) -> ActionOutcome {
        match self.executor.place_order(order).await {
            Ok(confirmation) => {
                info!(
                    "Order accepted: {} id {} ({})",
                    confirmation.symbol, confirmation.order_id, confirmation.status
                );
                ActionOutcome::Success
            }
            Err(e) => {
                error!("Order placement failed: {}", e);
                ActionOutcome::Failure(e.to_string())
            }
        }
    }
}
