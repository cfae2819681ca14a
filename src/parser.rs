//! Message classification
//!
//! Turns raw channel text into a typed event. Pure and total: anything the
//! grammar does not accept comes back as `Unrecognized`, never an error.
//!
//! Character classes are spelled out as ASCII because the channel posts
//! wrap codes in emoji and the `regex` crate's `\w`/`\d` are Unicode-aware;
//! a code is strictly `[A-Za-z0-9_]`.

use crate::types::{ParsedEvent, Side};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

/// `#buy/#sell`, symbol tag, `#entry` with a price
static ENTRY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"#((?i:buy|sell))\s+#([0-9A-Za-z_]+)\s+#entry\s+([0-9]+(?:\.[0-9]+)?)")
        .expect("invalid entry pattern")
});

/// `#stop_loss`, symbol tag, `#price`, `#pnl` with a signed percent-or-number
static STOP_LOSS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"#stop_loss\s+#([0-9A-Za-z_]+)\s+#price\s+([0-9]+(?:\.[0-9]+)?)\s+#pnl\s+(-?[0-9]+(?:\.[0-9]+)?%?)",
    )
    .expect("invalid stop-loss pattern")
});

/// Same shape as stop-loss, tagged `#take_profit`
static TAKE_PROFIT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"#take_profit\s+#([0-9A-Za-z_]+)\s+#price\s+([0-9]+(?:\.[0-9]+)?)\s+#pnl\s+(-?[0-9]+(?:\.[0-9]+)?%?)",
    )
    .expect("invalid take-profit pattern")
});

/// Whole message: optional non-word prefix, then one trailing word run.
/// Anchored on both ends, so anything with interior whitespace fails here.
static REWARD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^0-9A-Za-z_]*([0-9A-Za-z_]+)$").expect("invalid reward pattern"));

/// Classify one message. Trade patterns first (priority order: entry,
/// stop-loss, take-profit), then the reward-code rule.
pub fn parse(raw_text: &str) -> ParsedEvent {
    if let Some(caps) = ENTRY_PATTERN.captures(raw_text) {
        let side = if caps[1].eq_ignore_ascii_case("buy") {
            Side::Buy
        } else {
            Side::Sell
        };
        if let Some(entry_price) = parse_decimal(&caps[3]) {
            return ParsedEvent::TradeEntry {
                symbol: caps[2].to_string(),
                side,
                entry_price,
            };
        }
    }

    if let Some(caps) = STOP_LOSS_PATTERN.captures(raw_text) {
        if let Some(price) = parse_decimal(&caps[2]) {
            return ParsedEvent::StopLoss {
                symbol: caps[1].to_string(),
                price,
                pnl: caps[3].to_string(),
            };
        }
    }

    if let Some(caps) = TAKE_PROFIT_PATTERN.captures(raw_text) {
        if let Some(price) = parse_decimal(&caps[2]) {
            return ParsedEvent::TakeProfit {
                symbol: caps[1].to_string(),
                price,
                pnl: caps[3].to_string(),
            };
        }
    }

    if let Some(caps) = REWARD_PATTERN.captures(raw_text) {
        return ParsedEvent::RewardCode {
            code: caps[1].to_string(),
        };
    }

    ParsedEvent::Unrecognized {
        raw_text: raw_text.to_string(),
    }
}

/// Grammar-accepted digits can still overflow Decimal's 96-bit mantissa;
/// such text falls through to the next rule instead of erroring.
fn parse_decimal(s: &str) -> Option<Decimal> {
    s.parse::<Decimal>().ok()
}
