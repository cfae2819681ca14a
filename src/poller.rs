//! Poll loop
//!
//! The single logical worker of the process. On a fixed cadence it fetches
//! the latest channel messages and routes each one through parse → dedup
//! check → dispatch → dedup update. Messages inside one pass are processed
//! concurrently; passes themselves never overlap.
//!
//! The same pass runs for the timer and for the on-demand HTTP endpoint,
//! serialized through one pass mutex, so a manual query can never race the
//! timer into double-dispatching a code that is not yet in the store.

use crate::client::MessageSource;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::parser;
use crate::store::ProcessedStore;
use crate::types::{ActionOutcome, Disposition, MessageReport, ParsedEvent, RawMessage};
use chrono::Utc;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub channel: String,
    pub fetch_limit: usize,
    pub poll_interval: Duration,
    pub dry_run: bool,
    /// Opt-in dedup of trade directives by synthetic message key
    pub dedup_trades: bool,
}

impl PollerSettings {
    pub fn from_config(config: &Config, dry_run: bool) -> Self {
        Self {
            channel: config.telegram.channel.clone(),
            fetch_limit: config.telegram.fetch_limit,
            poll_interval: Duration::from_secs(config.telegram.poll_interval_secs),
            dry_run,
            dedup_trades: config.dedup.trades,
        }
    }
}

pub struct Poller {
    source: Arc<dyn MessageSource>,
    dispatcher: Dispatcher,
    store: Arc<ProcessedStore>,
    settings: PollerSettings,
    /// Held for the duration of one fetch+process pass
    pass_lock: Mutex<()>,
}

impl Poller {
    pub fn new(
        source: Arc<dyn MessageSource>,
        dispatcher: Dispatcher,
        store: Arc<ProcessedStore>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            source,
            dispatcher,
            store,
            settings,
            pass_lock: Mutex::new(()),
        }
    }

    /// Run the timer loop forever. A pass that outlives the interval delays
    /// the next tick instead of stacking a burst behind it.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            "👀 Watching {} every {}s (limit {})",
            self.settings.channel,
            self.settings.poll_interval.as_secs(),
            self.settings.fetch_limit
        );
        if self.settings.dry_run {
            info!("Dry-run mode: no redemptions, no orders, no recording");
        }

        loop {
            ticker.tick().await;
            let reports = self.process_channel(&self.settings.channel).await;
            if !reports.is_empty() {
                debug!(
                    "Pass over {} handled {} message(s)",
                    self.settings.channel,
                    reports.len()
                );
            }
        }
    }

    /// One fetch+process pass for a channel. Fetch failure is a skipped pass,
    /// not an error; per-message failures surface as dispositions.
    pub async fn process_channel(&self, channel: &str) -> Vec<MessageReport> {
        let _pass = self.pass_lock.lock().await;

        let messages = match self.source.fetch(channel, self.settings.fetch_limit).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Fetch from {} failed, skipping pass: {}", channel, e);
                return Vec::new();
            }
        };
        if messages.is_empty() {
            return Vec::new();
        }

        join_all(messages.into_iter().map(|m| self.process_message(m))).await
    }

    pub async fn processed_keys(&self) -> usize {
        self.store.len().await
    }

    async fn process_message(&self, message: RawMessage) -> MessageReport {
        let event = parser::parse(&message.text);
        match &event {
            ParsedEvent::RewardCode { code } => {
                if self.store.contains(code).await {
                    debug!("Skipping already processed code {}", code);
                    return report(&message, Disposition::Duplicate, None);
                }
                if self.settings.dry_run {
                    info!("Dry-run: would redeem {}", code);
                    return report(
                        &message,
                        Disposition::DryRun,
                        Some(format!("would redeem {}", code)),
                    );
                }

                let outcome = self.dispatcher.dispatch(&event).await;
                if outcome.is_terminal() {
                    if let Err(e) = self.store.record(code).await {
                        error!("Failed to record processed code {}: {}", code, e);
                    }
                }
                match outcome {
                    ActionOutcome::Success => report(&message, Disposition::Redeemed, None),
                    ActionOutcome::AlreadyClaimed => {
                        report(&message, Disposition::AlreadyClaimed, None)
                    }
                    ActionOutcome::FullyClaimed => {
                        report(&message, Disposition::FullyClaimed, None)
                    }
                    ActionOutcome::Failure(reason) => {
                        report(&message, Disposition::RedeemFailed, Some(reason))
                    }
                }
            }
            ParsedEvent::TradeEntry { .. }
            | ParsedEvent::StopLoss { .. }
            | ParsedEvent::TakeProfit { .. } => {
                let trade_key =
                    format!("{}:{}:{}", message.channel, message.message_id, event.tag());
                if self.settings.dedup_trades && self.store.contains(&trade_key).await {
                    debug!("Skipping already processed directive {}", trade_key);
                    return report(&message, Disposition::Duplicate, None);
                }
                if self.settings.dry_run {
                    info!("Dry-run: would place order for '{}'", message.text);
                    return report(&message, Disposition::DryRun, None);
                }

                match self.dispatcher.dispatch(&event).await {
                    ActionOutcome::Failure(reason) => {
                        report(&message, Disposition::OrderFailed, Some(reason))
                    }
                    _ => {
                        if self.settings.dedup_trades {
                            if let Err(e) = self.store.record(&trade_key).await {
                                error!("Failed to record directive {}: {}", trade_key, e);
                            }
                        }
                        report(&message, Disposition::OrderPlaced, None)
                    }
                }
            }
            ParsedEvent::Unrecognized { .. } => {
                if !self.settings.dry_run {
                    self.dispatcher.dispatch(&event).await;
                }
                report(&message, Disposition::Unrecognized, None)
            }
        }
    }
}

fn report(message: &RawMessage, disposition: Disposition, detail: Option<String>) -> MessageReport {
    MessageReport {
        channel: message.channel.clone(),
        message_id: message.message_id,
        text: message.text.clone(),
        disposition,
        detail,
        observed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockMessageSource, MockRewardRedeemer, MockTradeExecutor};
    use crate::error::BotError;
    use crate::types::{OrderConfirmation, RedeemReply};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn message(id: i64, text: &str) -> RawMessage {
        RawMessage {
            channel: "binance_box_channel".to_string(),
            message_id: id,
            text: text.to_string(),
        }
    }

    fn settings() -> PollerSettings {
        PollerSettings {
            channel: "binance_box_channel".to_string(),
            fetch_limit: 2,
            poll_interval: Duration::from_secs(5),
            dry_run: false,
            dedup_trades: false,
        }
    }

    async fn poller(
        source: MockMessageSource,
        redeemer: MockRewardRedeemer,
        executor: MockTradeExecutor,
        dir: &TempDir,
        settings: PollerSettings,
    ) -> Poller {
        let store = Arc::new(
            ProcessedStore::load(dir.path().join("processed.txt"))
                .await
                .unwrap(),
        );
        let dispatcher = Dispatcher::new(Arc::new(redeemer), Arc::new(executor), dec!(1));
        Poller::new(Arc::new(source), dispatcher, store, settings)
    }

    fn ok_reply() -> RedeemReply {
        RedeemReply {
            success: true,
            message: None,
        }
    }

    fn confirmation() -> OrderConfirmation {
        OrderConfirmation {
            order_id: 7,
            symbol: "BTCUSDT".to_string(),
            status: "NEW".to_string(),
        }
    }

    #[tokio::test]
    async fn test_new_reward_code_redeemed_and_recorded() {
        let mut source = MockMessageSource::new();
        source
            .expect_fetch()
            .returning(|_, _| Ok(vec![message(1, "🎁ABC123")]));
        let mut redeemer = MockRewardRedeemer::new();
        redeemer
            .expect_redeem()
            .withf(|code| code == "ABC123")
            .times(1)
            .returning(|_| Ok(ok_reply()));

        let dir = TempDir::new().unwrap();
        let p = poller(source, redeemer, MockTradeExecutor::new(), &dir, settings()).await;

        let reports = p.process_channel("binance_box_channel").await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].disposition, Disposition::Redeemed);
        assert!(p.store.contains("ABC123").await);
    }

    #[tokio::test]
    async fn test_duplicate_code_not_redispatched() {
        let mut source = MockMessageSource::new();
        source
            .expect_fetch()
            .times(2)
            .returning(|_, _| Ok(vec![message(1, "🎁ABC123")]));
        let mut redeemer = MockRewardRedeemer::new();
        redeemer
            .expect_redeem()
            .times(1)
            .returning(|_| Ok(ok_reply()));

        let dir = TempDir::new().unwrap();
        let p = poller(source, redeemer, MockTradeExecutor::new(), &dir, settings()).await;

        let first = p.process_channel("binance_box_channel").await;
        assert_eq!(first[0].disposition, Disposition::Redeemed);

        let second = p.process_channel("binance_box_channel").await;
        assert_eq!(second[0].disposition, Disposition::Duplicate);
        assert_eq!(p.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_redemption_retried_next_pass() {
        let mut source = MockMessageSource::new();
        source
            .expect_fetch()
            .times(2)
            .returning(|_, _| Ok(vec![message(1, "🎁ABC123")]));

        let calls = AtomicUsize::new(0);
        let mut redeemer = MockRewardRedeemer::new();
        redeemer.expect_redeem().times(2).returning(move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(RedeemReply {
                    success: false,
                    message: Some("server busy".to_string()),
                })
            } else {
                Ok(ok_reply())
            }
        });

        let dir = TempDir::new().unwrap();
        let p = poller(source, redeemer, MockTradeExecutor::new(), &dir, settings()).await;

        let first = p.process_channel("binance_box_channel").await;
        assert_eq!(first[0].disposition, Disposition::RedeemFailed);
        assert_eq!(first[0].detail.as_deref(), Some("server busy"));
        assert!(!p.store.contains("ABC123").await);

        let second = p.process_channel("binance_box_channel").await;
        assert_eq!(second[0].disposition, Disposition::Redeemed);
        assert!(p.store.contains("ABC123").await);
    }

    #[tokio::test]
    async fn test_terminal_refusal_recorded() {
        let mut source = MockMessageSource::new();
        source
            .expect_fetch()
            .returning(|_, _| Ok(vec![message(1, "🎁ABC123")]));
        let mut redeemer = MockRewardRedeemer::new();
        redeemer.expect_redeem().times(1).returning(|_| {
            Ok(RedeemReply {
                success: false,
                message: Some("this gift box has already been claimed".to_string()),
            })
        });

        let dir = TempDir::new().unwrap();
        let p = poller(source, redeemer, MockTradeExecutor::new(), &dir, settings()).await;

        let reports = p.process_channel("binance_box_channel").await;
        assert_eq!(reports[0].disposition, Disposition::AlreadyClaimed);
        assert!(p.store.contains("ABC123").await);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_pass() {
        let mut source = MockMessageSource::new();
        source
            .expect_fetch()
            .returning(|_, _| Err(BotError::Source("timed out".to_string())));

        let dir = TempDir::new().unwrap();
        let p = poller(
            source,
            MockRewardRedeemer::new(),
            MockTradeExecutor::new(),
            &dir,
            settings(),
        )
        .await;

        let reports = p.process_channel("binance_box_channel").await;
        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_dispatches_and_records_nothing() {
        let mut source = MockMessageSource::new();
        source.expect_fetch().returning(|_, _| {
            Ok(vec![
                message(1, "🎁ABC123"),
                message(2, "#buy #BTCUSDT #entry 42000.5"),
            ])
        });

        let dir = TempDir::new().unwrap();
        let mut s = settings();
        s.dry_run = true;
        // No expectations: any capability call panics the test
        let p = poller(
            source,
            MockRewardRedeemer::new(),
            MockTradeExecutor::new(),
            &dir,
            s,
        )
        .await;

        let reports = p.process_channel("binance_box_channel").await;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].disposition, Disposition::DryRun);
        assert_eq!(reports[1].disposition, Disposition::DryRun);
        assert_eq!(p.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_trade_directives_not_deduped_by_default() {
        let mut source = MockMessageSource::new();
        source
            .expect_fetch()
            .times(2)
            .returning(|_, _| Ok(vec![message(5, "#buy #BTCUSDT #entry 42000.5")]));
        let mut executor = MockTradeExecutor::new();
        executor
            .expect_place_order()
            .times(2)
            .returning(|_| Ok(confirmation()));

        let dir = TempDir::new().unwrap();
        let p = poller(source, MockRewardRedeemer::new(), executor, &dir, settings()).await;

        let first = p.process_channel("binance_box_channel").await;
        let second = p.process_channel("binance_box_channel").await;
        assert_eq!(first[0].disposition, Disposition::OrderPlaced);
        assert_eq!(second[0].disposition, Disposition::OrderPlaced);
        assert_eq!(p.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_trade_dedup_opt_in_uses_synthetic_key() {
        let mut source = MockMessageSource::new();
        source
            .expect_fetch()
            .times(2)
            .returning(|_, _| Ok(vec![message(5, "#buy #BTCUSDT #entry 42000.5")]));
        let mut executor = MockTradeExecutor::new();
        executor
            .expect_place_order()
            .times(1)
            .returning(|_| Ok(confirmation()));

        let dir = TempDir::new().unwrap();
        let mut s = settings();
        s.dedup_trades = true;
        let p = poller(source, MockRewardRedeemer::new(), executor, &dir, s).await;

        let first = p.process_channel("binance_box_channel").await;
        assert_eq!(first[0].disposition, Disposition::OrderPlaced);
        assert!(p.store.contains("binance_box_channel:5:entry").await);

        let second = p.process_channel("binance_box_channel").await;
        assert_eq!(second[0].disposition, Disposition::Duplicate);
    }

    #[tokio::test]
    async fn test_failed_order_leaves_no_trade_key() {
        let mut source = MockMessageSource::new();
        source
            .expect_fetch()
            .returning(|_, _| Ok(vec![message(5, "#stop_loss #ETHUSDT #price 2000 #pnl -5%")]));
        let mut executor = MockTradeExecutor::new();
        executor
            .expect_place_order()
            .returning(|_| Err(BotError::Exchange("insufficient margin".to_string())));

        let dir = TempDir::new().unwrap();
        let mut s = settings();
        s.dedup_trades = true;
        let p = poller(source, MockRewardRedeemer::new(), executor, &dir, s).await;

        let reports = p.process_channel("binance_box_channel").await;
        assert_eq!(reports[0].disposition, Disposition::OrderFailed);
        assert_eq!(p.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_unactionable_text_reported() {
        let mut source = MockMessageSource::new();
        source
            .expect_fetch()
            .returning(|_, _| Ok(vec![message(9, "!!! ---")]));

        let dir = TempDir::new().unwrap();
        let p = poller(
            source,
            MockRewardRedeemer::new(),
            MockTradeExecutor::new(),
            &dir,
            settings(),
        )
        .await;

        let reports = p.process_channel("binance_box_channel").await;
        assert_eq!(reports[0].disposition, Disposition::Unrecognized);
        assert_eq!(p.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_the_batch() {
        let mut source = MockMessageSource::new();
        source.expect_fetch().returning(|_, _| {
            Ok(vec![
                message(1, "🎁ABC123"),
                message(2, "#buy #BTCUSDT #entry 42000.5"),
            ])
        });
        let mut redeemer = MockRewardRedeemer::new();
        redeemer
            .expect_redeem()
            .returning(|_| Err(BotError::Redeem("connection reset".to_string())));
        let mut executor = MockTradeExecutor::new();
        executor
            .expect_place_order()
            .times(1)
            .returning(|_| Ok(confirmation()));

        let dir = TempDir::new().unwrap();
        let p = poller(source, redeemer, executor, &dir, settings()).await;

        let reports = p.process_channel("binance_box_channel").await;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].disposition, Disposition::RedeemFailed);
        assert_eq!(reports[1].disposition, Disposition::OrderPlaced);
        assert!(!p.store.contains("ABC123").await);
    }
}
