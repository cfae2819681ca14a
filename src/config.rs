//! Configuration loading
//!
//! Settings come from an optional `config.toml`, overlaid with environment
//! variables (loaded from `.env` by the binary before this runs). The env
//! variable names match the original deployment, so an existing `.env` keeps
//! working unchanged.

use crate::error::{BotError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub giftbox: GiftBoxConfig,
    #[serde(default)]
    pub binance: BinanceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
}

/// Message feed settings
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Channel to poll (username, with or without leading @)
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Single-line credential file; written by the first-run prompt
    #[serde(default = "default_session_file")]
    pub session_file: String,
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    /// Overrides the session file when set
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Messages fetched per tick
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

/// Gift-box redemption endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct GiftBoxConfig {
    #[serde(default = "default_giftbox_base")]
    pub base_url: String,
    /// Authenticated browser cookie, required for redemption
    #[serde(default)]
    pub cookie: String,
    #[serde(default)]
    pub csrf_token: String,
}

/// Futures exchange settings
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "default_futures_base")]
    pub futures_base: String,
    /// Fixed order size for every directive; never derived from the message
    #[serde(default = "default_quantity")]
    pub default_quantity: Decimal,
}

/// Processed-key log settings
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_processed_file")]
    pub processed_file: String,
}

/// Control server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// Dedup scope settings
#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    /// Also dedup trade directives by channel:message_id:tag. Off by default:
    /// the stock behavior dedups reward codes only.
    #[serde(default)]
    pub trades: bool,
}

fn default_channel() -> String {
    "binance_box_channel".to_string()
}

fn default_session_file() -> String {
    "session.txt".to_string()
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_fetch_limit() -> usize {
    2
}

fn default_poll_interval() -> u64 {
    5
}

fn default_giftbox_base() -> String {
    "https://www.binance.com".to_string()
}

fn default_futures_base() -> String {
    "https://fapi.binance.com".to_string()
}

fn default_quantity() -> Decimal {
    Decimal::ONE
}

fn default_processed_file() -> String {
    "processedMessages.txt".to_string()
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            session_file: default_session_file(),
            api_base: default_telegram_api_base(),
            bot_token: None,
            fetch_limit: default_fetch_limit(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for GiftBoxConfig {
    fn default() -> Self {
        Self {
            base_url: default_giftbox_base(),
            cookie: String::new(),
            csrf_token: String::new(),
        }
    }
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            futures_base: default_futures_base(),
            default_quantity: default_quantity(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            processed_file: default_processed_file(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { trades: false }
    }
}

impl Config {
    /// Load from an optional toml file, then apply env overrides
    pub fn load(path: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        let mut config: Config = cfg.try_deserialize()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Env variable names kept from the original deployment
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("TELEGRAM_BOT_TOKEN") {
            if !v.is_empty() {
                self.telegram.bot_token = Some(v);
            }
        }
        if let Ok(v) = std::env::var("TELEGRAM_CHANNEL") {
            if !v.is_empty() {
                self.telegram.channel = v;
            }
        }
        if let Ok(v) = std::env::var("BINANCE_API_KEY") {
            if !v.is_empty() {
                self.binance.api_key = v;
            }
        }
        if let Ok(v) = std::env::var("BINANCE_API_SECRET") {
            if !v.is_empty() {
                self.binance.api_secret = v;
            }
        }
        if let Ok(v) = std::env::var("BINANCE_COOKIE") {
            if !v.is_empty() {
                self.giftbox.cookie = v;
            }
        }
        if let Ok(v) = std::env::var("BINANCE_CSRF_TOKEN") {
            if !v.is_empty() {
                self.giftbox.csrf_token = v;
            }
        }
    }

    /// Tilde-expanded session file path
    pub fn session_path(&self) -> String {
        shellexpand::tilde(&self.telegram.session_file).into_owned()
    }

    /// Tilde-expanded processed-key log path
    pub fn processed_path(&self) -> String {
        shellexpand::tilde(&self.store.processed_file).into_owned()
    }

    /// Redemption needs the browser cookie and CSRF token
    pub fn require_giftbox(&self) -> Result<()> {
        if self.giftbox.cookie.is_empty() {
            return Err(BotError::Config(
                "giftbox.cookie (BINANCE_COOKIE) is not set".to_string(),
            ));
        }
        if self.giftbox.csrf_token.is_empty() {
            return Err(BotError::Config(
                "giftbox.csrf_token (BINANCE_CSRF_TOKEN) is not set".to_string(),
            ));
        }
        Ok(())
    }

    /// Order placement needs signed API credentials
    pub fn require_binance(&self) -> Result<()> {
        if self.binance.api_key.is_empty() || self.binance.api_secret.is_empty() {
            return Err(BotError::Config(
                "binance.api_key / binance.api_secret (BINANCE_API_KEY / BINANCE_API_SECRET) are not set".to_string(),
            ));
        }
        Ok(())
    }
}
