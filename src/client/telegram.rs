//! Telegram Bot API message source
//!
//! Polls `getUpdates` and keeps a small per-channel cache of recent channel
//! posts, so `fetch` can answer "the latest N messages for this channel"
//! the way the poll loop asks for them. Consumed update ids are tracked so
//! overlapping fetches never re-read the same update; redelivery after a
//! restart is absorbed by the processed-key store downstream.

use crate::client::MessageSource;
use crate::config::Config;
use crate::error::{BotError, Result};
use crate::types::RawMessage;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use tokio::sync::Mutex;

/// Per-channel messages kept between polls
const CHANNEL_CACHE_CAP: usize = 64;

pub struct TelegramSource {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    last_update_id: Mutex<Option<i64>>,
    cache: Mutex<HashMap<String, VecDeque<RawMessage>>>,
}

#[derive(Debug, Deserialize)]
struct GetUpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    channel_post: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    #[serde(default)]
    username: Option<String>,
}

impl TelegramSource {
    pub fn new(api_base: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            bot_token: bot_token.into(),
            last_update_id: Mutex::new(None),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve credentials and build the client. Order: explicit token from
    /// config/env, then the session file, then a one-time stdin prompt whose
    /// answer is persisted for later runs. Must succeed before the poll loop
    /// starts.
    pub async fn bootstrap(config: &Config) -> Result<Self> {
        let token = match &config.telegram.bot_token {
            Some(token) if !token.is_empty() => token.clone(),
            _ => load_or_prompt_token(&config.session_path()).await?,
        };
        Ok(Self::new(config.telegram.api_base.clone(), token))
    }

    /// Pull pending updates into the per-channel caches. The offset lock is
    /// held across the request, so overlapping drains serialize instead of
    /// re-requesting ids another drain already consumed.
    async fn drain_updates(&self) -> Result<()> {
        let mut last = self.last_update_id.lock().await;
        let offset = last.map(|id| id + 1).unwrap_or(0);

        let url = format!("{}/bot{}/getUpdates", self.api_base, self.bot_token);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", "0".to_string()),
                ("allowed_updates", r#"["channel_post"]"#.to_string()),
            ])
            .send()
            .await
            .map_err(|e| BotError::Source(format!("getUpdates request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(BotError::Source(format!(
                "getUpdates returned status {}",
                response.status()
            )));
        }

        let decoded: GetUpdatesResponse = response
            .json()
            .await
            .map_err(|e| BotError::Source(format!("getUpdates decode failed: {}", e)))?;

        if !decoded.ok {
            return Err(BotError::Source(
                decoded
                    .description
                    .unwrap_or_else(|| "getUpdates returned ok=false".to_string()),
            ));
        }

        let mut cache = self.cache.lock().await;
        for update in decoded.result {
            *last = Some(update.update_id);
            let Some(post) = update.channel_post else { continue };
            let (Some(username), Some(text)) = (post.chat.username, post.text) else {
                continue;
            };
            cache_message(
                &mut cache,
                RawMessage {
                    channel: normalize_channel(&username),
                    message_id: post.message_id,
                    text,
                },
            );
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSource for TelegramSource {
    async fn fetch(&self, channel: &str, limit: usize) -> Result<Vec<RawMessage>> {
        self.drain_updates().await?;

        let key = normalize_channel(channel);
        let cache = self.cache.lock().await;
        Ok(cache.get(&key).map(|queue| tail(queue, limit)).unwrap_or_default())
    }
}

fn normalize_channel(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_ascii_lowercase()
}

fn cache_message(cache: &mut HashMap<String, VecDeque<RawMessage>>, msg: RawMessage) {
    let queue = cache.entry(msg.channel.clone()).or_default();
    queue.push_back(msg);
    while queue.len() > CHANNEL_CACHE_CAP {
        queue.pop_front();
    }
}

/// Newest `limit` entries, oldest first
fn tail(queue: &VecDeque<RawMessage>, limit: usize) -> Vec<RawMessage> {
    let skip = queue.len().saturating_sub(limit);
    queue.iter().skip(skip).cloned().collect()
}

async fn load_or_prompt_token(path: &str) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(data) => {
            let token = data.trim();
            if !token.is_empty() {
                tracing::info!("Session loaded from {}", path);
                return Ok(token.to_string());
            }
            // An empty session file gets the same first-run treatment
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let token = prompt_token().await?;
    tokio::fs::write(path, format!("{}\n", token)).await?;
    tracing::info!("Session saved to {}", path);
    Ok(token)
}

async fn prompt_token() -> Result<String> {
    let line = tokio::task::spawn_blocking(|| {
        print!("Please enter your bot token: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok::<_, std::io::Error>(line)
    })
    .await
    .map_err(|e| BotError::Internal(e.to_string()))??;

    let token = line.trim();
    if token.is_empty() {
        return Err(BotError::Config("no bot token entered".to_string()));
    }
    Ok(token.to_string())
}
