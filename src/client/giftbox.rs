//! Gift-box redemption client
//!
//! Calls the fixed grabV2 endpoint with the browser-session headers it
//! expects. Refusals come back in-band as `{success, message}` bodies, on
//! 2xx and non-2xx alike, so any decodable body is a reply rather than an
//! error.

use crate::client::RewardRedeemer;
use crate::config::GiftBoxConfig;
use crate::error::{BotError, Result};
use crate::types::RedeemReply;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

const GRAB_PATH: &str = "/bapi/pay/v1/private/binance-pay/gift-box/code/grabV2";

pub struct GiftBoxClient {
    http: Client,
    base_url: String,
    cookie: String,
    csrf_token: String,
}

impl GiftBoxClient {
    pub fn new(config: &GiftBoxConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cookie: config.cookie.clone(),
            csrf_token: config.csrf_token.clone(),
        })
    }
}

#[async_trait]
impl RewardRedeemer for GiftBoxClient {
    async fn redeem(&self, code: &str) -> Result<RedeemReply> {
        let url = format!("{}{}", self.base_url, GRAB_PATH);
        let body = json!({
            "grabCode": code,
            "channel": "DEFAULT",
            "scene": null,
        });

        let response = self
            .http
            .post(&url)
            .header("User-Agent", "Mozilla/5.0")
            .header("Cookie", &self.cookie)
            .header("csrftoken", &self.csrf_token)
            .header("clienttype", "web")
            .header("bnc-location", "BINANCE")
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::Redeem(format!("grab request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BotError::Redeem(format!("grab reply unreadable: {}", e)))?;

        match serde_json::from_str::<RedeemReply>(&text) {
            Ok(reply) => {
                debug!("Gift box reply for {}: success={}", code, reply.success);
                Ok(reply)
            }
            Err(_) => Err(BotError::Redeem(format!(
                "undecodable grab reply (status {}): {}",
                status,
                snippet(&text)
            ))),
        }
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}
