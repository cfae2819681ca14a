//! USD-M futures order client
//!
//! Signed REST order placement only; balances, positions, and the rest of
//! the account surface are out of scope. Requests are authenticated the
//! exchange's way: the query string is HMAC-SHA256 signed with the API
//! secret and the signature appended as the last parameter.

use crate::client::TradeExecutor;
use crate::config::BinanceConfig;
use crate::error::{BotError, Result};
use crate::types::{OrderConfirmation, OrderRequest};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

pub struct FuturesClient {
    http: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl FuturesClient {
    pub fn new(config: &BinanceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: config.futures_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    fn sign(&self, query: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| BotError::Internal(format!("HMAC init failed: {}", e)))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Query string in the exact order it gets signed
    fn order_query(order: &OrderRequest, client_order_id: &str, timestamp_ms: i64) -> String {
        let mut query = format!(
            "symbol={}&side={}&type={}&quantity={}",
            order.symbol,
            order.side.as_str(),
            order.kind.as_str(),
            order.quantity
        );
        if let Some(stop_price) = order.stop_price {
            query.push_str(&format!("&stopPrice={}", stop_price));
        }
        query.push_str(&format!(
            "&newClientOrderId={}&timestamp={}",
            client_order_id, timestamp_ms
        ));
        query
    }
}

#[async_trait]
impl TradeExecutor for FuturesClient {
    async fn place_order(&self, order: OrderRequest) -> Result<OrderConfirmation> {
        let client_order_id = uuid::Uuid::new_v4().to_string();
        let timestamp = Utc::now().timestamp_millis();
        let query = Self::order_query(&order, &client_order_id, timestamp);
        let signature = self.sign(&query)?;
        let url = format!(
            "{}/fapi/v1/order?{}&signature={}",
            self.base_url, query, signature
        );

        let response = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| BotError::Exchange(format!("order request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Exchange(format!(
                "order rejected (status {}): {}",
                status, body
            )));
        }

        let confirmation: OrderConfirmation = response
            .json()
            .await
            .map_err(|e| BotError::Exchange(format!("order reply decode failed: {}", e)))?;

        debug!(
            "Order placed: {} {} {} -> id {}",
            order.side.as_str(),
            order.kind.as_str(),
            confirmation.symbol,
            confirmation.order_id
        );
        Ok(confirmation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;
    use rust_decimal_macros::dec;

    fn test_client(secret: &str) -> FuturesClient {
        let config = BinanceConfig {
            api_key: "key".to_string(),
            api_secret: secret.to_string(),
            futures_base: "https://fapi.binance.com/".to_string(),
            default_quantity: dec!(1),
        };
        FuturesClient::new(&config).unwrap()
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let client = test_client("secret");
        assert_eq!(client.base_url, "https://fapi.binance.com");
    }

    #[test]
    fn test_market_order_query() {
        let order = OrderRequest::market("BTCUSDT".to_string(), Side::Buy, dec!(1));
        let query = FuturesClient::order_query(&order, "cid-1", 1700000000000);
        assert_eq!(
            query,
            "symbol=BTCUSDT&side=BUY&type=MARKET&quantity=1&newClientOrderId=cid-1&timestamp=1700000000000"
        );
    }

    #[test]
    fn test_stop_market_order_query_has_stop_price() {
        let order = OrderRequest::stop_market("ETHUSDT".to_string(), dec!(2000), dec!(1));
        let query = FuturesClient::order_query(&order, "cid-2", 1700000000000);
        assert_eq!(
            query,
            "symbol=ETHUSDT&side=SELL&type=STOP_MARKET&quantity=1&stopPrice=2000&newClientOrderId=cid-2&timestamp=1700000000000"
        );
    }

    #[test]
    fn test_take_profit_order_query() {
        let order = OrderRequest::take_profit_market("ETHUSDT".to_string(), dec!(2500.75), dec!(0.5));
        let query = FuturesClient::order_query(&order, "cid-3", 1700000000000);
        assert!(query.contains("type=TAKE_PROFIT_MARKET"));
        assert!(query.contains("side=SELL"));
        assert!(query.contains("quantity=0.5"));
        assert!(query.contains("stopPrice=2500.75"));
    }

    #[test]
    fn test_signature_matches_exchange_docs_vector() {
        // Worked example from the exchange's signed-endpoint documentation
        let client = test_client("NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j");
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        let signature = client.sign(query).unwrap();
        assert_eq!(
            signature,
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_signature_shape() {
        let client = test_client("another-secret");
        let signature = client.sign("symbol=BTCUSDT").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(signature, client.sign("symbol=BTCUSDT").unwrap());
    }
}
