//! # Exmo REST API Client
//!
//! Authenticated calls POST urlencoded forms to `https://api.exmo.com/v1.1`
//! with a `Key` header and a `Sign` header carrying the hex HMAC-SHA512 of
//! the request body. Every request includes a strictly increasing
//! millisecond `nonce`.

use crate::domain::entities::exchange::ExchangeId;
use crate::domain::entities::order::{Order, OrderSide, OrderType};
use crate::domain::repositories::exchange_client::{
    AssetBalance, ExchangeClient, ExchangeError, ExchangeResult, OpenOrder, Ticker,
};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha512;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use zeroize::Zeroizing;

const EXMO_API_BASE: &str = "https://api.exmo.com/v1.1";

type HmacSha512 = Hmac<Sha512>;

pub struct ExmoClient {
    http: Client,
    api_key: String,
    api_secret: Zeroizing<String>,
    base_url: String,
}

impl std::fmt::Debug for ExmoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExmoClient")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<REDACTED>")
            .finish()
    }
}

impl ExmoClient {
    pub fn new(api_key: &str, api_secret: &str) -> ExchangeResult<Self> {
        Self::new_with_base_url(api_key, api_secret, EXMO_API_BASE)
    }

    pub fn new_with_base_url(
        api_key: &str,
        api_secret: &str,
        base_url: &str,
    ) -> ExchangeResult<Self> {
        if api_key.is_empty() || api_secret.is_empty() {
            return Err(ExchangeError::AuthenticationError(
                "Exmo API key and secret must not be empty".to_string(),
            ));
        }
        let http = Client::builder()
            .build()
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            api_secret: Zeroizing::new(api_secret.to_string()),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Exmo pair code: `BTC/USD` -> `BTC_USD`.
    fn pair_code(symbol: &str) -> String {
        symbol.replace('/', "_").to_ascii_uppercase()
    }

    fn nonce() -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
    }

    fn sign(&self, body: &str) -> String {
        let mut mac = HmacSha512::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(body.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    async fn call(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<serde_json::Value> {
        let body = {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (k, v) in params {
                serializer.append_pair(k, v);
            }
            serializer.append_pair("nonce", &Self::nonce().to_string());
            serializer.finish()
        };

        let signature = self.sign(&body);
        let url = format!("{}/{}", self.base_url, method);

        let response = self
            .http
            .post(&url)
            .header("Key", &self.api_key)
            .header("Sign", signature)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ExchangeError::ExchangeSpecific(format!(
                "HTTP {}: {}",
                status, text
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExchangeError::ExchangeSpecific(format!("Invalid response: {}", e)))?;

        // Error responses look like {"result": false, "error": "..."}.
        if value.get("result").and_then(|r| r.as_bool()) == Some(false) {
            let msg = value
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown error");
            return Err(ExchangeError::ExchangeSpecific(msg.to_string()));
        }

        Ok(value)
    }

    fn parse_amount(value: Option<&serde_json::Value>) -> f64 {
        value
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0)
    }
}

#[async_trait]
impl ExchangeClient for ExmoClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Exmo
    }

    async fn create_order(&self, order: &Order) -> ExchangeResult<String> {
        let order_kind = match (order.side, order.order_type) {
            (OrderSide::Buy, OrderType::Limit) => "buy",
            (OrderSide::Sell, OrderType::Limit) => "sell",
            (OrderSide::Buy, OrderType::Market) => "market_buy",
            (OrderSide::Sell, OrderType::Market) => "market_sell",
        };
        let price = order.price.map(|p| p.value()).unwrap_or(0.0);

        let params = [
            ("pair", Self::pair_code(&order.symbol)),
            ("quantity", order.quantity.value().to_string()),
            ("price", price.to_string()),
            ("type", order_kind.to_string()),
        ];

        info!(
            "Placing Exmo order: {} {} {}",
            order_kind,
            order.symbol,
            order.quantity.value()
        );

        let value = self
            .call("order_create", &params)
            .await
            .map_err(|e| ExchangeError::OrderPlacementFailed(e.to_string()))?;

        value
            .get("order_id")
            .map(|id| match id.as_str() {
                Some(s) => s.to_string(),
                None => id.to_string(),
            })
            .ok_or_else(|| {
                ExchangeError::OrderPlacementFailed("Response carried no order_id".to_string())
            })
    }

    async fn fetch_balance(&self) -> ExchangeResult<Vec<AssetBalance>> {
        let value = self
            .call("user_info", &[])
            .await
            .map_err(|e| ExchangeError::BalanceQueryFailed(e.to_string()))?;

        let balances = value
            .get("balances")
            .and_then(|b| b.as_object())
            .ok_or_else(|| {
                ExchangeError::BalanceQueryFailed("Response carried no balances".to_string())
            })?;
        let reserved = value.get("reserved").and_then(|r| r.as_object());

        let result = balances
            .iter()
            .map(|(currency, free)| AssetBalance {
                currency: currency.clone(),
                free: Self::parse_amount(Some(free)),
                used: Self::parse_amount(reserved.and_then(|r| r.get(currency))),
            })
            .collect();

        Ok(result)
    }

    async fn fetch_open_orders(&self) -> ExchangeResult<Vec<OpenOrder>> {
        let value = self
            .call("user_open_orders", &[])
            .await
            .map_err(|e| ExchangeError::OpenOrdersFailed(e.to_string()))?;

        let pairs = value.as_object().ok_or_else(|| {
            ExchangeError::OpenOrdersFailed("Unexpected open orders shape".to_string())
        })?;

        let mut orders = Vec::new();
        for (pair, entries) in pairs {
            let symbol = pair.replace('_', "/");
            if let Some(entries) = entries.as_array() {
                for entry in entries {
                    orders.push(OpenOrder {
                        txid: entry
                            .get("order_id")
                            .map(|v| v.to_string().trim_matches('"').to_string())
                            .unwrap_or_default(),
                        symbol: symbol.clone(),
                        side: entry
                            .get("type")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        price: Self::parse_amount(entry.get("price")),
                        quantity: Self::parse_amount(entry.get("quantity")),
                    });
                }
            }
        }

        Ok(orders)
    }

    async fn fetch_ticker(&self, symbol: &str) -> ExchangeResult<Ticker> {
        let url = format!("{}/ticker", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExchangeError::TickerFailed(format!("Invalid response: {}", e)))?;

        let pair = Self::pair_code(symbol);
        let last = value
            .get(&pair)
            .and_then(|t| t.get("last_trade"))
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| ExchangeError::TickerFailed(format!("No ticker for {}", pair)))?;

        Ok(Ticker {
            symbol: symbol.to_string(),
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_code() {
        assert_eq!(ExmoClient::pair_code("BTC/USD"), "BTC_USD");
        assert_eq!(ExmoClient::pair_code("eth/eur"), "ETH_EUR");
    }

    #[test]
    fn test_empty_credentials_rejected() {
        assert!(ExmoClient::new("", "secret").is_err());
        assert!(ExmoClient::new("key", "").is_err());
    }

    #[test]
    fn test_sign_is_deterministic_hex() {
        let client = ExmoClient::new("key", "secret").unwrap();
        let a = client.sign("pair=BTC_USD&nonce=1");
        let b = client.sign("pair=BTC_USD&nonce=1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_parse_amount() {
        let v = serde_json::json!("1.25");
        assert_eq!(ExmoClient::parse_amount(Some(&v)), 1.25);
        assert_eq!(ExmoClient::parse_amount(None), 0.0);
    }
}
