//! # OKCoin REST API Client
//!
//! OKCoin shares OKX's v5 REST surface. Requests are signed with
//! HMAC-SHA256 over `timestamp + method + requestPath + body`, Base64
//! encoded, and sent in the `OK-ACCESS-*` headers together with the API
//! passphrase.

use crate::domain::entities::exchange::ExchangeId;
use crate::domain::entities::order::{Order, OrderType};
use crate::domain::repositories::exchange_client::{
    AssetBalance, ExchangeClient, ExchangeError, ExchangeResult, OpenOrder, Ticker,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use tracing::info;
use zeroize::Zeroizing;

const OKCOIN_API_BASE: &str = "https://www.okcoin.com";

type HmacSha256 = Hmac<Sha256>;

pub struct OkcoinClient {
    http: Client,
    api_key: String,
    api_secret: Zeroizing<String>,
    passphrase: Zeroizing<String>,
    base_url: String,
}

impl std::fmt::Debug for OkcoinClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OkcoinClient")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<REDACTED>")
            .field("passphrase", &"<REDACTED>")
            .finish()
    }
}

impl OkcoinClient {
    pub fn new(api_key: &str, api_secret: &str, passphrase: &str) -> ExchangeResult<Self> {
        Self::new_with_base_url(api_key, api_secret, passphrase, OKCOIN_API_BASE)
    }

    pub fn new_with_base_url(
        api_key: &str,
        api_secret: &str,
        passphrase: &str,
        base_url: &str,
    ) -> ExchangeResult<Self> {
        if api_key.is_empty() || api_secret.is_empty() {
            return Err(ExchangeError::AuthenticationError(
                "OKCoin API key and secret must not be empty".to_string(),
            ));
        }
        if passphrase.is_empty() {
            return Err(ExchangeError::AuthenticationError(
                "OKCoin requires an API passphrase".to_string(),
            ));
        }
        let http = Client::builder()
            .build()
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            api_secret: Zeroizing::new(api_secret.to_string()),
            passphrase: Zeroizing::new(passphrase.to_string()),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// OKCoin instrument id: `BTC/USD` -> `BTC-USD`.
    fn inst_id(symbol: &str) -> String {
        symbol.replace('/', "-").to_ascii_uppercase()
    }

    /// ISO 8601 timestamp with milliseconds, e.g. `2020-12-08T09:08:57.715Z`.
    fn timestamp() -> String {
        Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }

    fn sign(&self, timestamp: &str, method: &str, request_path: &str, body: &str) -> String {
        let sign_str = format!("{}{}{}{}", timestamp, method, request_path, body);
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(sign_str.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> ExchangeResult<serde_json::Value> {
        let timestamp = Self::timestamp();
        let body_str = body.map(|b| b.to_string()).unwrap_or_default();
        let signature = self.sign(&timestamp, method, path, &body_str);
        let url = format!("{}{}", self.base_url, path);

        let mut request = match method {
            "GET" => self.http.get(&url),
            _ => self.http.post(&url).body(body_str.clone()),
        };
        request = request
            .header("OK-ACCESS-KEY", &self.api_key)
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header("OK-ACCESS-PASSPHRASE", self.passphrase.as_str())
            .header("Content-Type", "application/json");

        let response = request
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

        // v5 envelope: {"code": "0", "msg": "", "data": [...]}
        let code = value.get("code").and_then(|c| c.as_str()).unwrap_or("0");
        if code != "0" {
            let msg = value.get("msg").and_then(|m| m.as_str()).unwrap_or("");
            return Err(ExchangeError::ExchangeSpecific(format!(
                "code {}: {}",
                code, msg
            )));
        }

        Ok(value)
    }

    fn data_array(value: &serde_json::Value) -> Vec<serde_json::Value> {
        value
            .get("data")
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default()
    }

    fn parse_str_amount(entry: &serde_json::Value, key: &str) -> f64 {
        entry
            .get(key)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0)
    }
}

#[async_trait]
impl ExchangeClient for OkcoinClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Okcoin
    }

    async fn create_order(&self, order: &Order) -> ExchangeResult<String> {
        let mut body = serde_json::json!({
            "instId": Self::inst_id(&order.symbol),
            "tdMode": "cash",
            "side": order.side.as_str(),
            "ordType": order.order_type.as_str(),
            "sz": order.quantity.value().to_string(),
        });
        if let (OrderType::Limit, Some(price)) = (order.order_type, order.price) {
            body["px"] = serde_json::Value::String(price.value().to_string());
        }

        info!(
            "Placing OKCoin order: {} {} {}",
            order.side,
            order.symbol,
            order.quantity.value()
        );

        let value = self
            .request("POST", "/api/v5/trade/order", Some(&body))
            .await
            .map_err(|e| ExchangeError::OrderPlacementFailed(e.to_string()))?;

        Self::data_array(&value)
            .first()
            .and_then(|d| d.get("ordId"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ExchangeError::OrderPlacementFailed("Response carried no ordId".to_string())
            })
    }

    async fn fetch_balance(&self) -> ExchangeResult<Vec<AssetBalance>> {
        let value = self
            .request("GET", "/api/v5/account/balance", None)
            .await
            .map_err(|e| ExchangeError::BalanceQueryFailed(e.to_string()))?;

        let details = Self::data_array(&value)
            .first()
            .and_then(|d| d.get("details"))
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default();

        let balances = details
            .iter()
            .map(|entry| AssetBalance {
                currency: entry
                    .get("ccy")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                free: Self::parse_str_amount(entry, "availBal"),
                used: Self::parse_str_amount(entry, "frozenBal"),
            })
            .collect();

        Ok(balances)
    }

    async fn fetch_open_orders(&self) -> ExchangeResult<Vec<OpenOrder>> {
        let value = self
            .request("GET", "/api/v5/trade/orders-pending?instType=SPOT", None)
            .await
            .map_err(|e| ExchangeError::OpenOrdersFailed(e.to_string()))?;

        let orders = Self::data_array(&value)
            .iter()
            .map(|entry| OpenOrder {
                txid: entry
                    .get("ordId")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                symbol: entry
                    .get("instId")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .replace('-', "/"),
                side: entry
                    .get("side")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                price: Self::parse_str_amount(entry, "px"),
                quantity: Self::parse_str_amount(entry, "sz"),
            })
            .collect();

        Ok(orders)
    }

    async fn fetch_ticker(&self, symbol: &str) -> ExchangeResult<Ticker> {
        let path = format!("/api/v5/market/ticker?instId={}", Self::inst_id(symbol));
        let value = self
            .request("GET", &path, None)
            .await
            .map_err(|e| ExchangeError::TickerFailed(e.to_string()))?;

        let last = Self::data_array(&value)
            .first()
            .map(|d| Self::parse_str_amount(d, "last"))
            .filter(|v| *v > 0.0)
            .ok_or_else(|| ExchangeError::TickerFailed(format!("No ticker for {}", symbol)))?;

        Ok(Ticker {
            symbol: symbol.to_string(),
            last,
        })
    }
}
