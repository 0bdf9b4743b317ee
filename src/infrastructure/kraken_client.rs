//! # Kraken REST API Client
//!
//! Private calls POST urlencoded forms to `/0/private/<Method>`. The
//! `API-Sign` header is the Base64 HMAC-SHA512 of
//! `path + SHA256(nonce + body)` keyed with the Base64-decoded API secret.

use crate::domain::entities::exchange::ExchangeId;
use crate::domain::entities::order::{Order, OrderType};
use crate::domain::repositories::exchange_client::{
    AssetBalance, ExchangeClient, ExchangeError, ExchangeResult, OpenOrder, Ticker,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::{Digest, Sha256, Sha512};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use zeroize::Zeroizing;

const KRAKEN_API_BASE: &str = "https://api.kraken.com";

type HmacSha512 = Hmac<Sha512>;

pub struct KrakenClient {
    http: Client,
    api_key: String,
    api_secret: Zeroizing<String>,
    base_url: String,
}

impl std::fmt::Debug for KrakenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KrakenClient")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<REDACTED>")
            .finish()
    }
}

impl KrakenClient {
    pub fn new(api_key: &str, api_secret: &str) -> ExchangeResult<Self> {
        Self::new_with_base_url(api_key, api_secret, KRAKEN_API_BASE)
    }

    pub fn new_with_base_url(
        api_key: &str,
        api_secret: &str,
        base_url: &str,
    ) -> ExchangeResult<Self> {
        if api_key.is_empty() || api_secret.is_empty() {
            return Err(ExchangeError::AuthenticationError(
                "Kraken API key and secret must not be empty".to_string(),
            ));
        }
        // The secret must be valid Base64; fail at construction, not mid-call.
        STANDARD.decode(api_secret).map_err(|_| {
            ExchangeError::AuthenticationError(
                "Kraken API secret must be Base64-encoded".to_string(),
            )
        })?;
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

    /// Kraken pair code: `BTC/USD` -> `XBTUSD`.
    fn pair_code(symbol: &str) -> String {
        symbol
            .to_ascii_uppercase()
            .replace("BTC", "XBT")
            .replace('/', "")
    }

    fn nonce() -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
    }

    fn sign(&self, path: &str, nonce: &str, body: &str) -> ExchangeResult<String> {
        let secret = STANDARD
            .decode(self.api_secret.as_str())
            .map_err(|_| ExchangeError::AuthenticationError("Invalid API secret".to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(nonce.as_bytes());
        hasher.update(body.as_bytes());
        let digest = hasher.finalize();

        let mut mac = HmacSha512::new_from_slice(&secret)
            .map_err(|e| ExchangeError::AuthenticationError(e.to_string()))?;
        mac.update(path.as_bytes());
        mac.update(&digest);

        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    async fn private_call(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<serde_json::Value> {
        let path = format!("/0/private/{}", method);
        let nonce = Self::nonce().to_string();

        let body = {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            serializer.append_pair("nonce", &nonce);
            for (k, v) in params {
                serializer.append_pair(k, v);
            }
            serializer.finish()
        };

        let signature = self.sign(&path, &nonce, &body)?;
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .post(&url)
            .header("API-Key", &self.api_key)
            .header("API-Sign", signature)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        Self::unwrap_result(response).await
    }

    /// Kraken wraps everything in `{"error": [...], "result": {...}}`.
    async fn unwrap_result(response: reqwest::Response) -> ExchangeResult<serde_json::Value> {
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

        let errors: Vec<String> = value
            .get("error")
            .and_then(|e| e.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|e| e.as_str())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();

        if !errors.is_empty() {
            return Err(ExchangeError::ExchangeSpecific(errors.join("; ")));
        }

        value
            .get("result")
            .cloned()
            .ok_or_else(|| ExchangeError::ExchangeSpecific("Response carried no result".to_string()))
    }

    fn parse_amount(value: Option<&serde_json::Value>) -> f64 {
        match value {
            Some(serde_json::Value::String(s)) => s.parse::<f64>().unwrap_or(0.0),
            Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            _ => 0.0,
        }
    }
}

#[async_trait]
impl ExchangeClient for KrakenClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Kraken
    }

    async fn create_order(&self, order: &Order) -> ExchangeResult<String> {
        let mut params = vec![
            ("pair", Self::pair_code(&order.symbol)),
            ("type", order.side.as_str().to_string()),
            ("ordertype", order.order_type.as_str().to_string()),
            ("volume", order.quantity.value().to_string()),
        ];
        if let (OrderType::Limit, Some(price)) = (order.order_type, order.price) {
            params.push(("price", price.value().to_string()));
        }

        info!(
            "Placing Kraken order: {} {} {}",
            order.side,
            order.symbol,
            order.quantity.value()
        );

        let result = self
            .private_call("AddOrder", &params)
            .await
            .map_err(|e| ExchangeError::OrderPlacementFailed(e.to_string()))?;

        result
            .get("txid")
            .and_then(|t| t.as_array())
            .and_then(|t| t.first())
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ExchangeError::OrderPlacementFailed("Response carried no txid".to_string())
            })
    }

    async fn fetch_balance(&self) -> ExchangeResult<Vec<AssetBalance>> {
        let result = self
            .private_call("Balance", &[])
            .await
            .map_err(|e| ExchangeError::BalanceQueryFailed(e.to_string()))?;

        let entries = result.as_object().ok_or_else(|| {
            ExchangeError::BalanceQueryFailed("Unexpected balance shape".to_string())
        })?;

        let balances = entries
            .iter()
            .map(|(currency, amount)| AssetBalance {
                currency: currency.clone(),
                free: Self::parse_amount(Some(amount)),
                used: 0.0,
            })
            .collect();

        Ok(balances)
    }

    async fn fetch_open_orders(&self) -> ExchangeResult<Vec<OpenOrder>> {
        let result = self
            .private_call("OpenOrders", &[])
            .await
            .map_err(|e| ExchangeError::OpenOrdersFailed(e.to_string()))?;

        let open = result
            .get("open")
            .and_then(|o| o.as_object())
            .cloned()
            .unwrap_or_default();

        let orders = open
            .iter()
            .map(|(txid, entry)| {
                let descr = entry.get("descr");
                OpenOrder {
                    txid: txid.clone(),
                    symbol: descr
                        .and_then(|d| d.get("pair"))
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    side: descr
                        .and_then(|d| d.get("type"))
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    price: Self::parse_amount(descr.and_then(|d| d.get("price"))),
                    quantity: Self::parse_amount(entry.get("vol")),
                }
            })
            .collect();

        Ok(orders)
    }

    async fn fetch_ticker(&self, symbol: &str) -> ExchangeResult<Ticker> {
        let pair = Self::pair_code(symbol);
        let url = format!("{}/0/public/Ticker?pair={}", self.base_url, pair);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        let result = Self::unwrap_result(response)
            .await
            .map_err(|e| ExchangeError::TickerFailed(e.to_string()))?;

        // The result is keyed by Kraken's own pair alias; take the first.
        let last = result
            .as_object()
            .and_then(|obj| obj.values().next())
            .and_then(|t| t.get("c"))
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| ExchangeError::TickerFailed(format!("No ticker for {}", pair)))?;

        Ok(Ticker {
            symbol: symbol.to_string(),
            last,
        })
    }
}
