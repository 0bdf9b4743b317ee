//! # Rave (Flutterwave) hosted-checkout client
//!
//! Builds the hosted-checkout payload (with its SHA-256 integrity hash over
//! the sorted transaction fields), requeries transaction status with a
//! bounded fixed-delay retry loop, and reports lifecycle events through the
//! `RaveEventHandler` trait.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::config::RaveEnv;

/// An undecisive requery is retried at most this many times before the
/// timeout event fires.
const MAX_REQUERY_RETRIES: u32 = 4;

/// Fixed delay between requery attempts.
const REQUERY_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum RaveError {
    #[error("Payment gateway request failed: {0}")]
    Http(String),

    #[error("Payment gateway returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Checkout request invalid: {0}")]
    InvalidRequest(String),
}

/// Terminal outcome of a requery loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequeryStatus {
    Successful,
    Failed,
    TimedOut,
    GatewayError,
}

impl RequeryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequeryStatus::Successful => "successful",
            RequeryStatus::Failed => "failed",
            RequeryStatus::TimedOut => "timeout",
            RequeryStatus::GatewayError => "gateway_error",
        }
    }
}

/// Lifecycle hooks fired by the client. All methods default to no-ops so
/// handlers implement only what they care about.
#[async_trait]
pub trait RaveEventHandler: Send + Sync {
    async fn on_init(&self, _transaction_data: &serde_json::Value) {}
    async fn on_requery(&self, _txref: &str) {}
    async fn on_successful(&self, _data: &serde_json::Value) {}
    async fn on_failure(&self, _data: &serde_json::Value) {}
    async fn on_timeout(&self, _txref: &str, _response: &serde_json::Value) {}
    async fn on_cancel(&self, _txref: &str) {}
    async fn on_requery_error(&self, _response: &serde_json::Value) {}
}

/// A no-op handler for callers that only need the returned status.
pub struct NoopEventHandler;

#[async_trait]
impl RaveEventHandler for NoopEventHandler {}

/// The checkout fields sent to the hosted payment page. Amounts are kept
/// as strings so the integrity hash concatenation is exact.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub amount: String,
    pub currency: String,
    pub country: String,
    pub customer_email: String,
    pub customer_firstname: String,
    pub customer_lastname: String,
    pub customer_phone: String,
    pub custom_description: String,
    pub custom_logo: String,
    pub custom_title: String,
    pub payment_method: String,
    pub pay_button_text: String,
    pub redirect_url: String,
    pub meta: Vec<serde_json::Value>,
}

impl CheckoutRequest {
    pub fn new(amount: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            currency: currency.into(),
            country: "NG".to_string(),
            customer_email: String::new(),
            customer_firstname: String::new(),
            customer_lastname: String::new(),
            customer_phone: String::new(),
            custom_description: String::new(),
            custom_logo: String::new(),
            custom_title: String::new(),
            payment_method: "both".to_string(),
            pay_button_text: "Make Payment".to_string(),
            redirect_url: String::new(),
            meta: Vec::new(),
        }
    }

    pub fn with_customer(mut self, email: &str, firstname: &str, lastname: &str) -> Self {
        self.customer_email = email.to_string();
        self.customer_firstname = firstname.to_string();
        self.customer_lastname = lastname.to_string();
        self
    }

    pub fn with_country(mut self, country: &str) -> Self {
        self.country = country.to_string();
        self
    }

    pub fn with_redirect_url(mut self, url: &str) -> Self {
        self.redirect_url = url.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.custom_description = description.to_string();
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.custom_title = title.to_string();
        self
    }

    pub fn add_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta.push(meta);
        self
    }

    fn validate(&self) -> Result<(), RaveError> {
        if self.amount.trim().is_empty() || self.amount.trim().parse::<f64>().is_err() {
            return Err(RaveError::InvalidRequest("amount must be numeric".into()));
        }
        if self.currency.trim().is_empty() {
            return Err(RaveError::InvalidRequest("currency is required".into()));
        }
        if self.customer_email.trim().is_empty() {
            return Err(RaveError::InvalidRequest(
                "customer email is required".into(),
            ));
        }
        Ok(())
    }
}

pub struct RaveClient {
    public_key: String,
    secret_key: Zeroizing<String>,
    txref_prefix: String,
    override_reference: bool,
    base_url: String,
    requery_delay: Duration,
    http: Client,
}

impl std::fmt::Debug for RaveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaveClient")
            .field("public_key", &self.public_key)
            .field("secret_key", &"<REDACTED>")
            .field("txref_prefix", &self.txref_prefix)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl RaveClient {
    pub fn new(
        public_key: &str,
        secret_key: &str,
        txref_prefix: &str,
        env: RaveEnv,
        override_reference: bool,
    ) -> Result<Self, RaveError> {
        Self::new_with_base_url(
            public_key,
            secret_key,
            txref_prefix,
            env.base_url(),
            override_reference,
        )
    }

    pub fn new_with_base_url(
        public_key: &str,
        secret_key: &str,
        txref_prefix: &str,
        base_url: &str,
        override_reference: bool,
    ) -> Result<Self, RaveError> {
        if secret_key.is_empty() {
            return Err(RaveError::InvalidRequest("secret key is required".into()));
        }
        let http = Client::builder()
            .build()
            .map_err(|e| RaveError::Http(e.to_string()))?;
        Ok(Self {
            public_key: public_key.to_string(),
            secret_key: Zeroizing::new(secret_key.to_string()),
            txref_prefix: txref_prefix.to_string(),
            override_reference,
            base_url: base_url.trim_end_matches('/').to_string(),
            requery_delay: REQUERY_DELAY,
            http,
        })
    }

    /// Shrink the retry delay; used by tests.
    pub fn with_requery_delay(mut self, delay: Duration) -> Self {
        self.requery_delay = delay;
        self
    }

    /// Generate a transaction reference: `<prefix>_<millis><rand>`, or the
    /// prefix verbatim when reference override is configured.
    pub fn generate_txref(&self) -> String {
        if self.override_reference {
            return self.txref_prefix.clone();
        }
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let mut suffix = [0u8; 2];
        rand::rngs::OsRng.fill_bytes(&mut suffix);
        format!("{}_{}{}", self.txref_prefix, millis, hex::encode(suffix))
    }

    /// Collect the checkout fields that participate in the integrity hash.
    /// `BTreeMap` iteration gives the sorted-by-key order the gateway
    /// expects.
    fn transaction_fields(
        &self,
        request: &CheckoutRequest,
        txref: &str,
    ) -> BTreeMap<String, serde_json::Value> {
        let mut fields = BTreeMap::new();
        fields.insert("PBFPubKey".to_string(), self.public_key.clone().into());
        fields.insert("amount".to_string(), request.amount.clone().into());
        fields.insert(
            "customer_email".to_string(),
            request.customer_email.clone().into(),
        );
        fields.insert(
            "customer_firstname".to_string(),
            request.customer_firstname.clone().into(),
        );
        fields.insert("txref".to_string(), txref.to_string().into());
        fields.insert(
            "payment_method".to_string(),
            request.payment_method.clone().into(),
        );
        fields.insert(
            "customer_lastname".to_string(),
            request.customer_lastname.clone().into(),
        );
        fields.insert("country".to_string(), request.country.clone().into());
        fields.insert("currency".to_string(), request.currency.clone().into());
        fields.insert(
            "custom_description".to_string(),
            request.custom_description.clone().into(),
        );
        fields.insert(
            "custom_logo".to_string(),
            request.custom_logo.clone().into(),
        );
        fields.insert(
            "custom_title".to_string(),
            request.custom_title.clone().into(),
        );
        fields.insert(
            "customer_phone".to_string(),
            request.customer_phone.clone().into(),
        );
        fields.insert(
            "pay_button_text".to_string(),
            request.pay_button_text.clone().into(),
        );
        fields.insert(
            "redirect_url".to_string(),
            request.redirect_url.clone().into(),
        );
        fields.insert("hosted_payment".to_string(), 1.into());
        fields
    }

    /// SHA-256 hex of the field values concatenated in sorted-key order
    /// with the secret key appended.
    fn checksum(&self, fields: &BTreeMap<String, serde_json::Value>) -> String {
        let mut payload = String::new();
        for value in fields.values() {
            match value {
                serde_json::Value::String(s) => payload.push_str(s),
                serde_json::Value::Null => {}
                other => payload.push_str(&other.to_string()),
            }
        }
        payload.push_str(self.secret_key.as_str());

        let mut hasher = Sha256::new();
        hasher.update(payload.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Build the hosted-checkout payload: the transaction fields plus the
    /// integrity hash and meta list.
    pub async fn initialize(
        &self,
        request: &CheckoutRequest,
        txref: &str,
        handler: &dyn RaveEventHandler,
    ) -> Result<serde_json::Value, RaveError> {
        request.validate()?;

        let fields = self.transaction_fields(request, txref);
        let integrity_hash = self.checksum(&fields);

        let mut payload = serde_json::Map::new();
        for (key, value) in &fields {
            payload.insert(key.clone(), value.clone());
        }
        payload.insert("integrity_hash".to_string(), integrity_hash.into());
        payload.insert(
            "meta".to_string(),
            serde_json::Value::Array(request.meta.clone()),
        );
        let payload = serde_json::Value::Object(payload);

        info!("Initialized checkout payload for {}", txref);
        handler.on_init(&payload).await;

        Ok(payload)
    }

    /// Requery a transaction until the gateway reports a decisive status.
    ///
    /// Undecisive responses are retried with a fixed delay; once the
    /// attempt counter passes `MAX_REQUERY_RETRIES` the timeout event fires
    /// and the loop ends.
    pub async fn requery_transaction(
        &self,
        txref: &str,
        handler: &dyn RaveEventHandler,
    ) -> Result<RequeryStatus, RaveError> {
        let url = format!("{}/flwv3-pug/getpaidx/api/xrequery", self.base_url);
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            handler.on_requery(txref).await;
            info!("Requerying transaction {} (attempt {})", txref, attempts);

            let body = serde_json::json!({
                "txref": txref,
                "SECKEY": self.secret_key.as_str(),
                "last_attempt": "1",
            });

            let response = self
                .http
                .post(&url)
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| RaveError::Http(e.to_string()))?;

            let value: serde_json::Value = response
                .json()
                .await
                .map_err(|e| RaveError::InvalidResponse(e.to_string()))?;

            if value.get("status").and_then(|s| s.as_str()) != Some("success") {
                warn!("Requery call returned an error for {}", txref);
                handler.on_requery_error(&value).await;
                return Ok(RequeryStatus::GatewayError);
            }

            let data_status = value
                .get("data")
                .and_then(|d| d.get("status"))
                .and_then(|s| s.as_str());

            match data_status {
                Some("successful") => {
                    info!("Requeried a successful transaction: {}", txref);
                    let data = value.get("data").cloned().unwrap_or_default();
                    handler.on_successful(&data).await;
                    return Ok(RequeryStatus::Successful);
                }
                Some("failed") => {
                    warn!("Requeried a failed transaction: {}", txref);
                    let data = value.get("data").cloned().unwrap_or_default();
                    handler.on_failure(&data).await;
                    return Ok(RequeryStatus::Failed);
                }
                _ => {
                    // Undecisive, likely still processing.
                    if attempts > MAX_REQUERY_RETRIES {
                        warn!(
                            "Transaction {} still undecisive after {} attempts",
                            txref, attempts
                        );
                        handler.on_timeout(txref, &value).await;
                        return Ok(RequeryStatus::TimedOut);
                    }
                    info!(
                        "Transaction {} undecisive, retrying in {:?}",
                        txref, self.requery_delay
                    );
                    tokio::time::sleep(self.requery_delay).await;
                }
            }
        }
    }

    /// Record a user-cancelled payment.
    pub async fn payment_canceled(&self, txref: &str, handler: &dyn RaveEventHandler) {
        info!("Payment was canceled by user: {}", txref);
        handler.on_cancel(txref).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RaveClient {
        RaveClient::new_with_base_url(
            "FLWPUBK-xxxx",
            "FLWSECK-yyyy",
            "KRYPTO",
            "http://127.0.0.1:1",
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_txref_carries_prefix() {
        let txref = client().generate_txref();
        assert!(txref.starts_with("KRYPTO_"));
        assert_ne!(txref, client().generate_txref());
    }

    #[test]
    fn test_txref_override() {
        let c = RaveClient::new_with_base_url(
            "pk",
            "sk",
            "FIXEDREF",
            "http://127.0.0.1:1",
            true,
        )
        .unwrap();
        assert_eq!(c.generate_txref(), "FIXEDREF");
    }

    #[test]
    fn test_checksum_is_stable_and_secret_dependent() {
        let c = client();
        let request = CheckoutRequest::new("500", "NGN").with_customer(
            "user@example.com",
            "Ada",
            "Obi",
        );
        let fields = c.transaction_fields(&request, "KRYPTO_1");
        let h1 = c.checksum(&fields);
        let h2 = c.checksum(&fields);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);

        let other = RaveClient::new_with_base_url(
            "FLWPUBK-xxxx",
            "another-secret",
            "KRYPTO",
            "http://127.0.0.1:1",
            false,
        )
        .unwrap();
        assert_ne!(h1, other.checksum(&fields));
    }

    #[test]
    fn test_checksum_concatenates_in_key_order() {
        // With a single known field set, the hash must equal a hand-built
        // digest of the sorted values + secret.
        let c = RaveClient::new_with_base_url("pk", "sk", "P", "http://127.0.0.1:1", false)
            .unwrap();
        let mut fields = BTreeMap::new();
        fields.insert("b".to_string(), serde_json::Value::String("2".into()));
        fields.insert("a".to_string(), serde_json::Value::String("1".into()));
        fields.insert("c".to_string(), serde_json::json!(3));

        let mut hasher = Sha256::new();
        hasher.update(b"123sk");
        let expected = hex::encode(hasher.finalize());

        assert_eq!(c.checksum(&fields), expected);
    }

    #[tokio::test]
    async fn test_initialize_payload_shape() {
        let c = client();
        let request = CheckoutRequest::new("100", "NGN")
            .with_customer("user@example.com", "Ada", "Obi")
            .with_redirect_url("https://example.com/return")
            .add_meta(serde_json::json!({"metaname": "plan", "metavalue": "pro"}));

        let payload = c
            .initialize(&request, "KRYPTO_42", &NoopEventHandler)
            .await
            .unwrap();

        assert_eq!(payload["txref"], "KRYPTO_42");
        assert_eq!(payload["PBFPubKey"], "FLWPUBK-xxxx");
        assert_eq!(payload["hosted_payment"], 1);
        assert_eq!(payload["meta"].as_array().unwrap().len(), 1);
        assert_eq!(payload["integrity_hash"].as_str().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn test_initialize_requires_customer_email() {
        let c = client();
        let request = CheckoutRequest::new("100", "NGN");
        let result = c.initialize(&request, "KRYPTO_42", &NoopEventHandler).await;
        assert!(matches!(result, Err(RaveError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_initialize_rejects_non_numeric_amount() {
        let c = client();
        let request =
            CheckoutRequest::new("lots", "NGN").with_customer("a@b.c", "A", "B");
        assert!(c
            .initialize(&request, "KRYPTO_42", &NoopEventHandler)
            .await
            .is_err());
    }
}
