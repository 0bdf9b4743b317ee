//! Database Models
//!
//! Persistent row types and the write inputs handed to the repositories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AdditionalPageRecord {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub icon: String,
    pub icon_svg: String,
    pub created_at: DateTime<Utc>,
}

/// Credential row; the key columns hold `ENC:v1:` storage ciphertext.
#[derive(Debug, Clone, FromRow)]
pub struct CredentialRecord {
    pub id: i64,
    pub user_id: i64,
    pub exchange: String,
    pub api_key_enc: String,
    pub api_secret_enc: String,
    pub passphrase_enc: Option<String>,
    pub activated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TradingBalanceRecord {
    pub id: i64,
    pub user_id: i64,
    pub currency: String,
    pub available: f64,
    pub locked: f64,
    pub practice: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderRecord {
    pub id: String,
    pub user_id: i64,
    pub balance_id: i64,
    pub exchange: String,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub price: Option<f64>,
    pub quantity: f64,
    pub exchange_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BankTransferRecord {
    pub id: i64,
    pub user_id: i64,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub proof_path: Option<String>,
    pub proof_submitted_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentRecord {
    pub txref: String,
    pub user_id: i64,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub gateway: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditLogRecord {
    pub id: i64,
    pub event_type: String,
    pub user_id: Option<i64>,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone)]
pub struct UpsertCredentials {
    pub user_id: i64,
    pub exchange: String,
    pub api_key_enc: String,
    pub api_secret_enc: String,
    pub passphrase_enc: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub id: String,
    pub user_id: i64,
    pub balance_id: i64,
    pub exchange: String,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub price: Option<f64>,
    pub quantity: f64,
    pub exchange_order_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBankTransfer {
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub txref: String,
    pub user_id: i64,
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct CreateAuditLog {
    pub event_type: String,
    pub user_id: Option<i64>,
    pub details: serde_json::Value,
}
