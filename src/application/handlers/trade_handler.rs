//! Trading actions: credentials, orders, balances, open orders.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::application::envelope::Envelope;
use crate::application::services::trading_service::TradingService;
use crate::application::AppState;
use crate::domain::entities::balance::TradingBalance;
use crate::domain::entities::exchange::ExchangeId;
use crate::domain::entities::order::{Order, OrderSide, OrderType};
use crate::domain::entities::user::CurrentUser;
use crate::domain::errors::AppError;
use crate::domain::repositories::exchange_client::format_pair;
use crate::persistence::models::{CreateAuditLog, UpsertCredentials};
use crate::persistence::repository::{
    AuditLogRepository, BalanceRepository, CredentialRepository, OrderRepository,
};

fn parse_exchange(raw: &str) -> Result<ExchangeId, AppError> {
    ExchangeId::parse(raw)
        .ok_or_else(|| AppError::invalid_args(format!("unknown exchange: {}", raw)))
}

fn service(state: &AppState) -> TradingService {
    TradingService::new(state.db.clone(), state.cipher.clone())
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub exchange: String,
    pub api_key: String,
    pub api_secret: String,
    #[serde(default)]
    pub passphrase: Option<String>,
}

/// `POST /trade/credentials`: store the caller's API keys, encrypted.
pub async fn upsert_credentials(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Envelope, AppError> {
    let exchange = parse_exchange(&request.exchange)?;
    if request.api_key.trim().is_empty() || request.api_secret.trim().is_empty() {
        return Err(AppError::invalid_args("api_key and api_secret are required"));
    }

    let api_key_enc = state.cipher.encrypt(request.api_key.trim())?;
    let api_secret_enc = state.cipher.encrypt(request.api_secret.trim())?;
    let passphrase_enc = match request.passphrase.as_deref() {
        Some(p) if !p.trim().is_empty() => Some(state.cipher.encrypt(p.trim())?),
        _ => None,
    };

    CredentialRepository::new(state.db.clone())
        .upsert(UpsertCredentials {
            user_id: user.id,
            exchange: exchange.name().to_string(),
            api_key_enc,
            api_secret_enc,
            passphrase_enc,
        })
        .await?;

    AuditLogRepository::new(state.db.clone())
        .record(CreateAuditLog {
            event_type: "credentials_updated".to_string(),
            user_id: Some(user.id),
            details: serde_json::json!({"exchange": exchange.name()}),
        })
        .await?;

    Ok(Envelope::ok("Done"))
}

/// `DELETE /trade/credentials/:exchange`
pub async fn deactivate_credentials(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(exchange): Path<String>,
) -> Result<Envelope, AppError> {
    let exchange = parse_exchange(&exchange)?;

    let deactivated = CredentialRepository::new(state.db.clone())
        .deactivate(user.id, exchange.name())
        .await?;
    if !deactivated {
        return Err(AppError::NotFound(format!(
            "active credentials for {}",
            exchange.name()
        )));
    }

    AuditLogRepository::new(state.db.clone())
        .record(CreateAuditLog {
            event_type: "credentials_deactivated".to_string(),
            user_id: Some(user.id),
            details: serde_json::json!({"exchange": exchange.name()}),
        })
        .await?;

    Ok(Envelope::ok("Done"))
}

fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{}••••", visible)
}

/// `GET /trade/credentials`: list the caller's credential rows. Keys are
/// masked; secrets are never returned.
pub async fn list_credentials(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let records = CredentialRepository::new(state.db.clone())
        .list_for_user(user.id)
        .await?;

    let mut data = Vec::with_capacity(records.len());
    for record in records {
        let api_key = state.cipher.decrypt(&record.api_key_enc)?;
        let exchange = ExchangeId::parse(&record.exchange);
        data.push(serde_json::json!({
            "exchange": record.exchange,
            "display_name": exchange.map(|e| e.display_name()),
            "logo": exchange.map(|e| e.logo()),
            "api_key": mask_key(&api_key),
            "activated": record.activated,
            "updated_at": record.updated_at,
        }));
    }

    Ok(Json(serde_json::json!({"error": 0, "data": data})))
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub exchange: String,
    pub from: String,
    pub to: String,
    pub side: String,
    pub order_type: String,
    #[serde(default)]
    pub price: Option<f64>,
    pub quantity: f64,
    pub balance_id: i64,
}

/// `POST /trade/orders`
pub async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let exchange = parse_exchange(&request.exchange)?;
    let side = OrderSide::parse(&request.side)
        .ok_or_else(|| AppError::invalid_args("side must be buy or sell"))?;
    let order_type = OrderType::parse(&request.order_type)
        .ok_or_else(|| AppError::invalid_args("order_type must be market or limit"))?;
    if request.from.trim().is_empty() || request.to.trim().is_empty() {
        return Err(AppError::invalid_args("from and to currencies are required"));
    }

    let symbol = format_pair(request.from.trim(), request.to.trim());
    let order = Order::new(
        exchange,
        symbol,
        side,
        order_type,
        request.price,
        request.quantity,
        request.balance_id,
    )
    .map_err(AppError::Validation)?;

    let record = service(&state).place_order(&user, order).await?;

    Ok(Json(serde_json::json!({
        "error": 0,
        "msg": "Done",
        "order": record,
    })))
}

/// `GET /trade/orders`: the caller's persisted orders.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let orders = OrderRepository::new(state.db.clone())
        .list_for_user(user.id)
        .await?;
    Ok(Json(serde_json::json!({"error": 0, "data": orders})))
}

/// `GET /trade/balance/:exchange`: formatted, sorted exchange balance.
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(exchange): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let exchange = parse_exchange(&exchange)?;
    let balances = service(&state).fetch_balance(user.id, exchange).await?;
    Ok(Json(serde_json::json!({
        "error": 0,
        "exchange": exchange.name(),
        "data": balances,
    })))
}

/// `GET /trade/orders/:exchange/open`: open orders on the exchange book.
pub async fn open_orders(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(exchange): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let exchange = parse_exchange(&exchange)?;
    let orders = service(&state).open_orders(user.id, exchange).await?;
    Ok(Json(serde_json::json!({
        "error": 0,
        "exchange": exchange.name(),
        "data": orders,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateBalanceRequest {
    pub currency: String,
    #[serde(default)]
    pub available: f64,
    #[serde(default)]
    pub practice: bool,
}

/// `POST /trade/balances`: open a trading balance (practice or live).
pub async fn create_trading_balance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CreateBalanceRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    // Validate through the entity before any row is written.
    TradingBalance::new(
        0,
        user.id,
        request.currency.trim().to_string(),
        request.available,
        0.0,
        request.practice,
    )
    .map_err(AppError::Validation)?;

    let balance = BalanceRepository::new(state.db.clone())
        .create(
            user.id,
            &request.currency.trim().to_ascii_uppercase(),
            request.available,
            request.practice,
        )
        .await?;

    Ok(Json(serde_json::json!({
        "error": 0,
        "msg": "Done",
        "balance": balance,
    })))
}

/// `GET /trade/balances`: the caller's platform trading balances.
pub async fn list_trading_balances(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let balances = BalanceRepository::new(state.db.clone())
        .list_for_user(user.id)
        .await?;
    Ok(Json(serde_json::json!({"error": 0, "data": balances})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key_short_and_long() {
        assert_eq!(mask_key("abcdefgh"), "abcd••••");
        assert_eq!(mask_key("ab"), "ab••••");
    }

    #[test]
    fn test_parse_exchange_rejects_unknown() {
        assert!(parse_exchange("exmo").is_ok());
        assert!(parse_exchange("binance").is_err());
    }
}
