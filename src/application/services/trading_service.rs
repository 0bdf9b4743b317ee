//! Order and balance orchestration.
//!
//! The service resolves the caller's trading balance, decrypts credentials
//! when a live exchange call is needed, and persists every accepted order.
//! Orders on a practice balance never construct an exchange client.

use std::sync::Arc;

use tracing::info;

use crate::crypto::StorageCipher;
use crate::domain::entities::exchange::ExchangeId;
use crate::domain::entities::order::Order;
use crate::domain::entities::user::CurrentUser;
use crate::domain::errors::AppError;
use crate::domain::repositories::exchange_client::{
    format_balances, AssetBalance, ExchangeClient, OpenOrder,
};
use crate::infrastructure::exchange_client_factory::{
    DecryptedCredentials, ExchangeClientFactory,
};
use crate::persistence::models::{CreateAuditLog, CreateOrder, OrderRecord};
use crate::persistence::repository::{
    AuditLogRepository, BalanceRepository, CredentialRepository, OrderRepository,
};
use crate::persistence::{new_record_id, DbPool};

pub struct TradingService {
    db: DbPool,
    cipher: Arc<StorageCipher>,
}

impl TradingService {
    pub fn new(db: DbPool, cipher: Arc<StorageCipher>) -> Self {
        Self { db, cipher }
    }

    /// Load and decrypt the caller's activated credentials for an exchange.
    async fn decrypted_credentials(
        &self,
        user_id: i64,
        exchange: ExchangeId,
    ) -> Result<DecryptedCredentials, AppError> {
        let record = CredentialRepository::new(self.db.clone())
            .find_activated(user_id, exchange.name())
            .await?
            .ok_or_else(|| AppError::ExchangeNotEnabled {
                exchange: exchange.display_name().to_string(),
            })?;

        let api_key = self.cipher.decrypt(&record.api_key_enc)?;
        let api_secret = self.cipher.decrypt(&record.api_secret_enc)?;
        let passphrase = match record.passphrase_enc.as_deref() {
            Some(enc) if !enc.is_empty() => Some(self.cipher.decrypt(enc)?),
            _ => None,
        };

        Ok(DecryptedCredentials {
            api_key,
            api_secret,
            passphrase,
        })
    }

    /// Build an exchange client from the caller's stored credentials.
    pub async fn client_for(
        &self,
        user_id: i64,
        exchange: ExchangeId,
    ) -> Result<Arc<dyn ExchangeClient>, AppError> {
        let credentials = self.decrypted_credentials(user_id, exchange).await?;
        Ok(ExchangeClientFactory::create(exchange, &credentials)?)
    }

    /// Place an order.
    ///
    /// Practice balances short-circuit to a local save. Live orders are
    /// delegated to the exchange and saved with the returned order id; for
    /// market orders with no price the last traded price is recorded as the
    /// reference price.
    pub async fn place_order(
        &self,
        user: &CurrentUser,
        order: Order,
    ) -> Result<OrderRecord, AppError> {
        let balance = BalanceRepository::new(self.db.clone())
            .get(order.balance_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("balance {}", order.balance_id)))?;
        if balance.user_id != user.id {
            return Err(AppError::PermissionDenied);
        }

        let mut reference_price = order.price.map(|p| p.value());
        let exchange_order_id = if balance.practice {
            info!(
                "Recording practice order for user {} on {}",
                user.id,
                order.exchange.name()
            );
            None
        } else {
            let client = self.client_for(user.id, order.exchange).await?;
            if reference_price.is_none() {
                reference_price = client
                    .fetch_ticker(&order.symbol)
                    .await
                    .ok()
                    .map(|t| t.last);
            }
            let id = client.create_order(&order).await?;
            info!(
                "Order accepted by {} for user {}: {}",
                order.exchange.display_name(),
                user.id,
                id
            );
            Some(id)
        };

        let record = OrderRepository::new(self.db.clone())
            .create(CreateOrder {
                id: new_record_id(),
                user_id: user.id,
                balance_id: order.balance_id,
                exchange: order.exchange.name().to_string(),
                symbol: order.symbol.clone(),
                side: order.side.as_str().to_string(),
                order_type: order.order_type.as_str().to_string(),
                price: reference_price,
                quantity: order.quantity.value(),
                exchange_order_id,
            })
            .await?;

        AuditLogRepository::new(self.db.clone())
            .record(CreateAuditLog {
                event_type: "order_created".to_string(),
                user_id: Some(user.id),
                details: serde_json::json!({
                    "order_id": record.id,
                    "exchange": record.exchange,
                    "symbol": record.symbol,
                    "side": record.side,
                    "practice": balance.practice,
                }),
            })
            .await?;

        Ok(record)
    }

    /// Fetch and reshape the caller's exchange balance.
    pub async fn fetch_balance(
        &self,
        user_id: i64,
        exchange: ExchangeId,
    ) -> Result<Vec<AssetBalance>, AppError> {
        let client = self.client_for(user_id, exchange).await?;
        let balances = client.fetch_balance().await?;
        Ok(format_balances(balances))
    }

    /// Fetch the caller's open orders on an exchange.
    pub async fn open_orders(
        &self,
        user_id: i64,
        exchange: ExchangeId,
    ) -> Result<Vec<OpenOrder>, AppError> {
        let client = self.client_for(user_id, exchange).await?;
        Ok(client.fetch_open_orders().await?)
    }
}
