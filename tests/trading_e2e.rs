//! End-to-end tests for the order flow: practice orders bypass the
//! exchange, live orders demand activated credentials, and credentials
//! survive an encrypt/store/decrypt round trip without leaking plaintext.

use std::sync::Arc;

use krypto::application::services::trading_service::TradingService;
use krypto::crypto::StorageCipher;
use krypto::domain::entities::exchange::ExchangeId;
use krypto::domain::entities::order::{Order, OrderSide, OrderType};
use krypto::domain::entities::user::CurrentUser;
use krypto::domain::errors::AppError;
use krypto::persistence::init_database;
use krypto::persistence::models::UpsertCredentials;
use krypto::persistence::repository::{
    BalanceRepository, CredentialRepository, OrderRepository,
};
use krypto::persistence::DbPool;

fn cipher() -> Arc<StorageCipher> {
    Arc::new(StorageCipher::new("unit-master-key-0123456789abcdef").unwrap())
}

fn user(id: i64) -> CurrentUser {
    CurrentUser {
        id,
        email: format!("user{}@example.com", id),
        is_admin: false,
    }
}

async fn db() -> DbPool {
    init_database("sqlite::memory:").await.unwrap()
}

#[tokio::test]
async fn test_practice_order_is_saved_without_exchange_call() {
    let db = db().await;
    let service = TradingService::new(db.clone(), cipher());

    // A practice balance and no stored credentials at all: the order must
    // still succeed because practice orders never reach an exchange.
    let balance = BalanceRepository::new(db.clone())
        .create(1, "USD", 10_000.0, true)
        .await
        .unwrap();

    let order = Order::new(
        ExchangeId::Exmo,
        "BTC/USD".to_string(),
        OrderSide::Buy,
        OrderType::Limit,
        Some(42_000.0),
        0.25,
        balance.id,
    )
    .unwrap();

    let record = service.place_order(&user(1), order).await.unwrap();

    assert_eq!(record.exchange, "exmo");
    assert_eq!(record.symbol, "BTC/USD");
    assert_eq!(record.side, "buy");
    assert_eq!(record.price, Some(42_000.0));
    assert_eq!(record.exchange_order_id, None);

    let orders = OrderRepository::new(db).list_for_user(1).await.unwrap();
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
async fn test_live_order_without_credentials_is_refused() {
    let db = db().await;
    let service = TradingService::new(db.clone(), cipher());

    let balance = BalanceRepository::new(db.clone())
        .create(2, "USD", 5_000.0, false)
        .await
        .unwrap();

    let order = Order::new(
        ExchangeId::Kraken,
        "BTC/USD".to_string(),
        OrderSide::Sell,
        OrderType::Limit,
        Some(40_000.0),
        0.1,
        balance.id,
    )
    .unwrap();

    let result = service.place_order(&user(2), order).await;
    match result {
        Err(AppError::ExchangeNotEnabled { exchange }) => assert_eq!(exchange, "Kraken"),
        other => panic!("expected ExchangeNotEnabled, got {:?}", other.map(|r| r.id)),
    }

    // Nothing was persisted.
    let orders = OrderRepository::new(db).list_for_user(2).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn test_order_on_foreign_balance_is_refused() {
    let db = db().await;
    let service = TradingService::new(db.clone(), cipher());

    let balance = BalanceRepository::new(db.clone())
        .create(3, "USD", 1_000.0, true)
        .await
        .unwrap();

    let order = Order::new(
        ExchangeId::Exmo,
        "ETH/USD".to_string(),
        OrderSide::Buy,
        OrderType::Market,
        None,
        1.0,
        balance.id,
    )
    .unwrap();

    // User 4 tries to spend user 3's balance.
    let result = service.place_order(&user(4), order).await;
    assert!(matches!(result, Err(AppError::PermissionDenied)));
}

#[tokio::test]
async fn test_credentials_encrypted_at_rest_and_recoverable() {
    let db = db().await;
    let cipher = cipher();
    let repo = CredentialRepository::new(db.clone());

    let api_key = "exmo-key-123456";
    let api_secret = "exmo-secret-abcdef";

    let record = repo
        .upsert(UpsertCredentials {
            user_id: 7,
            exchange: "exmo".to_string(),
            api_key_enc: cipher.encrypt(api_key).unwrap(),
            api_secret_enc: cipher.encrypt(api_secret).unwrap(),
            passphrase_enc: None,
        })
        .await
        .unwrap();

    // The stored columns never contain the plaintext.
    assert!(record.api_key_enc.starts_with("ENC:v1:"));
    assert!(!record.api_key_enc.contains(api_key));
    assert!(record.api_secret_enc.starts_with("ENC:v1:"));
    assert!(!record.api_secret_enc.contains(api_secret));

    // And the round trip recovers them.
    let stored = repo.find_activated(7, "exmo").await.unwrap().unwrap();
    assert_eq!(cipher.decrypt(&stored.api_key_enc).unwrap().as_str(), api_key);
    assert_eq!(
        cipher.decrypt(&stored.api_secret_enc).unwrap().as_str(),
        api_secret
    );

    // A different master key cannot decrypt the row.
    let wrong = StorageCipher::new("another-master-key-0123456789abcd").unwrap();
    assert!(wrong.decrypt(&stored.api_key_enc).is_err());
}

#[tokio::test]
async fn test_deactivated_exchange_is_not_enabled() {
    let db = db().await;
    let cipher = cipher();
    let repo = CredentialRepository::new(db.clone());

    repo.upsert(UpsertCredentials {
        user_id: 8,
        exchange: "kraken".to_string(),
        api_key_enc: cipher.encrypt("key").unwrap(),
        api_secret_enc: cipher.encrypt("c2VjcmV0").unwrap(),
        passphrase_enc: None,
    })
    .await
    .unwrap();
    repo.deactivate(8, "kraken").await.unwrap();

    let service = TradingService::new(db.clone(), cipher);
    let result = service.fetch_balance(8, ExchangeId::Kraken).await;
    assert!(matches!(result, Err(AppError::ExchangeNotEnabled { .. })));
}
