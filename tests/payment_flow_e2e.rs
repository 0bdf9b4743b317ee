//! End-to-end tests for the payment flows: bank-transfer proof lifecycle
//! and the Rave requery retry loop against a local mock gateway.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Extension, Json, Router};
use zeroize::Zeroizing;

use krypto::application::handlers::admin_handler;
use krypto::application::services::payment_service::store_proof;
use krypto::application::AppState;
use krypto::config::{AppConfig, RaveConfig, RaveEnv};
use krypto::crypto::StorageCipher;
use krypto::domain::entities::user::CurrentUser;
use krypto::infrastructure::rave_client::{
    RaveClient, RaveEventHandler, RequeryStatus,
};
use krypto::persistence::init_database;
use krypto::persistence::repository::{BalanceRepository, BankTransferRepository};

async fn test_state() -> AppState {
    let db = init_database("sqlite::memory:").await.unwrap();
    let config = AppConfig {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        database_url: "sqlite::memory:".to_string(),
        demo_mode: false,
        upload_dir: std::env::temp_dir()
            .join("krypto_payment_e2e")
            .to_string_lossy()
            .to_string(),
        max_proof_bytes: 1024 * 1024,
        rate_limit_per_minute: 100,
        session_ttl_seconds: 3600,
        master_key: Zeroizing::new("unit-master-key-0123456789abcdef".to_string()),
        rave: RaveConfig {
            public_key: "pk".to_string(),
            secret_key: Zeroizing::new("sk".to_string()),
            env: RaveEnv::Staging,
            txref_prefix: "KRYPTO".to_string(),
        },
    };
    let cipher = Arc::new(StorageCipher::new(&config.master_key).unwrap());
    let rave = Arc::new(
        RaveClient::new_with_base_url("pk", "sk", "KRYPTO", "http://127.0.0.1:1", false).unwrap(),
    );
    AppState {
        db,
        config: Arc::new(config),
        cipher,
        rave,
    }
}

fn admin() -> CurrentUser {
    CurrentUser {
        id: 99,
        email: "admin@example.com".to_string(),
        is_admin: true,
    }
}

#[tokio::test]
async fn test_bank_transfer_proof_then_approval_credits_balance() {
    let state = test_state().await;
    let transfers = BankTransferRepository::new(state.db.clone());

    // User 5 declares a transfer and uploads a proof.
    let transfer = transfers.create(5, 300.0, "EUR").await.unwrap();
    let proof_path = store_proof(
        &state.config.upload_dir,
        "receipt.jpg",
        b"jpeg bytes",
        state.config.max_proof_bytes,
    )
    .await
    .unwrap();
    transfers
        .attach_proof(transfer.id, &proof_path)
        .await
        .unwrap();

    // Admin approves; the user's live EUR balance is credited.
    let envelope = admin_handler::review_bank_transfer(
        State(state.clone()),
        Extension(admin()),
        Path(transfer.id),
        Json(admin_handler::ReviewRequest { approve: true }),
    )
    .await
    .unwrap();
    assert_eq!(envelope.error, 0);

    let balances = BalanceRepository::new(state.db.clone())
        .list_for_user(5)
        .await
        .unwrap();
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].currency, "EUR");
    assert_eq!(balances[0].available, 300.0);

    let reviewed = transfers.get(transfer.id).await.unwrap().unwrap();
    assert_eq!(reviewed.status, "approved");
    assert_eq!(reviewed.reviewed_by, Some(99));

    let _ = tokio::fs::remove_file(&proof_path).await;
}

#[tokio::test]
async fn test_rejected_transfer_leaves_balance_untouched() {
    let state = test_state().await;
    let transfers = BankTransferRepository::new(state.db.clone());

    let transfer = transfers.create(6, 100.0, "USD").await.unwrap();
    transfers
        .attach_proof(transfer.id, "data/proofs/x.png")
        .await
        .unwrap();

    admin_handler::review_bank_transfer(
        State(state.clone()),
        Extension(admin()),
        Path(transfer.id),
        Json(admin_handler::ReviewRequest { approve: false }),
    )
    .await
    .unwrap();

    let balances = BalanceRepository::new(state.db.clone())
        .list_for_user(6)
        .await
        .unwrap();
    assert!(balances.is_empty());

    // A review of a pending (no proof) transfer is refused.
    let fresh = transfers.create(6, 50.0, "USD").await.unwrap();
    let result = admin_handler::review_bank_transfer(
        State(state.clone()),
        Extension(admin()),
        Path(fresh.id),
        Json(admin_handler::ReviewRequest { approve: true }),
    )
    .await;
    assert!(result.is_err());
}

/// Counts every event the requery loop fires.
#[derive(Default)]
struct CountingHandler {
    requeries: AtomicU32,
    successes: AtomicU32,
    failures: AtomicU32,
    timeouts: AtomicU32,
    errors: AtomicU32,
}

#[async_trait]
impl RaveEventHandler for CountingHandler {
    async fn on_requery(&self, _txref: &str) {
        self.requeries.fetch_add(1, Ordering::SeqCst);
    }
    async fn on_successful(&self, _data: &serde_json::Value) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }
    async fn on_failure(&self, _data: &serde_json::Value) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
    async fn on_timeout(&self, _txref: &str, _response: &serde_json::Value) {
        self.timeouts.fetch_add(1, Ordering::SeqCst);
    }
    async fn on_requery_error(&self, _response: &serde_json::Value) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

/// Spawn a mock gateway that answers every requery with the given body.
async fn spawn_mock_gateway(body: serde_json::Value) -> String {
    let app = Router::new().route(
        "/flwv3-pug/getpaidx/api/xrequery",
        post(move || {
            let body = body.clone();
            async move { Json(body) }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn gateway_client(base_url: &str) -> RaveClient {
    RaveClient::new_with_base_url("pk", "sk", "KRYPTO", base_url, false)
        .unwrap()
        .with_requery_delay(Duration::ZERO)
}

#[tokio::test]
async fn test_requery_successful_transaction() {
    let base = spawn_mock_gateway(serde_json::json!({
        "status": "success",
        "data": {"status": "successful", "txref": "KRYPTO_T1"}
    }))
    .await;

    let handler = CountingHandler::default();
    let status = gateway_client(&base)
        .requery_transaction("KRYPTO_T1", &handler)
        .await
        .unwrap();

    assert_eq!(status, RequeryStatus::Successful);
    assert_eq!(handler.requeries.load(Ordering::SeqCst), 1);
    assert_eq!(handler.successes.load(Ordering::SeqCst), 1);
    assert_eq!(handler.timeouts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_requery_failed_transaction() {
    let base = spawn_mock_gateway(serde_json::json!({
        "status": "success",
        "data": {"status": "failed", "txref": "KRYPTO_T2"}
    }))
    .await;

    let handler = CountingHandler::default();
    let status = gateway_client(&base)
        .requery_transaction("KRYPTO_T2", &handler)
        .await
        .unwrap();

    assert_eq!(status, RequeryStatus::Failed);
    assert_eq!(handler.failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_requery_undecisive_terminates_after_bounded_retries() {
    // The gateway never reaches a decisive status.
    let base = spawn_mock_gateway(serde_json::json!({
        "status": "success",
        "data": {"status": "pending", "txref": "KRYPTO_T3"}
    }))
    .await;

    let handler = CountingHandler::default();
    let status = gateway_client(&base)
        .requery_transaction("KRYPTO_T3", &handler)
        .await
        .unwrap();

    assert_eq!(status, RequeryStatus::TimedOut);
    // 1 initial query + 4 retries, then the timeout event fires once.
    assert_eq!(handler.requeries.load(Ordering::SeqCst), 5);
    assert_eq!(handler.timeouts.load(Ordering::SeqCst), 1);
    assert_eq!(handler.successes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_requery_gateway_error_fires_error_event() {
    let base = spawn_mock_gateway(serde_json::json!({
        "status": "error",
        "message": "invalid SECKEY"
    }))
    .await;

    let handler = CountingHandler::default();
    let status = gateway_client(&base)
        .requery_transaction("KRYPTO_T4", &handler)
        .await
        .unwrap();

    assert_eq!(status, RequeryStatus::GatewayError);
    assert_eq!(handler.errors.load(Ordering::SeqCst), 1);
    assert_eq!(handler.requeries.load(Ordering::SeqCst), 1);
}
