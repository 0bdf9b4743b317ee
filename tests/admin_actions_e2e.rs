//! End-to-end tests for the admin action flow: session guard, admin guard,
//! demo mode, URL validation, and the resulting rows.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use zeroize::Zeroizing;

use krypto::application::handlers::admin_handler;
use krypto::application::AppState;
use krypto::config::{AppConfig, RaveConfig, RaveEnv};
use krypto::crypto::StorageCipher;
use krypto::domain::entities::additional_page::NewAdditionalPage;
use krypto::domain::entities::user::CurrentUser;
use krypto::domain::errors::AppError;
use krypto::infrastructure::rave_client::RaveClient;
use krypto::persistence::init_database;
use krypto::persistence::repository::PageRepository;

async fn test_state(demo_mode: bool) -> AppState {
    let db = init_database("sqlite::memory:").await.unwrap();
    let config = AppConfig {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        database_url: "sqlite::memory:".to_string(),
        demo_mode,
        upload_dir: std::env::temp_dir()
            .join("krypto_admin_e2e")
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
        id: 1,
        email: "admin@example.com".to_string(),
        is_admin: true,
    }
}

fn regular_user() -> CurrentUser {
    CurrentUser {
        id: 2,
        email: "user@example.com".to_string(),
        is_admin: false,
    }
}

fn page_request(name: &str, url: &str) -> NewAdditionalPage {
    NewAdditionalPage {
        name: name.to_string(),
        url: url.to_string(),
        icon: "link".to_string(),
        icon_svg: String::new(),
    }
}

#[tokio::test]
async fn test_admin_adds_page_and_row_exists() {
    let state = test_state(false).await;

    let envelope = admin_handler::add_page(
        State(state.clone()),
        Extension(admin()),
        Json(page_request("News", "https://example.com/news")),
    )
    .await
    .unwrap();

    assert_eq!(envelope.error, 0);
    assert_eq!(envelope.msg, "Done");
    assert_eq!(envelope.title.as_deref(), Some("Success"));

    let pages = PageRepository::new(state.db.clone()).list().await.unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].name, "News");
    assert_eq!(pages[0].url, "https://example.com/news");
}

#[tokio::test]
async fn test_non_admin_is_rejected_and_no_row_written() {
    let state = test_state(false).await;

    let result = admin_handler::add_page(
        State(state.clone()),
        Extension(regular_user()),
        Json(page_request("News", "https://example.com/news")),
    )
    .await;

    assert!(matches!(result, Err(AppError::PermissionDenied)));

    let pages = PageRepository::new(state.db.clone()).list().await.unwrap();
    assert!(pages.is_empty());
}

#[tokio::test]
async fn test_demo_mode_blocks_mutation() {
    let state = test_state(true).await;

    let result = admin_handler::add_page(
        State(state.clone()),
        Extension(admin()),
        Json(page_request("News", "https://example.com/news")),
    )
    .await;

    assert!(matches!(result, Err(AppError::DemoMode)));
}

#[tokio::test]
async fn test_malformed_url_is_rejected() {
    let state = test_state(false).await;

    for bad_url in ["not a url", "ftp://example.com", "/relative", ""] {
        let result = admin_handler::add_page(
            State(state.clone()),
            Extension(admin()),
            Json(page_request("News", bad_url)),
        )
        .await;
        assert!(result.is_err(), "URL {:?} should be rejected", bad_url);
    }

    let pages = PageRepository::new(state.db.clone()).list().await.unwrap();
    assert!(pages.is_empty());
}

#[tokio::test]
async fn test_delete_page_flow() {
    let state = test_state(false).await;

    admin_handler::add_page(
        State(state.clone()),
        Extension(admin()),
        Json(page_request("News", "https://example.com/news")),
    )
    .await
    .unwrap();

    let pages = PageRepository::new(state.db.clone()).list().await.unwrap();
    let id = pages[0].id;

    let envelope =
        admin_handler::delete_page(State(state.clone()), Extension(admin()), Path(id))
            .await
            .unwrap();
    assert_eq!(envelope.error, 0);

    // Deleting again reports not found.
    let result =
        admin_handler::delete_page(State(state.clone()), Extension(admin()), Path(id)).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_list_pages_requires_admin() {
    let state = test_state(false).await;
    let result =
        admin_handler::list_pages(State(state.clone()), Extension(regular_user())).await;
    assert!(matches!(result, Err(AppError::PermissionDenied)));
}
