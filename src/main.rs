mod application;
mod auth;
mod config;
mod crypto;
mod domain;
mod infrastructure;
mod persistence;
mod rate_limit;
mod secrets;

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Request},
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::application::handlers::{
    admin_handler, payment_handler, session_handler, trade_handler,
};
use crate::application::AppState;
use crate::config::AppConfig;
use crate::crypto::StorageCipher;
use crate::infrastructure::rave_client::RaveClient;
use crate::persistence::repository::SessionRepository;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "krypto=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Krypto back office starting...");

    let config = Arc::new(AppConfig::from_env()?);
    if config.demo_mode {
        info!("Demo mode is ON: admin mutations are disabled");
    }

    let cipher = Arc::new(StorageCipher::new(&config.master_key)?);
    let db = persistence::init_database(&config.database_url).await?;
    let rave = Arc::new(RaveClient::new(
        &config.rave.public_key,
        &config.rave.secret_key,
        &config.rave.txref_prefix,
        config.rave.env,
        false,
    )?);

    bootstrap_admin(&db).await?;

    let state = AppState {
        db: db.clone(),
        config: config.clone(),
        cipher,
        rave,
    };

    // Periodically drop expired sessions.
    tokio::spawn(async move {
        session_purge_task(db).await;
    });

    let protected = Router::new()
        .route("/session/logout", post(session_handler::logout))
        .route(
            "/admin/pages",
            post(admin_handler::add_page).get(admin_handler::list_pages),
        )
        .route("/admin/pages/:id", delete(admin_handler::delete_page))
        .route(
            "/admin/banktransfer/:id/review",
            post(admin_handler::review_bank_transfer),
        )
        .route("/admin/audit", get(admin_handler::view_audit_log))
        .route(
            "/trade/credentials",
            post(trade_handler::upsert_credentials).get(trade_handler::list_credentials),
        )
        .route(
            "/trade/credentials/:exchange",
            delete(trade_handler::deactivate_credentials),
        )
        .route(
            "/trade/orders",
            post(trade_handler::create_order).get(trade_handler::list_orders),
        )
        .route(
            "/trade/orders/:exchange/open",
            get(trade_handler::open_orders),
        )
        .route("/trade/balance/:exchange", get(trade_handler::get_balance))
        .route(
            "/trade/balances",
            get(trade_handler::list_trading_balances)
                .post(trade_handler::create_trading_balance),
        )
        .route(
            "/payment/banktransfer",
            post(payment_handler::create_bank_transfer),
        )
        .route(
            "/payment/banktransfer/:id/proof",
            post(payment_handler::upload_proof),
        )
        .route(
            "/payment/banktransfers",
            get(payment_handler::list_bank_transfers),
        )
        .route(
            "/payment/rave/initialize",
            post(payment_handler::rave_initialize),
        )
        .route("/payment/rave/requery", post(payment_handler::rave_requery))
        .route("/payment/rave/cancel", post(payment_handler::rave_cancel))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    let limiter = rate_limit::create_rate_limiter(config.rate_limit_per_minute);
    let body_limit = config.max_proof_bytes + 64 * 1024;

    let app = Router::new()
        .route("/", get(|| async { "Krypto back office is running" }))
        .route("/health", get(health_check))
        .route("/session/login", post(session_handler::login))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(RequestBodyLimitLayer::new(body_limit))
                .map_request(|req: Request<_>| req.map(Body::new))
                .layer(middleware::from_fn(move |request, next| {
                    rate_limit::rate_limit_middleware(limiter.clone(), request, next)
                })),
        )
        .with_state(state);

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let server = axum::serve(listener, app);

    let shutdown_signal = async {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    info!("Server started successfully. Press Ctrl+C to stop.");
    server.with_graceful_shutdown(shutdown_signal).await?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<serde_json::Value> {
    let db_ok = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();
    Json(serde_json::json!({
        "status": "running",
        "database": db_ok,
        "demo_mode": state.config.demo_mode,
    }))
}

/// Create the operator account from `KRYPTO_ADMIN_EMAIL` /
/// `KRYPTO_ADMIN_PASSWORD` if it does not exist yet.
async fn bootstrap_admin(
    db: &persistence::DbPool,
) -> Result<(), Box<dyn std::error::Error>> {
    use crate::domain::entities::user::{generate_salt, hash_password};
    use crate::persistence::models::CreateUser;
    use crate::persistence::repository::UserRepository;

    let (email, password) = match (
        std::env::var("KRYPTO_ADMIN_EMAIL"),
        std::env::var("KRYPTO_ADMIN_PASSWORD"),
    ) {
        (Ok(email), Ok(password)) if !email.trim().is_empty() && !password.is_empty() => {
            (email.trim().to_string(), password)
        }
        _ => {
            info!("No admin bootstrap configured");
            return Ok(());
        }
    };

    let users = UserRepository::new(db.clone());
    if users.find_by_email(&email).await?.is_some() {
        return Ok(());
    }

    let salt = generate_salt();
    let user = users
        .create(CreateUser {
            email: email.clone(),
            password_hash: hash_password(&password, &salt),
            password_salt: salt,
            is_admin: true,
        })
        .await?;
    info!("Bootstrapped admin account {} ({})", user.id, email);

    Ok(())
}

/// Background task dropping expired session rows once an hour.
async fn session_purge_task(db: persistence::DbPool) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(3600));
    let sessions = SessionRepository::new(db);

    loop {
        interval.tick().await;
        match sessions.purge_expired(chrono::Utc::now()).await {
            Ok(0) => {}
            Ok(purged) => info!("Purged {} expired sessions", purged),
            Err(e) => error!("Session purge failed: {}", e),
        }
    }
}
