//! Persistence Layer
//!
//! SQLite storage for users, sessions, additional pages, exchange
//! credentials (encrypted columns), trading balances, orders, bank
//! transfers, payments, and the audit log. Async access via sqlx with
//! in-code migrations.

pub mod models;
pub mod repository;

use rand::RngCore;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),
}

/// Generate an opaque primary key for rows keyed by text ids (orders).
pub fn new_record_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Initialize the database connection pool and run migrations.
pub async fn init_database(database_url: &str) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", database_url);

    // Ensure data directory exists
    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .log_statements(tracing::log::LevelFilter::Debug);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    let statements: &[(&str, &str)] = &[
        (
            "users",
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                password_salt TEXT NOT NULL,
                is_admin BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        ),
        (
            "sessions",
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                expires_at DATETIME NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )
            "#,
        ),
        (
            "additional_pages",
            r#"
            CREATE TABLE IF NOT EXISTS additional_pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                icon TEXT NOT NULL DEFAULT '',
                icon_svg TEXT NOT NULL DEFAULT '',
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        ),
        (
            "exchange_credentials",
            r#"
            CREATE TABLE IF NOT EXISTS exchange_credentials (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                exchange TEXT NOT NULL,
                api_key_enc TEXT NOT NULL,
                api_secret_enc TEXT NOT NULL,
                passphrase_enc TEXT,
                activated BOOLEAN NOT NULL DEFAULT 1,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (user_id, exchange),
                FOREIGN KEY (user_id) REFERENCES users(id)
            )
            "#,
        ),
        (
            "trading_balances",
            r#"
            CREATE TABLE IF NOT EXISTS trading_balances (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                currency TEXT NOT NULL,
                available REAL NOT NULL DEFAULT 0.0,
                locked REAL NOT NULL DEFAULT 0.0,
                practice BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (user_id, currency, practice),
                FOREIGN KEY (user_id) REFERENCES users(id)
            )
            "#,
        ),
        (
            "orders",
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                balance_id INTEGER NOT NULL,
                exchange TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL CHECK(side IN ('buy', 'sell')),
                order_type TEXT NOT NULL CHECK(order_type IN ('market', 'limit')),
                price REAL,
                quantity REAL NOT NULL,
                exchange_order_id TEXT,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (balance_id) REFERENCES trading_balances(id)
            )
            "#,
        ),
        (
            "bank_transfers",
            r#"
            CREATE TABLE IF NOT EXISTS bank_transfers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                amount REAL NOT NULL,
                currency TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK(status IN ('pending', 'submitted', 'approved', 'rejected')),
                proof_path TEXT,
                proof_submitted_at DATETIME,
                reviewed_by INTEGER,
                reviewed_at DATETIME,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )
            "#,
        ),
        (
            "payments",
            r#"
            CREATE TABLE IF NOT EXISTS payments (
                txref TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                amount REAL NOT NULL,
                currency TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'initialized',
                gateway TEXT NOT NULL DEFAULT 'rave',
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )
            "#,
        ),
        (
            "audit_log",
            r#"
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type TEXT NOT NULL,
                user_id INTEGER,
                details TEXT NOT NULL,
                timestamp DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        ),
    ];

    for (table, sql) in statements {
        sqlx::query(sql).execute(pool).await.map_err(|e| {
            DatabaseError::MigrationError(format!("Failed to create {} table: {}", table, e))
        })?;
    }

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at)",
        "CREATE INDEX IF NOT EXISTS idx_credentials_user ON exchange_credentials(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_orders_created_at ON orders(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_bank_transfers_user ON bank_transfers(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_bank_transfers_status ON bank_transfers(status)",
        "CREATE INDEX IF NOT EXISTS idx_payments_user ON payments(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp)",
    ];

    for sql in indexes {
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;
    }

    info!("Database migrations completed successfully");

    Ok(())
}
