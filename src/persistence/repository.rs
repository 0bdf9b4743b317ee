//! Database Repositories
//!
//! Data access layer, one repository per aggregate. All queries log their
//! failure and surface a `DatabaseError::QueryError`.

use super::models::*;
use super::{DatabaseError, DbPool};
use chrono::{DateTime, Utc};
use tracing::{debug, error};

fn query_err(context: &str, e: impl std::fmt::Display) -> DatabaseError {
    error!("{}: {}", context, e);
    DatabaseError::QueryError(format!("{}: {}", context, e))
}

pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user: CreateUser) -> Result<UserRecord, DatabaseError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (email, password_hash, password_salt, is_admin, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING *
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.password_salt)
        .bind(user.is_admin)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| query_err("Failed to create user", e))?;

        debug!("Created user {} ({})", record.id, record.email);
        Ok(record)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DatabaseError> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_err("Failed to find user by email", e))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, DatabaseError> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_err("Failed to find user by id", e))
    }
}

pub struct SessionRepository {
    pool: DbPool,
}

impl SessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        token: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, DatabaseError> {
        sqlx::query_as::<_, SessionRecord>(
            r#"
            INSERT INTO sessions (token, user_id, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING *
            "#,
        )
        .bind(token)
        .bind(user_id)
        .bind(Utc::now())
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| query_err("Failed to create session", e))
    }

    /// Look up a session that has not expired. Expired rows are invisible,
    /// exactly like missing ones.
    pub async fn find_valid(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, DatabaseError> {
        sqlx::query_as::<_, SessionRecord>(
            "SELECT * FROM sessions WHERE token = ?1 AND expires_at > ?2",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_err("Failed to look up session", e))
    }

    pub async fn delete(&self, token: &str) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| query_err("Failed to delete session", e))?;
        Ok(())
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| query_err("Failed to purge sessions", e))?;
        Ok(result.rows_affected())
    }
}

pub struct PageRepository {
    pool: DbPool,
}

impl PageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        name: &str,
        url: &str,
        icon: &str,
        icon_svg: &str,
    ) -> Result<AdditionalPageRecord, DatabaseError> {
        let record = sqlx::query_as::<_, AdditionalPageRecord>(
            r#"
            INSERT INTO additional_pages (name, url, icon, icon_svg, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(url)
        .bind(icon)
        .bind(icon_svg)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| query_err("Failed to create additional page", e))?;

        debug!("Created additional page {} ({})", record.id, record.name);
        Ok(record)
    }

    pub async fn list(&self) -> Result<Vec<AdditionalPageRecord>, DatabaseError> {
        sqlx::query_as::<_, AdditionalPageRecord>(
            "SELECT * FROM additional_pages ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_err("Failed to list additional pages", e))
    }

    pub async fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM additional_pages WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_err("Failed to delete additional page", e))?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct CredentialRepository {
    pool: DbPool,
}

impl CredentialRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Store or replace the credentials for (user, exchange) and mark them
    /// activated.
    pub async fn upsert(
        &self,
        input: UpsertCredentials,
    ) -> Result<CredentialRecord, DatabaseError> {
        let now = Utc::now();
        sqlx::query_as::<_, CredentialRecord>(
            r#"
            INSERT INTO exchange_credentials
                (user_id, exchange, api_key_enc, api_secret_enc, passphrase_enc,
                 activated, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
            ON CONFLICT (user_id, exchange) DO UPDATE SET
                api_key_enc = excluded.api_key_enc,
                api_secret_enc = excluded.api_secret_enc,
                passphrase_enc = excluded.passphrase_enc,
                activated = 1,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(input.user_id)
        .bind(&input.exchange)
        .bind(&input.api_key_enc)
        .bind(&input.api_secret_enc)
        .bind(&input.passphrase_enc)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| query_err("Failed to upsert credentials", e))
    }

    pub async fn deactivate(&self, user_id: i64, exchange: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE exchange_credentials
            SET activated = 0, updated_at = ?1
            WHERE user_id = ?2 AND exchange = ?3 AND activated = 1
            "#,
        )
        .bind(Utc::now())
        .bind(user_id)
        .bind(exchange)
        .execute(&self.pool)
        .await
        .map_err(|e| query_err("Failed to deactivate credentials", e))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_activated(
        &self,
        user_id: i64,
        exchange: &str,
    ) -> Result<Option<CredentialRecord>, DatabaseError> {
        sqlx::query_as::<_, CredentialRecord>(
            "SELECT * FROM exchange_credentials \
             WHERE user_id = ?1 AND exchange = ?2 AND activated = 1",
        )
        .bind(user_id)
        .bind(exchange)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_err("Failed to load credentials", e))
    }

    pub async fn list_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<CredentialRecord>, DatabaseError> {
        sqlx::query_as::<_, CredentialRecord>(
            "SELECT * FROM exchange_credentials WHERE user_id = ?1 ORDER BY exchange",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_err("Failed to list credentials", e))
    }
}

pub struct BalanceRepository {
    pool: DbPool,
}

impl BalanceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: i64,
        currency: &str,
        available: f64,
        practice: bool,
    ) -> Result<TradingBalanceRecord, DatabaseError> {
        let now = Utc::now();
        sqlx::query_as::<_, TradingBalanceRecord>(
            r#"
            INSERT INTO trading_balances
                (user_id, currency, available, locked, practice, created_at, updated_at)
            VALUES (?1, ?2, ?3, 0.0, ?4, ?5, ?5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(currency)
        .bind(available)
        .bind(practice)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| query_err("Failed to create trading balance", e))
    }

    pub async fn get(&self, id: i64) -> Result<Option<TradingBalanceRecord>, DatabaseError> {
        sqlx::query_as::<_, TradingBalanceRecord>("SELECT * FROM trading_balances WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_err("Failed to get trading balance", e))
    }

    pub async fn list_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<TradingBalanceRecord>, DatabaseError> {
        sqlx::query_as::<_, TradingBalanceRecord>(
            "SELECT * FROM trading_balances WHERE user_id = ?1 ORDER BY currency",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_err("Failed to list trading balances", e))
    }

    /// Credit a user's live balance, creating the row if it does not exist.
    pub async fn credit(
        &self,
        user_id: i64,
        currency: &str,
        amount: f64,
    ) -> Result<TradingBalanceRecord, DatabaseError> {
        let now = Utc::now();
        sqlx::query_as::<_, TradingBalanceRecord>(
            r#"
            INSERT INTO trading_balances
                (user_id, currency, available, locked, practice, created_at, updated_at)
            VALUES (?1, ?2, ?3, 0.0, 0, ?4, ?4)
            ON CONFLICT (user_id, currency, practice) DO UPDATE SET
                available = available + excluded.available,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(currency)
        .bind(amount)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| query_err("Failed to credit trading balance", e))
    }
}

pub struct OrderRepository {
    pool: DbPool,
}

impl OrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, order: CreateOrder) -> Result<OrderRecord, DatabaseError> {
        let record = sqlx::query_as::<_, OrderRecord>(
            r#"
            INSERT INTO orders
                (id, user_id, balance_id, exchange, symbol, side, order_type,
                 price, quantity, exchange_order_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            RETURNING *
            "#,
        )
        .bind(&order.id)
        .bind(order.user_id)
        .bind(order.balance_id)
        .bind(&order.exchange)
        .bind(&order.symbol)
        .bind(&order.side)
        .bind(&order.order_type)
        .bind(order.price)
        .bind(order.quantity)
        .bind(&order.exchange_order_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| query_err("Failed to create order", e))?;

        debug!("Saved order {} on {}", record.id, record.exchange);
        Ok(record)
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<OrderRecord>, DatabaseError> {
        sqlx::query_as::<_, OrderRecord>(
            "SELECT * FROM orders WHERE user_id = ?1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_err("Failed to list orders", e))
    }
}

pub struct BankTransferRepository {
    pool: DbPool,
}

impl BankTransferRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: i64,
        amount: f64,
        currency: &str,
    ) -> Result<BankTransferRecord, DatabaseError> {
        sqlx::query_as::<_, BankTransferRecord>(
            r#"
            INSERT INTO bank_transfers (user_id, amount, currency, status, created_at)
            VALUES (?1, ?2, ?3, 'pending', ?4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(currency)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| query_err("Failed to create bank transfer", e))
    }

    pub async fn get(&self, id: i64) -> Result<Option<BankTransferRecord>, DatabaseError> {
        sqlx::query_as::<_, BankTransferRecord>("SELECT * FROM bank_transfers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_err("Failed to get bank transfer", e))
    }

    /// Attach (or replace) a proof file and mark the transfer submitted.
    /// Only rows still awaiting review can be touched.
    pub async fn attach_proof(
        &self,
        id: i64,
        proof_path: &str,
    ) -> Result<BankTransferRecord, DatabaseError> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, BankTransferRecord>(
            r#"
            UPDATE bank_transfers
            SET status = 'submitted', proof_path = ?1, proof_submitted_at = ?2
            WHERE id = ?3 AND status IN ('pending', 'submitted')
            RETURNING *
            "#,
        )
        .bind(proof_path)
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_err("Failed to attach proof", e))?;

        record.ok_or_else(|| {
            DatabaseError::QueryError(format!(
                "Bank transfer not found or already reviewed: {}",
                id
            ))
        })
    }

    /// Record the admin decision on a submitted proof.
    pub async fn review(
        &self,
        id: i64,
        reviewer_id: i64,
        approved: bool,
    ) -> Result<BankTransferRecord, DatabaseError> {
        let status = if approved { "approved" } else { "rejected" };
        let record = sqlx::query_as::<_, BankTransferRecord>(
            r#"
            UPDATE bank_transfers
            SET status = ?1, reviewed_by = ?2, reviewed_at = ?3
            WHERE id = ?4 AND status = 'submitted'
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(reviewer_id)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_err("Failed to review bank transfer", e))?;

        record.ok_or_else(|| {
            DatabaseError::QueryError(format!(
                "Bank transfer not reviewable: {}",
                id
            ))
        })
    }

    pub async fn list_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<BankTransferRecord>, DatabaseError> {
        sqlx::query_as::<_, BankTransferRecord>(
            "SELECT * FROM bank_transfers WHERE user_id = ?1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_err("Failed to list bank transfers", e))
    }
}

pub struct PaymentRepository {
    pool: DbPool,
}

impl PaymentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, payment: CreatePayment) -> Result<PaymentRecord, DatabaseError> {
        let now = Utc::now();
        sqlx::query_as::<_, PaymentRecord>(
            r#"
            INSERT INTO payments (txref, user_id, amount, currency, status, gateway,
                                  created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 'initialized', 'rave', ?5, ?5)
            RETURNING *
            "#,
        )
        .bind(&payment.txref)
        .bind(payment.user_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| query_err("Failed to create payment", e))
    }

    pub async fn set_status(&self, txref: &str, status: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE payments SET status = ?1, updated_at = ?2 WHERE txref = ?3",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(txref)
        .execute(&self.pool)
        .await
        .map_err(|e| query_err("Failed to update payment status", e))?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::QueryError(format!(
                "Payment not found: {}",
                txref
            )));
        }
        Ok(())
    }

    pub async fn find_by_txref(
        &self,
        txref: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>("SELECT * FROM payments WHERE txref = ?1")
            .bind(txref)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_err("Failed to find payment", e))
    }
}

pub struct AuditLogRepository {
    pool: DbPool,
}

impl AuditLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, entry: CreateAuditLog) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO audit_log (event_type, user_id, details, timestamp) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&entry.event_type)
        .bind(entry.user_id)
        .bind(entry.details.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| query_err("Failed to write audit log", e))?;
        Ok(())
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditLogRecord>, DatabaseError> {
        sqlx::query_as::<_, AuditLogRecord>(
            "SELECT * FROM audit_log ORDER BY timestamp DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_err("Failed to read audit log", e))
    }
}
