//! Payment-side services: the database-backed Rave event handler and proof
//! file storage.

use async_trait::async_trait;
use rand::RngCore;
use tracing::{error, info};

use crate::domain::entities::bank_transfer::{validate_proof_filename, validate_proof_size};
use crate::domain::errors::AppError;
use crate::infrastructure::rave_client::RaveEventHandler;
use crate::persistence::models::CreateAuditLog;
use crate::persistence::repository::{AuditLogRepository, PaymentRepository};
use crate::persistence::DbPool;

/// Event handler that mirrors gateway callbacks into the payments table.
///
/// Handler hooks cannot fail the requery loop, so storage errors are
/// logged and swallowed here.
pub struct DbRaveEventHandler {
    db: DbPool,
    user_id: i64,
    txref: String,
}

impl DbRaveEventHandler {
    pub fn new(db: DbPool, user_id: i64, txref: impl Into<String>) -> Self {
        Self {
            db,
            user_id,
            txref: txref.into(),
        }
    }

    async fn set_status(&self, status: &str) {
        if let Err(e) = PaymentRepository::new(self.db.clone())
            .set_status(&self.txref, status)
            .await
        {
            error!("Failed to mark payment {} {}: {}", self.txref, status, e);
            return;
        }
        let _ = AuditLogRepository::new(self.db.clone())
            .record(CreateAuditLog {
                event_type: format!("payment_{}", status),
                user_id: Some(self.user_id),
                details: serde_json::json!({"txref": self.txref}),
            })
            .await;
    }
}

#[async_trait]
impl RaveEventHandler for DbRaveEventHandler {
    async fn on_requery(&self, txref: &str) {
        info!("Requery in progress for {}", txref);
    }

    async fn on_successful(&self, _data: &serde_json::Value) {
        self.set_status("successful").await;
    }

    async fn on_failure(&self, _data: &serde_json::Value) {
        self.set_status("failed").await;
    }

    async fn on_timeout(&self, _txref: &str, _response: &serde_json::Value) {
        self.set_status("timeout").await;
    }

    async fn on_cancel(&self, _txref: &str) {
        self.set_status("cancelled").await;
    }

    async fn on_requery_error(&self, _response: &serde_json::Value) {
        self.set_status("requery_error").await;
    }
}

/// Persist an uploaded proof file under the configured upload directory,
/// keyed by a random name so uploads can never collide or be guessed.
///
/// Returns the stored path.
pub async fn store_proof(
    upload_dir: &str,
    original_filename: &str,
    bytes: &[u8],
    max_bytes: usize,
) -> Result<String, AppError> {
    let extension = validate_proof_filename(original_filename).map_err(AppError::Validation)?;
    validate_proof_size(bytes.len(), max_bytes).map_err(AppError::Validation)?;

    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create upload dir: {}", e)))?;

    let mut name_bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut name_bytes);
    let stored_path = format!("{}/{}.{}", upload_dir, hex::encode(name_bytes), extension);

    tokio::fs::write(&stored_path, bytes)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to store proof: {}", e)))?;

    info!("Stored proof file {}", stored_path);
    Ok(stored_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_proof_writes_file() {
        let dir = std::env::temp_dir().join("krypto_proof_test");
        let dir = dir.to_string_lossy().to_string();

        let path = store_proof(&dir, "receipt.png", b"fake image bytes", 1024)
            .await
            .unwrap();

        assert!(path.starts_with(&dir));
        assert!(path.ends_with(".png"));
        let stored = tokio::fs::read(&path).await.unwrap();
        assert_eq!(stored, b"fake image bytes");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_store_proof_rejects_bad_extension() {
        let dir = std::env::temp_dir().join("krypto_proof_test");
        let result = store_proof(&dir.to_string_lossy(), "malware.exe", b"x", 1024).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_store_proof_rejects_oversize() {
        let dir = std::env::temp_dir().join("krypto_proof_test");
        let result = store_proof(&dir.to_string_lossy(), "big.png", &[0u8; 64], 16).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
