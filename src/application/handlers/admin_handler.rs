//! Admin actions: additional pages and bank-transfer review.
//!
//! Every action checks the session (middleware), the admin flag, and demo
//! mode before touching a row, in that order.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use tracing::info;

use crate::application::envelope::Envelope;
use crate::application::handlers::ensure_not_demo;
use crate::application::AppState;
use crate::auth::ensure_admin;
use crate::domain::entities::additional_page::NewAdditionalPage;
use crate::domain::entities::bank_transfer::BankTransferStatus;
use crate::domain::entities::user::CurrentUser;
use crate::domain::errors::AppError;
use crate::persistence::models::CreateAuditLog;
use crate::persistence::repository::{
    AuditLogRepository, BalanceRepository, BankTransferRepository, PageRepository,
};

/// `POST /admin/pages`
pub async fn add_page(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<NewAdditionalPage>,
) -> Result<Envelope, AppError> {
    ensure_admin(&user)?;
    ensure_not_demo(&state.config)?;
    request.validate().map_err(AppError::Validation)?;

    let page = PageRepository::new(state.db.clone())
        .create(
            request.name.trim(),
            request.url.trim(),
            &request.icon,
            &request.icon_svg,
        )
        .await?;

    AuditLogRepository::new(state.db.clone())
        .record(CreateAuditLog {
            event_type: "page_added".to_string(),
            user_id: Some(user.id),
            details: serde_json::json!({"page_id": page.id, "name": page.name, "url": page.url}),
        })
        .await?;

    info!("Admin {} added page {}", user.id, page.id);
    Ok(Envelope::ok_titled("Done", "Success"))
}

/// `GET /admin/pages`
pub async fn list_pages(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    ensure_admin(&user)?;
    let pages = PageRepository::new(state.db.clone()).list().await?;
    Ok(Json(serde_json::json!({"error": 0, "data": pages})))
}

/// `DELETE /admin/pages/:id`
pub async fn delete_page(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Envelope, AppError> {
    ensure_admin(&user)?;
    ensure_not_demo(&state.config)?;

    let deleted = PageRepository::new(state.db.clone()).delete(id).await?;
    if !deleted {
        return Err(AppError::NotFound(format!("page {}", id)));
    }

    AuditLogRepository::new(state.db.clone())
        .record(CreateAuditLog {
            event_type: "page_deleted".to_string(),
            user_id: Some(user.id),
            details: serde_json::json!({"page_id": id}),
        })
        .await?;

    Ok(Envelope::ok_titled("Done", "Success"))
}

/// `GET /admin/audit`: the most recent audit log entries.
pub async fn view_audit_log(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    ensure_admin(&user)?;
    let entries = AuditLogRepository::new(state.db.clone()).recent(100).await?;
    Ok(Json(serde_json::json!({"error": 0, "data": entries})))
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub approve: bool,
}

/// `POST /admin/banktransfer/:id/review`
///
/// Approving a transfer credits the user's live balance with the declared
/// amount.
pub async fn review_bank_transfer(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(request): Json<ReviewRequest>,
) -> Result<Envelope, AppError> {
    ensure_admin(&user)?;
    ensure_not_demo(&state.config)?;

    let transfers = BankTransferRepository::new(state.db.clone());
    let transfer = transfers
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("bank transfer {}", id)))?;

    let status = BankTransferStatus::parse(&transfer.status)
        .ok_or_else(|| AppError::Internal(format!("corrupt status: {}", transfer.status)))?;
    if !status.reviewable() {
        return Err(AppError::validation("Bank transfer is not awaiting review"));
    }

    let reviewed = transfers.review(id, user.id, request.approve).await?;

    if request.approve {
        BalanceRepository::new(state.db.clone())
            .credit(reviewed.user_id, &reviewed.currency, reviewed.amount)
            .await?;
    }

    AuditLogRepository::new(state.db.clone())
        .record(CreateAuditLog {
            event_type: if request.approve {
                "bank_transfer_approved".to_string()
            } else {
                "bank_transfer_rejected".to_string()
            },
            user_id: Some(user.id),
            details: serde_json::json!({
                "bank_transfer_id": id,
                "owner": reviewed.user_id,
                "amount": reviewed.amount,
                "currency": reviewed.currency,
            }),
        })
        .await?;

    info!(
        "Admin {} {} bank transfer {}",
        user.id,
        if request.approve { "approved" } else { "rejected" },
        id
    );
    Ok(Envelope::ok_titled("Done", "Success"))
}
