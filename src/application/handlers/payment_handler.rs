//! Payment actions: bank-transfer proofs and Rave hosted checkout.

use axum::{
    extract::{Multipart, Path, State},
    Extension, Json,
};
use serde::Deserialize;
use tracing::info;

use crate::application::envelope::Envelope;
use crate::application::services::payment_service::{store_proof, DbRaveEventHandler};
use crate::application::AppState;
use crate::domain::entities::bank_transfer::BankTransferStatus;
use crate::domain::entities::user::CurrentUser;
use crate::domain::errors::AppError;
use crate::infrastructure::rave_client::CheckoutRequest;
use crate::persistence::models::{CreateAuditLog, CreateBankTransfer, CreatePayment};
use crate::persistence::repository::{
    AuditLogRepository, BankTransferRepository, PaymentRepository,
};

/// `POST /payment/banktransfer`: declare an offline transfer the user is
/// about to make; the proof comes in a later upload.
pub async fn create_bank_transfer(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CreateBankTransfer>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !request.amount.is_finite() || request.amount <= 0.0 {
        return Err(AppError::invalid_args("amount must be positive"));
    }
    if request.currency.trim().is_empty() {
        return Err(AppError::invalid_args("currency is required"));
    }

    let transfer = BankTransferRepository::new(state.db.clone())
        .create(user.id, request.amount, request.currency.trim())
        .await?;

    Ok(Json(serde_json::json!({
        "error": 0,
        "msg": "Done",
        "bank_transfer": transfer,
    })))
}

/// `POST /payment/banktransfer/:id/proof`: multipart proof upload.
///
/// The caller must own the transfer and the transfer must still be
/// awaiting review. The file arrives in a `file` part.
pub async fn upload_proof(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Envelope, AppError> {
    let transfers = BankTransferRepository::new(state.db.clone());
    let transfer = transfers
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("bank transfer {}", id)))?;
    if transfer.user_id != user.id {
        return Err(AppError::PermissionDenied);
    }

    let status = BankTransferStatus::parse(&transfer.status)
        .ok_or_else(|| AppError::Internal(format!("corrupt status: {}", transfer.status)))?;
    if !status.accepts_proof() {
        return Err(AppError::validation("Bank transfer already reviewed"));
    }

    let mut stored_path = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::invalid_args(format!("invalid upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(|f| f.to_string())
            .ok_or_else(|| AppError::invalid_args("file part carries no filename"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::invalid_args(format!("invalid upload: {}", e)))?;

        stored_path = Some(
            store_proof(
                &state.config.upload_dir,
                &filename,
                &bytes,
                state.config.max_proof_bytes,
            )
            .await?,
        );
        break;
    }

    let stored_path =
        stored_path.ok_or_else(|| AppError::invalid_args("file part is required"))?;

    transfers.attach_proof(id, &stored_path).await?;

    AuditLogRepository::new(state.db.clone())
        .record(CreateAuditLog {
            event_type: "proof_submitted".to_string(),
            user_id: Some(user.id),
            details: serde_json::json!({"bank_transfer_id": id, "proof_path": stored_path}),
        })
        .await?;

    info!("User {} submitted proof for transfer {}", user.id, id);
    Ok(Envelope::ok("Done"))
}

/// `GET /payment/banktransfers`
pub async fn list_bank_transfers(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let transfers = BankTransferRepository::new(state.db.clone())
        .list_for_user(user.id)
        .await?;
    Ok(Json(serde_json::json!({"error": 0, "data": transfers})))
}

#[derive(Debug, Deserialize)]
pub struct RaveInitRequest {
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{}", amount as i64)
    } else {
        amount.to_string()
    }
}

/// `POST /payment/rave/initialize`: create a payment row and return the
/// hosted-checkout payload.
pub async fn rave_initialize(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<RaveInitRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !request.amount.is_finite() || request.amount <= 0.0 {
        return Err(AppError::invalid_args("amount must be positive"));
    }
    if request.currency.trim().is_empty() {
        return Err(AppError::invalid_args("currency is required"));
    }

    let txref = state.rave.generate_txref();

    PaymentRepository::new(state.db.clone())
        .create(CreatePayment {
            txref: txref.clone(),
            user_id: user.id,
            amount: request.amount,
            currency: request.currency.trim().to_string(),
        })
        .await?;

    let mut checkout = CheckoutRequest::new(format_amount(request.amount), request.currency.trim())
        .with_customer(
            &user.email,
            request.firstname.as_deref().unwrap_or(""),
            request.lastname.as_deref().unwrap_or(""),
        );
    if let Some(country) = request.country.as_deref() {
        checkout = checkout.with_country(country);
    }
    if let Some(url) = request.redirect_url.as_deref() {
        checkout = checkout.with_redirect_url(url);
    }
    if let Some(description) = request.description.as_deref() {
        checkout = checkout.with_description(description);
    }

    let handler = DbRaveEventHandler::new(state.db.clone(), user.id, txref.clone());
    let payload = state.rave.initialize(&checkout, &txref, &handler).await?;

    Ok(Json(serde_json::json!({
        "error": 0,
        "msg": "Done",
        "txref": txref,
        "payment": payload,
    })))
}

#[derive(Debug, Deserialize)]
pub struct TxrefRequest {
    pub txref: String,
}

/// `POST /payment/rave/requery`: poll the gateway for a decisive status.
pub async fn rave_requery(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<TxrefRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let payment = PaymentRepository::new(state.db.clone())
        .find_by_txref(&request.txref)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("payment {}", request.txref)))?;
    if payment.user_id != user.id {
        return Err(AppError::PermissionDenied);
    }

    let handler = DbRaveEventHandler::new(state.db.clone(), user.id, request.txref.clone());
    let status = state
        .rave
        .requery_transaction(&request.txref, &handler)
        .await?;

    Ok(Json(serde_json::json!({
        "error": 0,
        "msg": "Done",
        "status": status.as_str(),
    })))
}

/// `POST /payment/rave/cancel`
pub async fn rave_cancel(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<TxrefRequest>,
) -> Result<Envelope, AppError> {
    let payment = PaymentRepository::new(state.db.clone())
        .find_by_txref(&request.txref)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("payment {}", request.txref)))?;
    if payment.user_id != user.id {
        return Err(AppError::PermissionDenied);
    }

    let handler = DbRaveEventHandler::new(state.db.clone(), user.id, request.txref.clone());
    state.rave.payment_canceled(&request.txref, &handler).await;

    Ok(Envelope::ok("Done"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount_integral() {
        assert_eq!(format_amount(500.0), "500");
        assert_eq!(format_amount(12.5), "12.5");
    }
}
