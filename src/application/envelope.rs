//! The JSON response envelope every action returns.
//!
//! Successes are `{"error": 0, "msg": ...}` (admin mutations also carry a
//! `title`), failures are `{"error": 1, "msg": ...}`. The shape is identical
//! across input, permission, and downstream failures; only the HTTP status
//! differs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::domain::errors::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub error: u8,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Envelope {
    pub fn ok(msg: impl Into<String>) -> Self {
        Self {
            error: 0,
            msg: msg.into(),
            title: None,
        }
    }

    pub fn ok_titled(msg: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            error: 0,
            msg: msg.into(),
            title: Some(title.into()),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            error: 1,
            msg: msg.into(),
            title: None,
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::NotLogged => StatusCode::UNAUTHORIZED,
        AppError::PermissionDenied | AppError::DemoMode => StatusCode::FORBIDDEN,
        AppError::InvalidArgs(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::ExchangeNotEnabled { .. } => StatusCode::BAD_REQUEST,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Exchange(_) | AppError::Payment(_) => StatusCode::BAD_GATEWAY,
        AppError::Database(_)
        | AppError::Crypto(_)
        | AppError::Secret(_)
        | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        (status, Envelope::err(self.to_string())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let env = Envelope::ok("Done");
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json, serde_json::json!({"error": 0, "msg": "Done"}));
    }

    #[test]
    fn test_titled_envelope_shape() {
        let env = Envelope::ok_titled("Done", "Success");
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"error": 0, "msg": "Done", "title": "Success"})
        );
    }

    #[test]
    fn test_error_envelope_shape() {
        let env = Envelope::err("Permission denied");
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"error": 1, "msg": "Permission denied"})
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&AppError::NotLogged), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for(&AppError::PermissionDenied),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&AppError::invalid_args("x")),
            StatusCode::BAD_REQUEST
        );
    }
}
