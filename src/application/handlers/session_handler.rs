//! Login and logout actions.

use axum::{extract::State, http::HeaderMap, Json};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::application::envelope::Envelope;
use crate::application::AppState;
use crate::auth::bearer_token;
use crate::domain::entities::user::{generate_session_token, verify_password};
use crate::domain::errors::AppError;
use crate::persistence::repository::{SessionRepository, UserRepository};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /session/login`
///
/// Unknown emails and wrong passwords produce the same message.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::invalid_args("email and password are required"));
    }

    let user = UserRepository::new(state.db.clone())
        .find_by_email(request.email.trim())
        .await?;

    let user = match user {
        Some(u) if verify_password(&request.password, &u.password_salt, &u.password_hash) => u,
        _ => {
            warn!("Failed login attempt for {}", request.email.trim());
            return Err(AppError::validation("Invalid email or password"));
        }
    };

    let token = generate_session_token();
    let expires_at = Utc::now() + Duration::seconds(state.config.session_ttl_seconds);
    SessionRepository::new(state.db.clone())
        .create(&token, user.id, expires_at)
        .await?;

    info!("User {} logged in", user.id);

    Ok(Json(serde_json::json!({
        "error": 0,
        "msg": "Done",
        "token": token,
        "user": {
            "email": user.email,
            "is_admin": user.is_admin,
        }
    })))
}

/// `POST /session/logout` (protected)
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Envelope, AppError> {
    let token = bearer_token(&headers).ok_or(AppError::NotLogged)?;
    SessionRepository::new(state.db.clone()).delete(token).await?;
    Ok(Envelope::ok("Done"))
}
