//! Session authentication middleware.
//!
//! Requests to protected routes carry `Authorization: Bearer <token>` where
//! the token is an opaque session id issued at login. The middleware loads
//! the session and its user from the database and attaches a `CurrentUser`
//! extension; expired or unknown tokens are rejected with the standard
//! error envelope.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::application::AppState;
use crate::domain::entities::user::CurrentUser;
use crate::domain::errors::AppError;
use crate::persistence::repository::{SessionRepository, UserRepository};

/// Extract the bearer token from an Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

/// Middleware guarding every route that requires a logged-in user.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok_or(AppError::NotLogged)?;

    let session = SessionRepository::new(state.db.clone())
        .find_valid(token, Utc::now())
        .await?
        .ok_or(AppError::NotLogged)?;

    let user = UserRepository::new(state.db.clone())
        .find_by_id(session.user_id)
        .await?
        .ok_or(AppError::NotLogged)?;

    request.extensions_mut().insert(CurrentUser {
        id: user.id,
        email: user.email,
        is_admin: user.is_admin,
    });

    Ok(next.run(request).await)
}

/// Per-handler admin guard.
pub fn ensure_admin(user: &CurrentUser) -> Result<(), AppError> {
    if user.is_admin {
        Ok(())
    } else {
        tracing::warn!("User {} denied admin action", user.id);
        Err(AppError::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn test_bearer_token_missing() {
        let headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_bearer_token_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_bearer_token_empty() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_ensure_admin() {
        let admin = CurrentUser {
            id: 1,
            email: "a@b.c".to_string(),
            is_admin: true,
        };
        let user = CurrentUser {
            id: 2,
            email: "u@b.c".to_string(),
            is_admin: false,
        };
        assert!(ensure_admin(&admin).is_ok());
        assert!(matches!(
            ensure_admin(&user),
            Err(AppError::PermissionDenied)
        ));
    }
}
