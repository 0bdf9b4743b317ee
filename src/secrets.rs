//! Secret loading.
//!
//! Sensitive configuration (the storage master key, payment gateway keys)
//! is loaded from the environment into `Zeroizing` buffers so it is wiped
//! from memory on drop, and validated against obviously weak values before
//! the server starts.

use std::env;
use tracing::warn;
use zeroize::Zeroizing;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("Secret validation failed: {0}")]
    ValidationFailed(String),
}

/// Load a secret from an environment variable.
pub fn load_env_secret(env_var_name: &str) -> Result<Zeroizing<String>, SecretError> {
    let value = env::var(env_var_name)
        .map(|s| s.trim().to_string())
        .map_err(|_| SecretError::EnvVarNotSet(env_var_name.to_string()))?;
    if value.is_empty() {
        return Err(SecretError::EnvVarNotSet(env_var_name.to_string()));
    }
    Ok(Zeroizing::new(value))
}

/// Validate that a secret meets minimum requirements.
pub fn validate_secret_strength(secret: &str, min_length: usize) -> Result<(), SecretError> {
    if secret.len() < min_length {
        return Err(SecretError::ValidationFailed(format!(
            "Secret too short: {} characters (minimum: {})",
            secret.len(),
            min_length
        )));
    }

    let weak_patterns = ["test", "demo", "example", "placeholder", "changeme", "12345"];
    let secret_lower = secret.to_lowercase();
    for pattern in &weak_patterns {
        if secret_lower.contains(pattern) {
            return Err(SecretError::ValidationFailed(format!(
                "Secret contains weak pattern: {}",
                pattern
            )));
        }
    }

    Ok(())
}

/// Load the storage master key (32 characters minimum).
pub fn load_master_key(env_var_name: &str) -> Result<Zeroizing<String>, SecretError> {
    let secret = load_env_secret(env_var_name)?;
    validate_secret_strength(&secret, 32)?;
    Ok(secret)
}

/// Load a gateway secret; length is dictated by the provider, so only warn
/// on short values instead of refusing to start.
pub fn load_gateway_secret(env_var_name: &str) -> Result<Zeroizing<String>, SecretError> {
    let secret = load_env_secret(env_var_name)?;
    if secret.len() < 16 {
        warn!(
            "Secret {} is unusually short ({} characters)",
            env_var_name,
            secret.len()
        );
    }
    Ok(secret)
}
