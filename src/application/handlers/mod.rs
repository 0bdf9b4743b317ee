pub mod admin_handler;
pub mod payment_handler;
pub mod session_handler;
pub mod trade_handler;

use crate::config::AppConfig;
use crate::domain::errors::AppError;

/// Mutating operator actions are rejected while the app runs in demo mode.
pub fn ensure_not_demo(config: &AppConfig) -> Result<(), AppError> {
    if config.demo_mode {
        Err(AppError::DemoMode)
    } else {
        Ok(())
    }
}
