pub mod envelope;
pub mod handlers;
pub mod services;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::crypto::StorageCipher;
use crate::infrastructure::rave_client::RaveClient;
use crate::persistence::DbPool;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<AppConfig>,
    pub cipher: Arc<StorageCipher>,
    pub rave: Arc<RaveClient>,
}
