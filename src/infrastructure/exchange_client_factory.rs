//! Exchange Client Factory
//!
//! Builds an exchange client from a user's decrypted credentials. Clients
//! are cheap to construct and hold no connection state, so one is built per
//! request and dropped with the decrypted keys.

use crate::domain::entities::exchange::ExchangeId;
use crate::domain::repositories::exchange_client::{
    ExchangeClient, ExchangeError, ExchangeResult,
};
use crate::infrastructure::exmo_client::ExmoClient;
use crate::infrastructure::kraken_client::KrakenClient;
use crate::infrastructure::okcoin_client::OkcoinClient;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Credentials after decryption, wiped from memory on drop.
pub struct DecryptedCredentials {
    pub api_key: Zeroizing<String>,
    pub api_secret: Zeroizing<String>,
    pub passphrase: Option<Zeroizing<String>>,
}

pub struct ExchangeClientFactory;

impl ExchangeClientFactory {
    pub fn create(
        exchange: ExchangeId,
        credentials: &DecryptedCredentials,
    ) -> ExchangeResult<Arc<dyn ExchangeClient>> {
        match exchange {
            ExchangeId::Exmo => {
                let client =
                    ExmoClient::new(&credentials.api_key, &credentials.api_secret)?;
                Ok(Arc::new(client))
            }
            ExchangeId::Okcoin => {
                let passphrase = credentials.passphrase.as_deref().ok_or_else(|| {
                    ExchangeError::AuthenticationError(
                        "OKCoin requires an API passphrase".to_string(),
                    )
                })?;
                let client = OkcoinClient::new(
                    &credentials.api_key,
                    &credentials.api_secret,
                    passphrase,
                )?;
                Ok(Arc::new(client))
            }
            ExchangeId::Kraken => {
                let client =
                    KrakenClient::new(&credentials.api_key, &credentials.api_secret)?;
                Ok(Arc::new(client))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    fn creds(passphrase: Option<&str>) -> DecryptedCredentials {
        DecryptedCredentials {
            api_key: Zeroizing::new("key".to_string()),
            api_secret: Zeroizing::new(STANDARD.encode(b"secret")),
            passphrase: passphrase.map(|p| Zeroizing::new(p.to_string())),
        }
    }

    #[test]
    fn test_create_exmo() {
        let client = ExchangeClientFactory::create(ExchangeId::Exmo, &creds(None)).unwrap();
        assert_eq!(client.id(), ExchangeId::Exmo);
    }

    #[test]
    fn test_create_kraken_requires_base64_secret() {
        let client = ExchangeClientFactory::create(ExchangeId::Kraken, &creds(None)).unwrap();
        assert_eq!(client.id(), ExchangeId::Kraken);

        let bad = DecryptedCredentials {
            api_key: Zeroizing::new("key".to_string()),
            api_secret: Zeroizing::new("not base64 !!!".to_string()),
            passphrase: None,
        };
        assert!(ExchangeClientFactory::create(ExchangeId::Kraken, &bad).is_err());
    }

    #[test]
    fn test_create_okcoin_needs_passphrase() {
        assert!(ExchangeClientFactory::create(ExchangeId::Okcoin, &creds(None)).is_err());
        let client =
            ExchangeClientFactory::create(ExchangeId::Okcoin, &creds(Some("phrase"))).unwrap();
        assert_eq!(client.id(), ExchangeId::Okcoin);
    }
}
