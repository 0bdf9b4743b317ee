//! Application configuration, loaded from the environment.

use std::net::SocketAddr;
use zeroize::Zeroizing;

use crate::secrets::{self, SecretError};

/// Rave hosted-checkout environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaveEnv {
    Staging,
    Live,
}

impl RaveEnv {
    pub fn base_url(&self) -> &'static str {
        match self {
            RaveEnv::Staging => "https://rave-api-v2.herokuapp.com",
            RaveEnv::Live => "https://api.ravepay.co",
        }
    }

    /// Unknown values fall back to staging, never to live.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "live" => RaveEnv::Live,
            _ => RaveEnv::Staging,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RaveConfig {
    pub public_key: String,
    pub secret_key: Zeroizing<String>,
    pub env: RaveEnv,
    pub txref_prefix: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    /// While in demo mode every mutating admin action is rejected.
    pub demo_mode: bool,
    pub upload_dir: String,
    pub max_proof_bytes: usize,
    pub rate_limit_per_minute: u32,
    pub session_ttl_seconds: i64,
    pub master_key: Zeroizing<String>,
    pub rave: RaveConfig,
}

impl AppConfig {
    /// Load configuration from environment variables. Invalid values are
    /// logged and replaced with the default rather than aborting startup;
    /// missing secrets abort.
    pub fn from_env() -> Result<Self, SecretError> {
        let bind_addr = parse_env("KRYPTO_BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)));
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://data/krypto.db".to_string());
        let demo_mode = flag_env("KRYPTO_DEMO_MODE", false);
        let upload_dir =
            std::env::var("KRYPTO_UPLOAD_DIR").unwrap_or_else(|_| "data/proofs".to_string());
        let max_proof_bytes = parse_env("KRYPTO_MAX_PROOF_BYTES", 5 * 1024 * 1024usize);
        let rate_limit_per_minute = parse_bounded_env("RATE_LIMIT_PER_MINUTE", 100u32, 1, 10_000);
        let session_ttl_seconds =
            parse_bounded_env("SESSION_TTL_SECONDS", 86_400i64, 60, 30 * 86_400);

        let master_key = secrets::load_master_key("KRYPTO_ENCRYPTION_KEY")?;

        let rave = RaveConfig {
            public_key: std::env::var("RAVE_PUBLIC_KEY").unwrap_or_default(),
            secret_key: secrets::load_gateway_secret("RAVE_SECRET_KEY")?,
            env: RaveEnv::parse(
                &std::env::var("RAVE_ENV").unwrap_or_else(|_| "staging".to_string()),
            ),
            txref_prefix: std::env::var("RAVE_TXREF_PREFIX")
                .unwrap_or_else(|_| "KRYPTO".to_string()),
        };

        Ok(Self {
            bind_addr,
            database_url,
            demo_mode,
            upload_dir,
            max_proof_bytes,
            rate_limit_per_minute,
            session_ttl_seconds,
            master_key,
            rave,
        })
    }
}

fn parse_env<T: std::str::FromStr + std::fmt::Display + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(
                    "Failed to parse {} '{}', using default: {}",
                    name,
                    raw,
                    default
                );
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_bounded_env<T>(name: &str, default: T, min: T, max: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy + PartialOrd,
{
    let value = parse_env(name, default);
    if value < min || value > max {
        tracing::warn!(
            "{} value {} out of range [{}, {}], using default: {}",
            name,
            value,
            min,
            max,
            default
        );
        default
    } else {
        value
    }
}

fn flag_env(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => raw == "1" || raw.eq_ignore_ascii_case("true"),
        Err(_) => default,
    }
}
