//! Exchange Client Trait
//!
//! Common interface over the per-exchange REST clients. Trading code works
//! against this trait so it never depends on a specific exchange, and tests
//! can substitute a stub client.

use crate::domain::entities::exchange::ExchangeId;
use crate::domain::entities::order::Order;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub type ExchangeResult<T> = Result<T, ExchangeError>;

#[derive(Debug, Error, Clone)]
pub enum ExchangeError {
    #[error("Order placement failed: {0}")]
    OrderPlacementFailed(String),

    #[error("Balance query failed: {0}")]
    BalanceQueryFailed(String),

    #[error("Open orders query failed: {0}")]
    OpenOrdersFailed(String),

    #[error("Ticker query failed: {0}")]
    TickerFailed(String),

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Exchange error: {0}")]
    ExchangeSpecific(String),
}

/// Per-currency balance after reshaping an exchange response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetBalance {
    pub currency: String,
    pub free: f64,
    pub used: f64,
}

/// An order resting on the exchange's book.
#[derive(Debug, Clone, Serialize)]
pub struct OpenOrder {
    pub txid: String,
    pub symbol: String,
    pub side: String,
    pub price: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Ticker {
    pub symbol: String,
    pub last: f64,
}

/// Build the platform's canonical pair representation.
pub fn format_pair(from: &str, to: &str) -> String {
    format!(
        "{}/{}",
        from.to_ascii_uppercase(),
        to.to_ascii_uppercase()
    )
}

/// Reshape a raw balance list for display: drop aggregate pseudo-entries
/// some exchange responses carry alongside real currencies, drop empty
/// rows, and sort the rest by held amount (largest first), then currency.
pub fn format_balances(mut balances: Vec<AssetBalance>) -> Vec<AssetBalance> {
    balances.retain(|b| {
        let key = b.currency.to_ascii_lowercase();
        !matches!(key.as_str(), "info" | "free" | "used" | "total")
    });
    balances.retain(|b| b.free != 0.0 || b.used != 0.0);
    balances.sort_by(|a, b| {
        let ta = a.free + a.used;
        let tb = b.free + b.used;
        tb.partial_cmp(&ta)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.currency.cmp(&b.currency))
    });
    balances
}

/// Common interface for all exchange clients.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Which exchange this client talks to.
    fn id(&self) -> ExchangeId;

    /// Place an order, returning the exchange-assigned order id.
    async fn create_order(&self, order: &Order) -> ExchangeResult<String>;

    /// Fetch all non-zero account balances.
    async fn fetch_balance(&self) -> ExchangeResult<Vec<AssetBalance>>;

    /// Fetch the orders currently resting on the book.
    async fn fetch_open_orders(&self) -> ExchangeResult<Vec<OpenOrder>>;

    /// Fetch the last traded price for a pair.
    async fn fetch_ticker(&self, symbol: &str) -> ExchangeResult<Ticker>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pair() {
        assert_eq!(format_pair("btc", "usd"), "BTC/USD");
        assert_eq!(format_pair("ETH", "eur"), "ETH/EUR");
    }

    #[test]
    fn test_format_balances_drops_aggregates_and_zeroes() {
        let balances = vec![
            AssetBalance {
                currency: "info".to_string(),
                free: 1.0,
                used: 0.0,
            },
            AssetBalance {
                currency: "total".to_string(),
                free: 9.0,
                used: 0.0,
            },
            AssetBalance {
                currency: "DOGE".to_string(),
                free: 0.0,
                used: 0.0,
            },
            AssetBalance {
                currency: "BTC".to_string(),
                free: 0.5,
                used: 0.1,
            },
        ];
        let formatted = format_balances(balances);
        assert_eq!(formatted.len(), 1);
        assert_eq!(formatted[0].currency, "BTC");
    }

    #[test]
    fn test_format_balances_sorted_by_held_amount() {
        let balances = vec![
            AssetBalance {
                currency: "ETH".to_string(),
                free: 1.0,
                used: 0.0,
            },
            AssetBalance {
                currency: "BTC".to_string(),
                free: 2.0,
                used: 1.0,
            },
            AssetBalance {
                currency: "ADA".to_string(),
                free: 1.0,
                used: 0.0,
            },
        ];
        let formatted = format_balances(balances);
        assert_eq!(formatted[0].currency, "BTC");
        // Equal totals tie-break alphabetically.
        assert_eq!(formatted[1].currency, "ADA");
        assert_eq!(formatted[2].currency, "ETH");
    }

    #[test]
    fn test_exchange_error_display() {
        let e = ExchangeError::OrderPlacementFailed("boom".to_string());
        assert_eq!(e.to_string(), "Order placement failed: boom");
    }
}
