//! Trading balance entity - the account an order draws from.

/// A user's trading balance on the platform.
///
/// `practice` balances exist for paper trading: orders placed against them
/// are recorded locally and never forwarded to an exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingBalance {
    pub id: i64,
    pub user_id: i64,
    pub currency: String,
    /// Funds available for new orders.
    pub available: f64,
    /// Funds locked in open orders or pending operations.
    pub locked: f64,
    pub practice: bool,
}

impl TradingBalance {
    pub fn new(
        id: i64,
        user_id: i64,
        currency: String,
        available: f64,
        locked: f64,
        practice: bool,
    ) -> Result<Self, String> {
        if currency.trim().is_empty() {
            return Err("currency must not be empty".to_string());
        }
        if available < 0.0 {
            return Err("available must be non-negative".to_string());
        }
        if locked < 0.0 {
            return Err("locked must be non-negative".to_string());
        }
        Ok(Self {
            id,
            user_id,
            currency,
            available,
            locked,
            practice,
        })
    }

    pub fn total(&self) -> f64 {
        self.available + self.locked
    }

    pub fn is_practice(&self) -> bool {
        self.practice
    }
}
