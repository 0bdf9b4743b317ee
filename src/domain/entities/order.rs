use crate::domain::entities::exchange::ExchangeId;
use crate::domain::value_objects::{price::Price, quantity::Quantity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Some(OrderSide::Buy),
            "sell" => Some(OrderSide::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "market" => Some(OrderType::Market),
            "limit" => Some(OrderType::Limit),
            _ => None,
        }
    }
}

/// An order as submitted by a user, before it is persisted.
///
/// Every order is tied to one of the user's trading balances; orders on a
/// practice balance are never forwarded to a live exchange.
#[derive(Debug, Clone)]
pub struct Order {
    pub exchange: ExchangeId,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub price: Option<Price>,
    pub quantity: Quantity,
    pub balance_id: i64,
}

impl Order {
    pub fn new(
        exchange: ExchangeId,
        symbol: String,
        side: OrderSide,
        order_type: OrderType,
        price: Option<f64>,
        quantity: f64,
        balance_id: i64,
    ) -> Result<Self, String> {
        if symbol.trim().is_empty() {
            return Err("Symbol must not be empty".to_string());
        }
        let price = match price {
            Some(p) => Some(Price::new(p)?),
            None => None,
        };
        let quantity = Quantity::new(quantity)?;
        if quantity.value() == 0.0 {
            return Err("Quantity must be positive".to_string());
        }
        if matches!(order_type, OrderType::Limit) && price.is_none() {
            return Err("Limit orders must have a price".to_string());
        }

        Ok(Order {
            exchange,
            symbol,
            side,
            order_type,
            price,
            quantity,
            balance_id,
        })
    }

    pub fn total_value(&self) -> Option<Price> {
        self.price
            .and_then(|p| p.multiply(self.quantity.value()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(
        order_type: OrderType,
        price: Option<f64>,
        quantity: f64,
    ) -> Result<Order, String> {
        Order::new(
            ExchangeId::Exmo,
            "BTC/USD".to_string(),
            OrderSide::Buy,
            order_type,
            price,
            quantity,
            1,
        )
    }

    #[test]
    fn test_market_order_without_price() {
        let o = order(OrderType::Market, None, 1.0).unwrap();
        assert!(o.price.is_none());
        assert_eq!(o.quantity.value(), 1.0);
    }

    #[test]
    fn test_limit_order_with_price() {
        let o = order(OrderType::Limit, Some(2000.0), 0.5).unwrap();
        assert_eq!(o.price.unwrap().value(), 2000.0);
    }

    #[test]
    fn test_limit_order_without_price_rejected() {
        let o = order(OrderType::Limit, None, 1.0);
        assert_eq!(o.unwrap_err(), "Limit orders must have a price");
    }

    #[test]
    fn test_negative_quantity_rejected() {
        assert!(order(OrderType::Market, None, -1.0).is_err());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        assert_eq!(
            order(OrderType::Market, None, 0.0).unwrap_err(),
            "Quantity must be positive"
        );
    }

    #[test]
    fn test_empty_symbol_rejected() {
        let o = Order::new(
            ExchangeId::Kraken,
            "  ".to_string(),
            OrderSide::Sell,
            OrderType::Market,
            None,
            1.0,
            1,
        );
        assert!(o.is_err());
    }

    #[test]
    fn test_total_value() {
        let o = order(OrderType::Limit, Some(50000.0), 0.1).unwrap();
        assert_eq!(o.total_value().unwrap().value(), 5000.0);
    }

    #[test]
    fn test_side_parse() {
        assert_eq!(OrderSide::parse("BUY"), Some(OrderSide::Buy));
        assert_eq!(OrderSide::parse("sell"), Some(OrderSide::Sell));
        assert_eq!(OrderSide::parse("hold"), None);
    }
}
