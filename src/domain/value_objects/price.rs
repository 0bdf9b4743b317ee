use serde::{Deserialize, Serialize};

/// A non-negative, finite price.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Result<Self, String> {
        if !value.is_finite() {
            return Err("Price must be finite".to_string());
        }
        if value < 0.0 {
            return Err("Price must be non-negative".to_string());
        }
        Ok(Price(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn multiply(&self, factor: f64) -> Result<Price, String> {
        if !factor.is_finite() {
            return Err("Factor must be finite".to_string());
        }
        Price::new(self.0 * factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_new_valid() {
        let price = Price::new(100.0);
        assert!(price.is_ok());
        assert_eq!(price.unwrap().value(), 100.0);
    }

    #[test]
    fn test_price_new_negative() {
        let price = Price::new(-10.0);
        assert!(price.is_err());
        assert_eq!(price.unwrap_err(), "Price must be non-negative");
    }

    #[test]
    fn test_price_new_zero() {
        assert!(Price::new(0.0).is_ok());
    }

    #[test]
    fn test_price_new_nan() {
        assert!(Price::new(f64::NAN).is_err());
    }

    #[test]
    fn test_price_multiply() {
        let price = Price::new(10.0).unwrap();
        let result = price.multiply(2.5).unwrap();
        assert_eq!(result.value(), 25.0);
    }

    #[test]
    fn test_price_multiply_negative_factor() {
        let price = Price::new(10.0).unwrap();
        assert!(price.multiply(-2.0).is_err());
    }
}
