use serde::{Deserialize, Serialize};

/// A non-negative, finite order quantity.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(f64);

impl Quantity {
    pub fn new(value: f64) -> Result<Self, String> {
        if !value.is_finite() {
            return Err("Quantity must be finite".to_string());
        }
        if value < 0.0 {
            return Err("Quantity must be non-negative".to_string());
        }
        Ok(Quantity(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn subtract(&self, other: Quantity) -> Result<Quantity, String> {
        Quantity::new(self.0 - other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_new_valid() {
        let qty = Quantity::new(100.0);
        assert!(qty.is_ok());
        assert_eq!(qty.unwrap().value(), 100.0);
    }

    #[test]
    fn test_quantity_new_negative() {
        let qty = Quantity::new(-5.0);
        assert!(qty.is_err());
        assert_eq!(qty.unwrap_err(), "Quantity must be non-negative");
    }

    #[test]
    fn test_quantity_subtract_insufficient() {
        let q1 = Quantity::new(5.0).unwrap();
        let q2 = Quantity::new(10.0).unwrap();
        assert!(q1.subtract(q2).is_err());
    }

    #[test]
    fn test_quantity_subtract_valid() {
        let q1 = Quantity::new(10.0).unwrap();
        let q2 = Quantity::new(3.0).unwrap();
        assert_eq!(q1.subtract(q2).unwrap().value(), 7.0);
    }
}
