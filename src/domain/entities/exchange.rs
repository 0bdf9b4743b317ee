use serde::{Deserialize, Serialize};

/// The exchanges users can trade through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Exmo,
    Okcoin,
    Kraken,
}

impl ExchangeId {
    /// Stable lowercase identifier, used in the database and in URLs.
    pub fn name(&self) -> &'static str {
        match self {
            ExchangeId::Exmo => "exmo",
            ExchangeId::Okcoin => "okcoin",
            ExchangeId::Kraken => "kraken",
        }
    }

    /// Human-facing name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ExchangeId::Exmo => "Exmo",
            ExchangeId::Okcoin => "OKCoin",
            ExchangeId::Kraken => "Kraken",
        }
    }

    /// Logo asset served by the front-end.
    pub fn logo(&self) -> &'static str {
        match self {
            ExchangeId::Exmo => "exmo.png",
            ExchangeId::Okcoin => "okcoin.svg",
            ExchangeId::Kraken => "kraken.png",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "exmo" => Some(ExchangeId::Exmo),
            "okcoin" => Some(ExchangeId::Okcoin),
            "kraken" => Some(ExchangeId::Kraken),
            _ => None,
        }
    }

    pub fn all() -> [ExchangeId; 3] {
        [ExchangeId::Exmo, ExchangeId::Okcoin, ExchangeId::Kraken]
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_name() {
        assert_eq!(ExchangeId::Exmo.name(), "exmo");
        assert_eq!(ExchangeId::Okcoin.name(), "okcoin");
        assert_eq!(ExchangeId::Kraken.name(), "kraken");
    }

    #[test]
    fn test_exchange_display_name() {
        assert_eq!(ExchangeId::Okcoin.display_name(), "OKCoin");
    }

    #[test]
    fn test_exchange_parse() {
        assert_eq!(ExchangeId::parse("exmo"), Some(ExchangeId::Exmo));
        assert_eq!(ExchangeId::parse("KRAKEN"), Some(ExchangeId::Kraken));
        assert_eq!(ExchangeId::parse("binance"), None);
    }

    #[test]
    fn test_exchange_roundtrip() {
        for ex in ExchangeId::all() {
            assert_eq!(ExchangeId::parse(ex.name()), Some(ex));
        }
    }
}
