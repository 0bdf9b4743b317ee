pub mod payment_service;
pub mod trading_service;
