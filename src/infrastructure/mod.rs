pub mod exchange_client_factory;
pub mod exmo_client;
pub mod kraken_client;
pub mod okcoin_client;
pub mod rave_client;
