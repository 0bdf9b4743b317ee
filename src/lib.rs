//! Krypto back-office library
//!
//! Core components of the Krypto trading platform back office: session
//! handling, admin actions, exchange clients, payment gateways, and the
//! persistence layer.

pub mod application;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
pub mod rate_limit;
pub mod secrets;
