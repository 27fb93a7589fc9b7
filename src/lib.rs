pub mod auth;
pub mod chat;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod openapi;
pub mod rate_limit;
pub mod repo;
pub mod routes;
pub mod security;
pub mod streak;
pub mod telemetry;

// Re-export commonly used items for tests / external users
pub use routes::{config as configure, AppState};
pub use security::SecurityHeaders;
