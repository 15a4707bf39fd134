//! Infrastructure layer module
//!
//! Adapters for the domain ports and external integrations:
//! - Database implementations (SQLite with sqlx)
//! - HTTP client, rate limiting and token refresh
//! - Configuration management
//! - Logging infrastructure

pub mod config;
pub mod database;
pub mod http;
pub mod logging;
