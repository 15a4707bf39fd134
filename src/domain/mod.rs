//! Domain layer for the silt collection engine
//!
//! Models, port traits and errors shared by infrastructure and services.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{CollectorError, CollectorResult};
