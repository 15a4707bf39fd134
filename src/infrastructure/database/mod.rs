//! `SQLite` adapters for the storage ports

pub mod connection;
pub mod raw_data_repo;
pub mod scope_repo;
pub mod sync_state_repo;
pub mod token_repo;
pub mod utils;

pub use connection::DatabaseConnection;
pub use raw_data_repo::RawDataRepositoryImpl;
pub use scope_repo::ScopeRepositoryImpl;
pub use sync_state_repo::SyncStateRepositoryImpl;
pub use token_repo::TokenRepositoryImpl;
