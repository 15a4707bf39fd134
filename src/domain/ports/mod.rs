//! Port trait definitions (Hexagonal Architecture)
//!
//! Async interfaces implemented by infrastructure adapters:
//! - RawDataStore: raw payload tables
//! - SyncStateRepository: per-collection sync state
//! - TokenStore: durable refreshed tokens
//! - TokenRefresher: refresh endpoint of a provider
//! - ScopeRepository: tool-specific scopes and scope configs
//! - InputIterator: records driving a detail collection

pub mod errors;
pub mod input_iterator;
pub mod raw_data_store;
pub mod scope_repository;
pub mod sync_state_repository;
pub mod token_refresher;
pub mod token_store;

pub use errors::DatabaseError;
pub use input_iterator::InputIterator;
pub use raw_data_store::RawDataStore;
pub use scope_repository::ScopeRepository;
pub use sync_state_repository::SyncStateRepository;
pub use token_refresher::TokenRefresher;
pub use token_store::TokenStore;
