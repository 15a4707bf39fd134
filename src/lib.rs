//! Silt - incremental collection engine for third-party activity APIs
//!
//! Silt pages through rate-limited REST APIs, stores raw payloads per
//! collection, decides between full and incremental runs from persisted sync
//! state, re-polls records that are not finalized yet, and assembles
//! per-scope tasks into ordered pipeline stages.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): fetch executor, collectors, plan builder
//! - **Infrastructure Layer** (`infrastructure`): SQLite, HTTP, config, logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use silt::services::{ApiCollectorArgs, ParsedPage, StatefulCollector};
//!
//! let args = ApiCollectorArgs::new(params, "repos/{params.name}/actions/runs", |r| {
//!     ParsedPage::from_field(r, "workflow_runs")
//! })
//! .undetermined(5);
//! let outcome = StatefulCollector::new(ctx).collect(&args, Some(&policy), None).await?;
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    CollectionParams, Config, PipelinePlan, PipelineTask, SyncPolicy, SyncState, TaskOptions,
};
pub use domain::{CollectorError, CollectorResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    ApiCollectorArgs, CollectorContext, FetchExecutor, FinalizableCollector, PipelinePlanBuilder,
    StatefulCollector,
};
