pub mod config;
pub mod params;
pub mod plan;
pub mod raw_record;
pub mod request;
pub mod scope;
pub mod sync_state;
pub mod token;

pub use config::{
    CollectorConfig, Config, DatabaseConfig, HttpConfig, LogFormat, LoggingConfig,
    RateLimitConfig, RotationPolicy, TokenConfig,
};
pub use params::CollectionParams;
pub use plan::{
    domain_type, generate_domain_id, CollectOptions, DiffOptions, ExtractOptions, PipelinePlan,
    PipelineStage, PipelineTask, SubtaskMeta, TaskOptions,
};
pub use raw_record::{RawMessage, RawRecord, WriteMode};
pub use request::{Pager, RequestData};
pub use scope::{BlueprintScope, DomainScope, DomainScopeKind, ScopeConfig, ScopeRecord};
pub use sync_state::{RunPlan, SyncMode, SyncPolicy, SyncState};
pub use token::{RefreshedToken, TokenState};
