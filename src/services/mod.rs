//! Collection services
//!
//! - `FetchExecutor`: bounded, throttled request pool writing raw rows
//! - `StatefulCollector` / `FinalizableCollector`: incremental-aware runs
//! - `PipelinePlanBuilder`: blueprint scopes to ordered stages

pub mod collector_args;
pub mod collector_state;
pub mod context;
pub mod fetch_executor;
pub mod finalizable_collector;
pub mod input_iterator;
pub mod plan_builder;
pub mod stage_graph;
pub mod stateful_collector;
pub mod subtask_selection;
pub mod task_options;

pub use collector_args::{
    default_after_response, ignore_status, parse_link_last_page, raw_field,
    total_pages_from_count, ApiCollectorArgs, Pagination, ParsedPage,
};
pub use collector_state::CollectorStateManager;
pub use context::CollectorContext;
pub use fetch_executor::{CollectSummary, FetchExecutor};
pub use finalizable_collector::{
    created_at_field, truncate_at_floor, DetailPhase, FinalizableArgs, FinalizableCollector,
    FinalizableOutcome,
};
pub use input_iterator::{UnfinalizedRecordIterator, VecInputIterator};
pub use plan_builder::{BuiltPlan, PipelinePlanBuilder};
pub use stage_graph::StageGraph;
pub use stateful_collector::{CollectorOutcome, StatefulCollector};
pub use subtask_selection::select_subtasks;
pub use task_options::decode_task_options;
