//! Workflow graph, schedulers, and result aggregation.

mod graph;
mod pipeline;
mod results;
mod scheduler;

pub use graph::{WorkflowGraph, WorkflowNode};
pub use pipeline::FixedPipeline;
pub use results::ResultAggregator;
pub use scheduler::{ExecutionRecord, WorkflowScheduler};
