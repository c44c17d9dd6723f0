pub mod agent;
pub mod bus;
pub mod config;
pub mod crew;
pub mod error;
pub mod llm;
pub mod system;
pub mod workflow;

pub use agent::{AgentDescriptor, AgentOutcome, AgentRuntime, OutcomeSource};
pub use bus::{Envelope, MessageBus, Subscriber};
pub use config::{CrewConfig, LlmConfig};
pub use crew::{
    CrewAgent, DataCalibrationAgent, DataDeveloperAgent, MetadataStewardAgent, ReportStatus,
    SupervisorAgent, TaskReport,
};
pub use error::{CrewError, Result};
pub use llm::{BackendResponse, ChatMessage, DeepSeekBackend, LlmBackend, ToolSchema};
pub use system::{AgentSystem, default_workflow};
pub use workflow::{
    ExecutionRecord, FixedPipeline, ResultAggregator, WorkflowGraph, WorkflowNode,
    WorkflowScheduler,
};
