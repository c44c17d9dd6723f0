//! Role agents: supervisor, metadata steward, data calibration, data
//! developer. Each wraps an [`AgentRuntime`](crate::agent::AgentRuntime)
//! with its own system prompt, plan schema, and mock domain tools.

mod calibration;
mod developer;
mod metadata;
mod supervisor;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::{AgentDescriptor, AgentOutcome, AgentRuntime};
use crate::error::Result;
use crate::llm::ChatMessage;

pub use calibration::DataCalibrationAgent;
pub use developer::DataDeveloperAgent;
pub use metadata::MetadataStewardAgent;
pub use supervisor::SupervisorAgent;

pub const SUPERVISOR_ROLE: &str = "supervisor";
pub const METADATA_STEWARD_ROLE: &str = "metadata_steward";
pub const DATA_CALIBRATION_ROLE: &str = "data_calibration";
pub const DATA_DEVELOPER_ROLE: &str = "data_developer";

/// One step of an execution plan, as planned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanStep {
    pub step: u32,
    pub task: String,
    pub assigned_to: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// More orchestration steps are expected; not terminal success.
    InProgress,
    Error,
}

/// Wrapped outcome of one role invocation, as stored in the result map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub role: String,
    pub status: ReportStatus,
    pub outcome: AgentOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Outputs of the role's domain tools, keyed by observation name.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub observations: Map<String, Value>,
}

impl TaskReport {
    /// Wrapping policy: `Failure` becomes an error report carrying the
    /// failure message; every other outcome stays in progress.
    pub fn wrap(role: impl Into<String>, outcome: AgentOutcome) -> Self {
        let error = match &outcome {
            AgentOutcome::Failure { message, .. } => Some(message.clone()),
            _ => None,
        };
        Self {
            role: role.into(),
            status: if error.is_some() {
                ReportStatus::Error
            } else {
                ReportStatus::InProgress
            },
            outcome,
            error,
            observations: Map::new(),
        }
    }

    pub fn with_observation(mut self, key: impl Into<String>, value: Value) -> Self {
        self.observations.insert(key.into(), value);
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == ReportStatus::Error
    }
}

/// A role agent the scheduler can drive.
#[async_trait]
pub trait CrewAgent: Send + Sync {
    fn runtime(&self) -> &AgentRuntime;

    fn role(&self) -> &str {
        self.runtime().role()
    }

    fn descriptor(&self) -> &AgentDescriptor {
        self.runtime().descriptor()
    }

    fn transcript(&self) -> Vec<ChatMessage> {
        self.runtime().messages()
    }

    fn context_snapshot(&self) -> Map<String, Value> {
        self.runtime().context_snapshot()
    }

    async fn process_task(&self, task: &str) -> Result<TaskReport>;
}
