//! Supervisor: project-manager role that plans and routes work.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use serde_json::{Value, json};

use crate::agent::{AgentDescriptor, AgentOutcome, AgentRuntime};
use crate::bus::{Envelope, MessageBus};
use crate::error::Result;
use crate::llm::{LlmBackend, ToolSchema};

use super::{CrewAgent, DATA_CALIBRATION_ROLE, PlanStep, SUPERVISOR_ROLE, TaskReport};

const SYSTEM_PROMPT: &str = "\
You are an AI Project Manager (Supervisor Agent) for a data platform.

Core responsibilities: develop execution plans from user requirements,
assign sub-tasks to specialized agents, validate completion, and synthesize
the sub-task outputs into one deliverable.

Collaborating agents:
- Data Calibration Agent (data administrator): resolves business terminology,
  metric definitions, source tables and fields.
- Metadata Steward Agent (data governance engineer): metadata queries,
  lineage, and compliance audits.
- Data Developer Agent (data engineer): SQL/Python development, testing,
  and result validation.

Route requirements through calibration before development, keep task units
atomic, and preserve the original user request in every task description.
use Chinese to communicate with the agents.";

/// Arguments of the supervisor's planning tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SupervisorPlan {
    pub requirements: Option<String>,
    pub plan: Vec<PlanStep>,
    pub assignments: HashMap<String, Vec<String>>,
    pub reasoning: String,
}

pub struct SupervisorAgent {
    runtime: Arc<AgentRuntime>,
    tools: Vec<ToolSchema>,
}

impl SupervisorAgent {
    pub const PLAN_TOOL: &'static str = "create_supervisor_execution_plan";

    pub fn new(bus: Arc<MessageBus>, backend: Arc<dyn LlmBackend>) -> Self {
        let descriptor = AgentDescriptor::new("Supervisor", "Project Manager", SUPERVISOR_ROLE);
        let runtime = AgentRuntime::new(descriptor, SYSTEM_PROMPT, bus, backend);
        let tools = vec![ToolSchema::from_type::<SupervisorPlan>(
            Self::PLAN_TOOL,
            "创建任务执行计划",
        )];
        Self { runtime, tools }
    }

    /// Extracts calibration-related assignments from a plan outcome and
    /// publishes them on the calibration role topic. Returns the published
    /// envelope, or `None` when the plan assigns nothing to calibration.
    pub async fn dispatch_calibration_assignments(
        &self,
        outcome: &AgentOutcome,
    ) -> Result<Option<Envelope>> {
        let arguments = match outcome {
            AgentOutcome::ToolCall { arguments, .. } => arguments,
            AgentOutcome::ParsedContent { data, .. } => data,
            _ => return Ok(None),
        };
        let Some(assignments) = arguments.get("assignments").and_then(Value::as_object) else {
            return Ok(None);
        };

        let mut briefing = String::new();
        for (assignee, tasks) in assignments {
            if !assignee.to_lowercase().contains("calibrat") {
                continue;
            }
            briefing.push_str(assignee);
            briefing.push_str(":\n");
            if let Some(tasks) = tasks.as_array() {
                for item in tasks.iter().filter_map(Value::as_str) {
                    briefing.push_str("- ");
                    briefing.push_str(item);
                    briefing.push('\n');
                }
            }
        }
        if briefing.is_empty() {
            return Ok(None);
        }

        let message = json!({
            "instruction": "Data Calibration Agent, please process the following assignments and requirements",
            "requirements": arguments.get("requirements").cloned().unwrap_or(Value::Null),
            "assignments": briefing,
        });
        let envelope = self
            .runtime
            .bus()
            .publish(DATA_CALIBRATION_ROLE, message, Some(SUPERVISOR_ROLE))
            .await?;
        Ok(Some(envelope))
    }
}

#[async_trait]
impl CrewAgent for SupervisorAgent {
    fn runtime(&self) -> &AgentRuntime {
        &self.runtime
    }

    async fn process_task(&self, task: &str) -> Result<TaskReport> {
        let prompt = format!(
            "Given the task: {task}\nPlease analyze this task and create a detailed execution plan with steps and execute step by step."
        );
        let outcome = self
            .runtime
            .submit(&prompt, &self.tools, Some(Self::PLAN_TOOL))
            .await?;
        Ok(TaskReport::wrap(SUPERVISOR_ROLE, outcome))
    }
}
