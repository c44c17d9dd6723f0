//! Data calibration: data-administrator role for definitions and semantics.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::agent::{AgentDescriptor, AgentRuntime};
use crate::bus::MessageBus;
use crate::error::Result;
use crate::llm::{LlmBackend, ToolSchema};

use super::{CrewAgent, DATA_CALIBRATION_ROLE, PlanStep, TaskReport};

const SYSTEM_PROMPT: &str = "\
You are an AI Data Administrator (Data Calibration Agent) responsible for:
1. Managing enterprise data definitions
2. Providing quick access to business and technical terms
3. Ensuring consistency in data interpretation
4. Supporting semantic data discovery

Your toolbox includes:
- Semantic Search Tool: find relevant data tables based on descriptions
- Definition Query Tool: retrieve business and technical definitions

Focus on maintaining accurate and consistent data definitions while
supporting business users.";

/// Arguments of the calibrator's planning tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CalibrationPlan {
    pub requirements: Option<String>,
    pub plan: Vec<PlanStep>,
    pub assignments: HashMap<String, Vec<String>>,
    pub reasoning: String,
}

/// Mock calibration tools.
pub mod tools {
    use super::*;

    pub fn semantic_search(_description: &str) -> Value {
        json!([
            {"table": "sales", "relevance": 0.9},
            {"table": "customers", "relevance": 0.8},
        ])
    }

    pub fn query_definition(_field: &str) -> Value {
        json!({
            "business_definition": "Total sales amount excluding tax",
            "technical_definition": "SUM(amount) - SUM(tax_amount)",
        })
    }
}

pub struct DataCalibrationAgent {
    runtime: Arc<AgentRuntime>,
    tools: Vec<ToolSchema>,
}

impl DataCalibrationAgent {
    pub const PLAN_TOOL: &'static str = "create_calibrator_execution_plan";

    pub fn new(bus: Arc<MessageBus>, backend: Arc<dyn LlmBackend>) -> Self {
        let descriptor = AgentDescriptor::new(
            "Data Calibration",
            "Data Administrator",
            DATA_CALIBRATION_ROLE,
        );
        let runtime = AgentRuntime::new(descriptor, SYSTEM_PROMPT, bus, backend);
        let tools = vec![ToolSchema::from_type::<CalibrationPlan>(
            Self::PLAN_TOOL,
            "创建口径查询任务执行计划",
        )];
        Self { runtime, tools }
    }
}

#[async_trait]
impl CrewAgent for DataCalibrationAgent {
    fn runtime(&self) -> &AgentRuntime {
        &self.runtime
    }

    async fn process_task(&self, task: &str) -> Result<TaskReport> {
        let prompt = format!(
            "Given the task: {task}\nPlease analyze this task and create a detailed execution plan with steps and assignments."
        );
        let outcome = self
            .runtime
            .submit(&prompt, &self.tools, Some(Self::PLAN_TOOL))
            .await?;
        Ok(TaskReport::wrap(DATA_CALIBRATION_ROLE, outcome)
            .with_observation("candidate_tables", tools::semantic_search(task))
            .with_observation("definition", tools::query_definition("sales_amount")))
    }
}
