//! Wires the bus, the four role agents, and both execution strategies.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::bus::MessageBus;
use crate::crew::{
    CrewAgent, DATA_CALIBRATION_ROLE, DATA_DEVELOPER_ROLE, DataCalibrationAgent,
    DataDeveloperAgent, METADATA_STEWARD_ROLE, MetadataStewardAgent, SUPERVISOR_ROLE,
    SupervisorAgent, TaskReport,
};
use crate::error::Result;
use crate::llm::LlmBackend;
use crate::workflow::{
    FixedPipeline, ResultAggregator, WorkflowGraph, WorkflowNode, WorkflowScheduler,
};

/// Default crew workflow: supervisor fans out to the steward and the
/// calibrator, both of which gate the developer.
pub fn default_workflow() -> WorkflowGraph {
    WorkflowGraph::with_nodes([
        WorkflowNode::new(
            SUPERVISOR_ROLE,
            &[METADATA_STEWARD_ROLE, DATA_CALIBRATION_ROLE],
            &[],
        ),
        WorkflowNode::new(METADATA_STEWARD_ROLE, &[DATA_DEVELOPER_ROLE], &[SUPERVISOR_ROLE]),
        WorkflowNode::new(DATA_CALIBRATION_ROLE, &[DATA_DEVELOPER_ROLE], &[SUPERVISOR_ROLE]),
        WorkflowNode::new(
            DATA_DEVELOPER_ROLE,
            &[],
            &[METADATA_STEWARD_ROLE, DATA_CALIBRATION_ROLE],
        ),
    ])
}

pub struct AgentSystem {
    bus: Arc<MessageBus>,
    agents: HashMap<String, Arc<dyn CrewAgent>>,
    scheduler: WorkflowScheduler,
    pipeline: FixedPipeline,
    aggregator: Arc<ResultAggregator>,
}

impl AgentSystem {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Result<Self> {
        let bus = Arc::new(MessageBus::new());

        let supervisor: Arc<dyn CrewAgent> =
            Arc::new(SupervisorAgent::new(bus.clone(), backend.clone()));
        let steward: Arc<dyn CrewAgent> =
            Arc::new(MetadataStewardAgent::new(bus.clone(), backend.clone()));
        let calibration: Arc<dyn CrewAgent> =
            Arc::new(DataCalibrationAgent::new(bus.clone(), backend.clone()));
        let developer: Arc<dyn CrewAgent> =
            Arc::new(DataDeveloperAgent::new(bus.clone(), backend));

        let pipeline = FixedPipeline::new(
            supervisor.clone(),
            vec![steward.clone(), calibration.clone()],
            developer.clone(),
        );
        let scheduler = WorkflowScheduler::new(
            default_workflow(),
            vec![
                supervisor.clone(),
                steward.clone(),
                calibration.clone(),
                developer.clone(),
            ],
        )?;

        let agents: HashMap<String, Arc<dyn CrewAgent>> =
            [supervisor, steward, calibration, developer]
                .into_iter()
                .map(|agent| (agent.role().to_string(), agent))
                .collect();

        Ok(Self {
            bus,
            agents,
            scheduler,
            pipeline,
            aggregator: Arc::new(ResultAggregator::new()),
        })
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn aggregator(&self) -> &Arc<ResultAggregator> {
        &self.aggregator
    }

    pub fn agent_by_role(&self, role: &str) -> Option<&Arc<dyn CrewAgent>> {
        self.agents.get(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }

    /// Fixed-pipeline strategy.
    pub async fn process_task(&self, task: &str) -> Result<HashMap<String, TaskReport>> {
        info!(task, "Running fixed pipeline");
        let results = self.pipeline.run(task).await?;
        self.aggregator.extend(results.values().cloned());
        Ok(results)
    }

    /// Dynamic dependency-graph strategy, rooted at the supervisor.
    pub async fn execute_workflow(&self, task: &str) -> Result<HashMap<String, TaskReport>> {
        info!(task, "Running dynamic workflow");
        let record = self.scheduler.run(SUPERVISOR_ROLE, task).await?;
        let results = record.into_results();
        self.aggregator.extend(results.values().cloned());
        Ok(results)
    }
}
