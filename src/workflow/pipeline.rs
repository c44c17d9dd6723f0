//! Fixed three-stage pipeline: one opening role, a concurrent middle stage,
//! one closing role. No graph traversal; kept alongside the dynamic walk as
//! the simpler entry point.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::info;

use crate::crew::{CrewAgent, TaskReport};
use crate::error::Result;

pub struct FixedPipeline {
    first: Arc<dyn CrewAgent>,
    middle: Vec<Arc<dyn CrewAgent>>,
    last: Arc<dyn CrewAgent>,
}

impl FixedPipeline {
    pub fn new(
        first: Arc<dyn CrewAgent>,
        middle: Vec<Arc<dyn CrewAgent>>,
        last: Arc<dyn CrewAgent>,
    ) -> Self {
        Self {
            first,
            middle,
            last,
        }
    }

    /// Run first, then all middle roles concurrently (fork-join barrier),
    /// then last.
    pub async fn run(&self, task: &str) -> Result<HashMap<String, TaskReport>> {
        let mut results = HashMap::new();

        info!(role = %self.first.role(), "Pipeline stage 1");
        let report = self.first.process_task(task).await?;
        results.insert(report.role.clone(), report);

        info!(roles = self.middle.len(), "Pipeline stage 2 (concurrent)");
        let reports =
            try_join_all(self.middle.iter().map(|agent| agent.process_task(task))).await?;
        for report in reports {
            results.insert(report.role.clone(), report);
        }

        info!(role = %self.last.role(), "Pipeline stage 3");
        let report = self.last.process_task(task).await?;
        results.insert(report.role.clone(), report);

        Ok(results)
    }
}
