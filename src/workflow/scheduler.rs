//! Dependency-driven workflow execution.
//!
//! The dynamic walk is a Kahn-style topological run: every reachable role
//! carries a counter of unresolved predecessors, and a role is spawned
//! exactly once, when its counter reaches zero. The single scheduler loop is
//! the only reader/writer of the per-run state, so the "all predecessors
//! done" check and the "mark executed and run" step form one atomic step,
//! and concurrent completions can neither double-run nor starve a node.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::crew::{CrewAgent, TaskReport};
use crate::error::{CrewError, Result};

use super::graph::WorkflowGraph;

/// Per-run execution state. A role enters `executed` at most once.
#[derive(Debug, Default)]
pub struct ExecutionRecord {
    executed: HashSet<String>,
    results: HashMap<String, TaskReport>,
}

impl ExecutionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the role was already executed.
    pub fn mark_executed(&mut self, role: &str) -> bool {
        self.executed.insert(role.to_string())
    }

    pub fn is_executed(&self, role: &str) -> bool {
        self.executed.contains(role)
    }

    pub fn record(&mut self, report: TaskReport) {
        self.results.insert(report.role.clone(), report);
    }

    pub fn executed(&self) -> &HashSet<String> {
        &self.executed
    }

    pub fn results(&self) -> &HashMap<String, TaskReport> {
        &self.results
    }

    pub fn into_results(self) -> HashMap<String, TaskReport> {
        self.results
    }
}

pub struct WorkflowScheduler {
    graph: WorkflowGraph,
    agents: HashMap<String, Arc<dyn CrewAgent>>,
}

impl WorkflowScheduler {
    /// Validates the graph and checks every role has an agent.
    pub fn new(graph: WorkflowGraph, agents: Vec<Arc<dyn CrewAgent>>) -> Result<Self> {
        graph.validate()?;
        let agents: HashMap<String, Arc<dyn CrewAgent>> = agents
            .into_iter()
            .map(|agent| (agent.role().to_string(), agent))
            .collect();
        for role in graph.roles() {
            if !agents.contains_key(role) {
                return Err(CrewError::UnknownRole(role.to_string()));
            }
        }
        Ok(Self { graph, agents })
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    /// Run the dynamic walk from `root` with a fresh record.
    pub async fn run(&self, root: &str, task: &str) -> Result<ExecutionRecord> {
        self.resume(ExecutionRecord::new(), root, task).await
    }

    /// Run the dynamic walk, skipping roles the record already marks as
    /// executed: no new backend call, no re-published result.
    pub async fn resume(
        &self,
        mut record: ExecutionRecord,
        root: &str,
        task: &str,
    ) -> Result<ExecutionRecord> {
        let reachable = self.graph.reachable_from(root)?;

        // Unresolved-predecessor counters; only execution resolves a
        // dependency. A predecessor outside this walk keeps its successors
        // gated until some later resume records it.
        let mut remaining: HashMap<String, usize> = HashMap::new();
        for role in &reachable {
            if record.is_executed(role) {
                debug!(role = %role, "Already executed, skipping");
                continue;
            }
            let node = self
                .graph
                .node(role)
                .ok_or_else(|| CrewError::UnknownRole(role.clone()))?;
            let unresolved = node
                .wait_for
                .iter()
                .filter(|dep| !record.is_executed(dep))
                .count();
            remaining.insert(role.clone(), unresolved);
        }

        let mut tasks: JoinSet<(String, Result<TaskReport>)> = JoinSet::new();
        let ready: Vec<String> = remaining
            .iter()
            .filter(|(_, unresolved)| **unresolved == 0)
            .map(|(role, _)| role.clone())
            .collect();
        for role in ready {
            remaining.remove(&role);
            self.spawn_role(&mut tasks, &role, task)?;
        }

        while let Some(joined) = tasks.join_next().await {
            let (role, report) = joined
                .map_err(|e| CrewError::Workflow(format!("Agent task aborted: {e}")))?;
            let report = report?;

            if !record.mark_executed(&role) {
                warn!(role = %role, "Completion for an already-executed role, dropping");
                continue;
            }
            info!(role = %role, status = ?report.status, "Role completed");
            record.record(report);

            let successors = self
                .graph
                .node(&role)
                .map(|node| node.next.clone())
                .unwrap_or_default();
            for next in successors {
                let Some(unresolved) = remaining.get_mut(&next) else {
                    continue;
                };
                *unresolved = unresolved.saturating_sub(1);
                if *unresolved == 0 {
                    remaining.remove(&next);
                    self.spawn_role(&mut tasks, &next, task)?;
                }
            }
        }

        for (role, unresolved) in &remaining {
            warn!(role = %role, unresolved, "Never became ready, not executed");
        }
        Ok(record)
    }

    fn spawn_role(
        &self,
        tasks: &mut JoinSet<(String, Result<TaskReport>)>,
        role: &str,
        task: &str,
    ) -> Result<()> {
        let agent = self
            .agents
            .get(role)
            .cloned()
            .ok_or_else(|| CrewError::UnknownRole(role.to_string()))?;
        let role = role.to_string();
        let task = task.to_string();
        debug!(role = %role, "Dependencies satisfied, spawning");
        tasks.spawn(async move {
            let report = agent.process_task(&task).await;
            (role, report)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::agent::{AgentDescriptor, AgentOutcome, AgentRuntime, OutcomeSource};
    use crate::bus::MessageBus;
    use crate::crew::ReportStatus;
    use crate::llm::{BackendResponse, ChatMessage, LlmBackend, ToolSchema};
    use crate::workflow::graph::WorkflowNode;

    use super::*;

    struct NullBackend;

    #[async_trait]
    impl LlmBackend for NullBackend {
        async fn generate(&self, _s: &str, _h: &[ChatMessage]) -> Result<String> {
            Ok(String::new())
        }
        async fn tool_call(
            &self,
            _s: &str,
            _h: &[ChatMessage],
            _t: &[ToolSchema],
            _f: Option<&str>,
        ) -> Result<BackendResponse> {
            Ok(BackendResponse::default())
        }
    }

    /// Agent that records invocation counts and order instead of planning.
    struct RecordingAgent {
        runtime: Arc<AgentRuntime>,
        invocations: Arc<AtomicUsize>,
        order: Arc<Mutex<Vec<String>>>,
        delay_ms: u64,
    }

    impl RecordingAgent {
        fn new(
            role: &str,
            bus: &Arc<MessageBus>,
            order: Arc<Mutex<Vec<String>>>,
            delay_ms: u64,
        ) -> Arc<Self> {
            let descriptor = AgentDescriptor::new(role, "recorder", role);
            let runtime =
                AgentRuntime::new(descriptor, "recorder", bus.clone(), Arc::new(NullBackend));
            Arc::new(Self {
                runtime,
                invocations: Arc::new(AtomicUsize::new(0)),
                order,
                delay_ms,
            })
        }
    }

    #[async_trait]
    impl CrewAgent for RecordingAgent {
        fn runtime(&self) -> &AgentRuntime {
            &self.runtime
        }

        async fn process_task(&self, _task: &str) -> Result<TaskReport> {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            self.invocations.fetch_add(1, Ordering::SeqCst);
            self.order.lock().push(self.role().to_string());
            Ok(TaskReport::wrap(
                self.role(),
                AgentOutcome::RawText {
                    text: "done".into(),
                    source: OutcomeSource::ContentText,
                },
            ))
        }
    }

    fn diamond() -> WorkflowGraph {
        WorkflowGraph::with_nodes([
            WorkflowNode::new("a", &["b", "c"], &[]),
            WorkflowNode::new("b", &["d"], &["a"]),
            WorkflowNode::new("c", &["d"], &["a"]),
            WorkflowNode::new("d", &[], &["b", "c"]),
        ])
    }

    fn recorders(
        bus: &Arc<MessageBus>,
        delays: &[(&str, u64)],
    ) -> (Vec<Arc<RecordingAgent>>, Arc<Mutex<Vec<String>>>) {
        let order = Arc::new(Mutex::new(Vec::new()));
        let agents = delays
            .iter()
            .map(|(role, delay)| RecordingAgent::new(role, bus, order.clone(), *delay))
            .collect();
        (agents, order)
    }

    fn as_crew(agents: &[Arc<RecordingAgent>]) -> Vec<Arc<dyn CrewAgent>> {
        agents
            .iter()
            .map(|a| a.clone() as Arc<dyn CrewAgent>)
            .collect()
    }

    #[tokio::test]
    async fn diamond_runs_every_role_exactly_once() {
        let bus = Arc::new(MessageBus::new());
        // b slow, c fast: d must wait for both and run once
        let (agents, order) = recorders(&bus, &[("a", 0), ("b", 30), ("c", 1), ("d", 0)]);
        let scheduler = WorkflowScheduler::new(diamond(), as_crew(&agents)).unwrap();

        let record = scheduler.run("a", "t").await.unwrap();

        assert_eq!(record.executed().len(), 4);
        for agent in &agents {
            assert_eq!(agent.invocations.load(Ordering::SeqCst), 1, "{}", agent.role());
        }
        let order = order.lock();
        assert_eq!(order[0], "a");
        assert_eq!(order[3], "d");
        assert_eq!(record.results().len(), 4);
    }

    #[tokio::test]
    async fn middle_roles_run_concurrently() {
        let bus = Arc::new(MessageBus::new());
        let (agents, _) = recorders(&bus, &[("a", 0), ("b", 50), ("c", 50), ("d", 0)]);
        let scheduler = WorkflowScheduler::new(diamond(), as_crew(&agents)).unwrap();

        let started = std::time::Instant::now();
        scheduler.run("a", "t").await.unwrap();
        // sequential b and c would take >= 100ms
        assert!(started.elapsed() < Duration::from_millis(95));
    }

    #[tokio::test]
    async fn resume_skips_executed_roles() {
        let bus = Arc::new(MessageBus::new());
        let (agents, _) = recorders(&bus, &[("a", 0), ("b", 0), ("c", 0), ("d", 0)]);
        let scheduler = WorkflowScheduler::new(diamond(), as_crew(&agents)).unwrap();

        let record = scheduler.run("a", "t").await.unwrap();
        let published = bus.history(Some("a_result")).len();

        let record = scheduler.resume(record, "a", "t").await.unwrap();
        assert_eq!(record.executed().len(), 4);
        for agent in &agents {
            assert_eq!(agent.invocations.load(Ordering::SeqCst), 1);
        }
        // nothing was re-published either
        assert_eq!(bus.history(Some("a_result")).len(), published);
    }

    #[tokio::test]
    async fn resume_continues_a_partial_record() {
        let bus = Arc::new(MessageBus::new());
        let (agents, _) = recorders(&bus, &[("a", 0), ("b", 0), ("c", 0), ("d", 0)]);
        let scheduler = WorkflowScheduler::new(diamond(), as_crew(&agents)).unwrap();

        let mut partial = ExecutionRecord::new();
        partial.mark_executed("a");
        let record = scheduler.resume(partial, "a", "t").await.unwrap();

        assert_eq!(agents[0].invocations.load(Ordering::SeqCst), 0);
        assert!(record.is_executed("d"));
        assert_eq!(record.results().len(), 3);
    }

    #[tokio::test]
    async fn predecessor_outside_the_walk_still_gates_execution() {
        let bus = Arc::new(MessageBus::new());
        let (agents, _) = recorders(&bus, &[("a", 0), ("x", 0), ("b", 0)]);
        // b waits for both a and x, but x is not reachable from a
        let graph = WorkflowGraph::with_nodes([
            WorkflowNode::new("a", &["b"], &[]),
            WorkflowNode::new("x", &["b"], &[]),
            WorkflowNode::new("b", &[], &["a", "x"]),
        ]);
        let scheduler = WorkflowScheduler::new(graph, as_crew(&agents)).unwrap();

        let record = scheduler.run("a", "t").await.unwrap();

        assert_eq!(agents[0].invocations.load(Ordering::SeqCst), 1);
        assert_eq!(agents[1].invocations.load(Ordering::SeqCst), 0);
        assert_eq!(agents[2].invocations.load(Ordering::SeqCst), 0);
        assert!(!record.is_executed("b"));
        assert_eq!(record.results().len(), 1);

        // once x is recorded as executed, resuming releases b
        let mut record = record;
        record.mark_executed("x");
        let record = scheduler.resume(record, "a", "t").await.unwrap();
        assert!(record.is_executed("b"));
        assert_eq!(agents[2].invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_agent_is_rejected_at_construction() {
        let bus = Arc::new(MessageBus::new());
        let (agents, _) = recorders(&bus, &[("a", 0), ("b", 0), ("c", 0)]);
        let result = WorkflowScheduler::new(diamond(), as_crew(&agents));
        assert!(matches!(result, Err(CrewError::UnknownRole(_))));
    }

    #[tokio::test]
    async fn failing_report_still_counts_as_executed() {
        struct FailingAgent {
            runtime: Arc<AgentRuntime>,
        }

        #[async_trait]
        impl CrewAgent for FailingAgent {
            fn runtime(&self) -> &AgentRuntime {
                &self.runtime
            }
            async fn process_task(&self, _task: &str) -> Result<TaskReport> {
                Ok(TaskReport::wrap(
                    self.role(),
                    AgentOutcome::failure("backend down", None),
                ))
            }
        }

        let bus = Arc::new(MessageBus::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::new(FailingAgent {
            runtime: AgentRuntime::new(
                AgentDescriptor::new("a", "recorder", "a"),
                "recorder",
                bus.clone(),
                Arc::new(NullBackend),
            ),
        });
        let second = RecordingAgent::new("b", &bus, order, 0);
        let graph = WorkflowGraph::with_nodes([
            WorkflowNode::new("a", &["b"], &[]),
            WorkflowNode::new("b", &[], &["a"]),
        ]);
        let scheduler = WorkflowScheduler::new(
            graph,
            vec![first as Arc<dyn CrewAgent>, second as Arc<dyn CrewAgent>],
        )
        .unwrap();

        let record = scheduler.run("a", "t").await.unwrap();
        // a failed but was executed; the walk still reaches b
        assert_eq!(record.results()["a"].status, ReportStatus::Error);
        assert!(record.is_executed("b"));
    }
}
