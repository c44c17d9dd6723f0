//! Static workflow graph: roles connected by `next`/`wait_for` edges.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{CrewError, Result};

/// One node of the workflow DAG. `wait_for` edges are the reverse of `next`
/// edges; [`WorkflowGraph::validate`] enforces the mutual consistency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub role: String,
    pub next: Vec<String>,
    pub wait_for: Vec<String>,
}

impl WorkflowNode {
    pub fn new(role: impl Into<String>, next: &[&str], wait_for: &[&str]) -> Self {
        Self {
            role: role.into(),
            next: next.iter().map(|s| s.to_string()).collect(),
            wait_for: wait_for.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Immutable-per-run DAG of roles, keyed by role.
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    nodes: HashMap<String, WorkflowNode>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(nodes: impl IntoIterator<Item = WorkflowNode>) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            graph.insert(node);
        }
        graph
    }

    pub fn insert(&mut self, node: WorkflowNode) {
        self.nodes.insert(node.role.clone(), node);
    }

    pub fn node(&self, role: &str) -> Option<&WorkflowNode> {
        self.nodes.get(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check edge targets exist, `next`/`wait_for` mirror each other, and the
    /// graph is acyclic.
    pub fn validate(&self) -> Result<()> {
        for node in self.nodes.values() {
            for next in &node.next {
                let target = self.nodes.get(next).ok_or_else(|| {
                    CrewError::Workflow(format!(
                        "Role '{}' lists unknown successor '{next}'",
                        node.role
                    ))
                })?;
                if !target.wait_for.contains(&node.role) {
                    return Err(CrewError::Workflow(format!(
                        "Edge mismatch: '{}' -> '{next}' has no matching wait_for",
                        node.role
                    )));
                }
            }
            for dep in &node.wait_for {
                let source = self.nodes.get(dep).ok_or_else(|| {
                    CrewError::Workflow(format!(
                        "Role '{}' waits for unknown role '{dep}'",
                        node.role
                    ))
                })?;
                if !source.next.contains(&node.role) {
                    return Err(CrewError::Workflow(format!(
                        "Edge mismatch: '{}' waits for '{dep}' but is not its successor",
                        node.role
                    )));
                }
            }
        }

        // Kahn pass over the whole graph; leftovers mean a cycle.
        let mut indegree: HashMap<&str, usize> = self
            .nodes
            .values()
            .map(|n| (n.role.as_str(), n.wait_for.len()))
            .collect();
        let mut queue: VecDeque<&str> = indegree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(role, _)| *role)
            .collect();
        let mut processed = 0;
        while let Some(role) = queue.pop_front() {
            processed += 1;
            for next in &self.nodes[role].next {
                let deg = indegree
                    .get_mut(next.as_str())
                    .ok_or_else(|| CrewError::UnknownRole(next.clone()))?;
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(next);
                }
            }
        }
        if processed != self.nodes.len() {
            return Err(CrewError::Workflow(
                "Workflow graph contains a cycle".into(),
            ));
        }
        Ok(())
    }

    /// Roles reachable from `root` via `next` edges, `root` included.
    pub fn reachable_from(&self, root: &str) -> Result<HashSet<String>> {
        if !self.nodes.contains_key(root) {
            return Err(CrewError::UnknownRole(root.to_string()));
        }
        let mut reachable = HashSet::new();
        let mut queue = VecDeque::from([root.to_string()]);
        while let Some(role) = queue.pop_front() {
            if reachable.insert(role.clone())
                && let Some(node) = self.nodes.get(&role)
            {
                for next in &node.next {
                    queue.push_back(next.clone());
                }
            }
        }
        Ok(reachable)
    }
}
