//! Agent runtime and response classification.
//!
//! Provides the per-role request lifecycle (`AgentRuntime`) and the tagged
//! outcome model every invocation resolves to (`AgentOutcome`).

mod outcome;
mod runtime;

use serde::{Deserialize, Serialize};

pub use outcome::{AgentOutcome, OutcomeSource, classify_response};
pub use runtime::AgentRuntime;

/// Identity of one agent. The role is the unique key used for bus topics,
/// workflow graph nodes, and result maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub description: String,
    pub role: String,
}

impl AgentDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            role: role.into(),
        }
    }
}
