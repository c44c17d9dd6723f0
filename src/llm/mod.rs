//! Language-model backend contract.
//!
//! The core never talks to a provider directly; it depends on [`LlmBackend`]
//! and receives a concrete client ([`DeepSeekBackend`] or a test double) at
//! construction time.

mod deepseek;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub use deepseek::DeepSeekBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry of an agent's conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub sender: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            sender: sender.into(),
        }
    }

    pub fn assistant(content: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            sender: sender.into(),
        }
    }
}

/// Named, typed capability offered to the backend.
///
/// `parameters` is a JSON-schema object; the `required` list drives the
/// content-JSON matching during response classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSchema {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Build the parameter schema from a type deriving `schemars::JsonSchema`.
    pub fn from_type<T: schemars::JsonSchema>(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let schema = schemars::schema_for!(T);
        let parameters = serde_json::to_value(schema).unwrap_or_default();
        Self::new(name, description, parameters)
    }

    pub fn required_fields(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|fields| fields.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Explicit tool invocation in a backend response. Arguments are left as the
/// raw JSON string the provider produced; parsing happens at classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: String,
}

/// Raw backend response, before classification into an outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendResponse {
    pub tool_call: Option<ToolInvocation>,
    pub content: Option<String>,
    pub error: Option<String>,
}

/// The two capabilities the orchestration core requires of a model provider.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Free-form continuation. Implementations strip a wrapping fenced code
    /// block before returning.
    async fn generate(&self, system_prompt: &str, history: &[ChatMessage]) -> Result<String>;

    /// Tool-assisted completion. `forced` names one schema the backend must
    /// invoke.
    async fn tool_call(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        tools: &[ToolSchema],
        forced: Option<&str>,
    ) -> Result<BackendResponse>;
}

/// Strip a wrapping markdown code fence (with optional `json` tag) from a
/// model response. Returns the input unchanged when it is not fenced.
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") || !trimmed.ends_with("```") || trimmed.len() < 6 {
        return trimmed;
    }
    let Some(body_start) = trimmed.find('\n') else {
        return trimmed;
    };
    let inner = trimmed[body_start + 1..trimmed.len() - 3].trim();
    inner.strip_prefix("json").map(str::trim).unwrap_or(inner)
}
