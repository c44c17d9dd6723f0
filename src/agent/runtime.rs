//! Per-role request lifecycle: submit, backend call, classification, publish.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::bus::{Envelope, MessageBus, Subscriber};
use crate::error::Result;
use crate::llm::{ChatMessage, LlmBackend, ToolSchema};

use super::outcome::{AgentOutcome, classify_response};
use super::AgentDescriptor;

/// One agent's runtime state. The conversation history is owned exclusively
/// by this runtime; the side context is fed by bus messages on the agent's
/// role topic.
pub struct AgentRuntime {
    descriptor: AgentDescriptor,
    system_prompt: String,
    bus: Arc<MessageBus>,
    backend: Arc<dyn LlmBackend>,
    history: Mutex<Vec<ChatMessage>>,
    context: RwLock<Map<String, Value>>,
}

impl AgentRuntime {
    /// Build the runtime and subscribe it to its own role topic.
    pub fn new(
        descriptor: AgentDescriptor,
        system_prompt: impl Into<String>,
        bus: Arc<MessageBus>,
        backend: Arc<dyn LlmBackend>,
    ) -> Arc<Self> {
        let runtime = Arc::new(Self {
            descriptor,
            system_prompt: system_prompt.into(),
            bus,
            backend,
            history: Mutex::new(Vec::new()),
            context: RwLock::new(Map::new()),
        });
        runtime
            .bus
            .subscribe(runtime.descriptor.role.clone(), runtime.clone());
        runtime
    }

    pub fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    pub fn role(&self) -> &str {
        &self.descriptor.role
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    /// Run one full request lifecycle and return the classified outcome.
    ///
    /// Backend transport failures are captured as `Failure` outcomes, never
    /// propagated; the only error path out of here is bus delivery.
    pub async fn submit(
        &self,
        task: &str,
        tools: &[ToolSchema],
        forced: Option<&str>,
    ) -> Result<AgentOutcome> {
        self.push(ChatMessage::user(task, "user"));

        let snapshot = self.messages();
        debug!(role = %self.role(), tools = tools.len(), ?forced, "Submitting to backend");
        let outcome = match self
            .backend
            .tool_call(&self.system_prompt, &snapshot, tools, forced)
            .await
        {
            Ok(response) => classify_response(&response, tools),
            Err(e) => {
                warn!(role = %self.role(), error = %e, "Backend call failed");
                AgentOutcome::failure("Backend call failed", Some(e.to_string()))
            }
        };

        // The tagged outcome goes into history as JSON so later stages can
        // inspect structured fields instead of re-parsing a Debug rendering.
        let rendered = serde_json::to_string(&outcome)?;
        self.push(ChatMessage::assistant(rendered, self.role()));

        self.publish_outcome(&outcome).await?;
        Ok(outcome)
    }

    async fn publish_outcome(&self, outcome: &AgentOutcome) -> Result<Envelope> {
        let topic = format!("{}_result", self.role());
        self.bus
            .publish(topic, serde_json::to_value(outcome)?, Some(self.role()))
            .await
    }

    fn push(&self, message: ChatMessage) {
        self.history.lock().push(message);
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.history.lock().clone()
    }

    pub fn clear_messages(&self) {
        self.history.lock().clear();
    }

    pub fn context_snapshot(&self) -> Map<String, Value> {
        self.context.read().clone()
    }
}

#[async_trait]
impl Subscriber for AgentRuntime {
    /// Merge the envelope content into the side context. Object payloads
    /// merge key-by-key; anything else lands under a `"content"` key.
    async fn on_message(&self, envelope: &Envelope) -> Result<()> {
        debug!(role = %self.role(), topic = %envelope.topic, "Context update received");
        let mut context = self.context.write();
        match &envelope.content {
            Value::Object(fields) => {
                for (key, value) in fields {
                    context.insert(key.clone(), value.clone());
                }
            }
            other => {
                context.insert("content".to_string(), other.clone());
            }
        }
        Ok(())
    }
}
