//! DeepSeek chat-completions client (OpenAI-compatible wire format).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{CrewError, Result};

use super::{
    BackendResponse, ChatMessage, ChatRole, LlmBackend, ToolInvocation, ToolSchema,
    strip_code_fence,
};

const REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct DeepSeekBackend {
    client: reqwest::Client,
    config: LlmConfig,
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f64,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl DeepSeekBackend {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let auth = header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| CrewError::Config(format!("Invalid API key: {e}")))?;
        headers.insert(header::AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }

    fn wire_messages(system_prompt: &str, history: &[ChatMessage]) -> Vec<WireMessage> {
        let mut messages = vec![WireMessage {
            role: "system",
            content: system_prompt.to_string(),
        }];
        messages.extend(history.iter().map(|m| WireMessage {
            role: match m.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            },
            content: m.content.clone(),
        }));
        messages
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<ResponseMessage> {
        debug!(model = %request.model, messages = request.messages.len(), "Calling chat completions");
        let response = self.client.post(self.endpoint()).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            warn!(%status, %detail, "Completion request rejected");
            return Err(CrewError::Backend(detail));
        }

        let mut completion: CompletionResponse = response.json().await?;
        if completion.choices.is_empty() {
            return Err(CrewError::Backend("Response contained no choices".into()));
        }
        Ok(completion.choices.remove(0).message)
    }
}

#[async_trait]
impl LlmBackend for DeepSeekBackend {
    async fn generate(&self, system_prompt: &str, history: &[ChatMessage]) -> Result<String> {
        // Callers parse the result as JSON; the model is told not to fence
        // it, and any fence that slips through is stripped below.
        let system = format!(
            "{system_prompt}\nIMPORTANT: Respond with a JSON object directly, do not wrap it in markdown code blocks."
        );
        let request = CompletionRequest {
            model: self.config.model.clone(),
            messages: Self::wire_messages(&system, history),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            tools: None,
            tool_choice: None,
        };

        let message = self.complete(&request).await?;
        let content = message
            .content
            .ok_or_else(|| CrewError::Backend("Response contained no content".into()))?;
        Ok(strip_code_fence(&content).to_string())
    }

    async fn tool_call(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        tools: &[ToolSchema],
        forced: Option<&str>,
    ) -> Result<BackendResponse> {
        let request = CompletionRequest {
            model: self.config.model.clone(),
            messages: Self::wire_messages(system_prompt, history),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            tools: Some(
                tools
                    .iter()
                    .map(|t| WireTool {
                        tool_type: "function",
                        function: WireFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.parameters.clone(),
                        },
                    })
                    .collect(),
            ),
            tool_choice: forced
                .map(|name| json!({"type": "function", "function": {"name": name}})),
        };

        let message = self.complete(&request).await?;
        let tool_call = message
            .tool_calls
            .and_then(|mut calls| {
                if calls.is_empty() {
                    None
                } else {
                    Some(calls.remove(0))
                }
            })
            .map(|call| ToolInvocation {
                name: call.function.name,
                arguments: call.function.arguments,
            });

        Ok(BackendResponse {
            tool_call,
            content: message.content,
            error: None,
        })
    }
}
