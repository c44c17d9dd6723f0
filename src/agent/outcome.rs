//! Classification of backend responses into tagged outcomes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::{BackendResponse, ToolSchema};

/// Where a classified outcome was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeSource {
    ToolCall,
    ContentJson,
    ContentJsonUnmatched,
    ContentDirectJson,
    ContentText,
}

/// Exactly one outcome per agent invocation; returned to the caller and
/// published on `"<role>_result"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentOutcome {
    ToolCall {
        name: String,
        arguments: Value,
        source: OutcomeSource,
    },
    ParsedContent {
        data: Value,
        matched_tool: Option<String>,
        source: OutcomeSource,
    },
    RawText {
        text: String,
        source: OutcomeSource,
    },
    Failure {
        message: String,
        detail: Option<String>,
    },
}

impl AgentOutcome {
    pub fn failure(message: impl Into<String>, detail: Option<String>) -> Self {
        Self::Failure {
            message: message.into(),
            detail,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    pub fn source(&self) -> Option<OutcomeSource> {
        match self {
            Self::ToolCall { source, .. }
            | Self::ParsedContent { source, .. }
            | Self::RawText { source, .. } => Some(*source),
            Self::Failure { .. } => None,
        }
    }
}

/// Classify a backend response, in order of precedence: explicit tool
/// invocation, fenced JSON matched against tool required-fields, whole
/// content as JSON, free text. Malformed intermediate forms degrade to the
/// next rule rather than failing the invocation; only malformed tool-call
/// arguments and backend-reported errors produce a `Failure`.
pub fn classify_response(response: &BackendResponse, tools: &[ToolSchema]) -> AgentOutcome {
    if let Some(error) = &response.error {
        return AgentOutcome::failure(error.clone(), None);
    }

    if let Some(call) = &response.tool_call {
        return match serde_json::from_str::<Value>(&call.arguments) {
            Ok(arguments) => AgentOutcome::ToolCall {
                name: call.name.clone(),
                arguments,
                source: OutcomeSource::ToolCall,
            },
            Err(e) => AgentOutcome::failure(
                format!("Malformed arguments for tool '{}'", call.name),
                Some(e.to_string()),
            ),
        };
    }

    let Some(content) = response.content.as_deref().filter(|c| !c.trim().is_empty()) else {
        return AgentOutcome::failure("Backend returned neither a tool call nor content", None);
    };

    if let Some(block) = extract_fenced_json(content)
        && let Ok(data) = serde_json::from_str::<Value>(block)
    {
        // An empty required set is trivially satisfied, so a tool with no
        // required fields matches any fenced JSON object.
        let matched = tools.iter().find(|tool| {
            tool.required_fields()
                .iter()
                .all(|key| data.get(key).is_some())
        });
        return match matched {
            Some(tool) => AgentOutcome::ParsedContent {
                data,
                matched_tool: Some(tool.name.clone()),
                source: OutcomeSource::ContentJson,
            },
            None => AgentOutcome::ParsedContent {
                data,
                matched_tool: None,
                source: OutcomeSource::ContentJsonUnmatched,
            },
        };
    }

    if let Ok(data) = serde_json::from_str::<Value>(content) {
        return AgentOutcome::ParsedContent {
            data,
            matched_tool: None,
            source: OutcomeSource::ContentDirectJson,
        };
    }

    AgentOutcome::RawText {
        text: content.to_string(),
        source: OutcomeSource::ContentText,
    }
}

fn extract_fenced_json(content: &str) -> Option<&str> {
    let start = content.find("```json")? + "```json".len();
    let rest = &content[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::llm::ToolInvocation;

    use super::*;

    fn plan_tool() -> ToolSchema {
        ToolSchema::new(
            "create_plan",
            "create an execution plan",
            json!({
                "type": "object",
                "properties": {
                    "plan": {"type": "array"},
                    "reasoning": {"type": "string"}
                },
                "required": ["plan", "reasoning"]
            }),
        )
    }

    #[test]
    fn explicit_tool_call_wins_over_content_json() {
        let response = BackendResponse {
            tool_call: Some(ToolInvocation {
                name: "create_plan".into(),
                arguments: r#"{"plan": [], "reasoning": "direct"}"#.into(),
            }),
            content: Some("```json\n{\"plan\": [], \"reasoning\": \"fenced\"}\n```".into()),
            error: None,
        };

        match classify_response(&response, &[plan_tool()]) {
            AgentOutcome::ToolCall { name, arguments, source } => {
                assert_eq!(name, "create_plan");
                assert_eq!(arguments["reasoning"], "direct");
                assert_eq!(source, OutcomeSource::ToolCall);
            }
            other => panic!("Expected ToolCall, got {other:?}"),
        }
    }

    #[test]
    fn malformed_tool_arguments_is_failure() {
        let response = BackendResponse {
            tool_call: Some(ToolInvocation {
                name: "create_plan".into(),
                arguments: "{not json".into(),
            }),
            content: None,
            error: None,
        };
        assert!(classify_response(&response, &[plan_tool()]).is_failure());
    }

    #[test]
    fn fenced_json_matching_required_fields_tags_the_tool() {
        let response = BackendResponse {
            content: Some(
                "Here is the plan:\n```json\n{\"plan\": [1], \"reasoning\": \"ok\"}\n```".into(),
            ),
            ..Default::default()
        };

        match classify_response(&response, &[plan_tool()]) {
            AgentOutcome::ParsedContent { matched_tool, source, .. } => {
                assert_eq!(matched_tool.as_deref(), Some("create_plan"));
                assert_eq!(source, OutcomeSource::ContentJson);
            }
            other => panic!("Expected ParsedContent, got {other:?}"),
        }
    }

    #[test]
    fn tool_without_required_fields_matches_any_fenced_json() {
        let free_tool = ToolSchema::new(
            "record_notes",
            "record free-form notes",
            json!({"type": "object", "properties": {}}),
        );
        let response = BackendResponse {
            content: Some("```json\n{\"unrelated\": true}\n```".into()),
            ..Default::default()
        };

        match classify_response(&response, &[plan_tool(), free_tool]) {
            AgentOutcome::ParsedContent { matched_tool, source, .. } => {
                assert_eq!(matched_tool.as_deref(), Some("record_notes"));
                assert_eq!(source, OutcomeSource::ContentJson);
            }
            other => panic!("Expected ParsedContent, got {other:?}"),
        }
    }

    #[test]
    fn fenced_json_without_tool_match_is_unmatched() {
        let response = BackendResponse {
            content: Some("```json\n{\"unrelated\": true}\n```".into()),
            ..Default::default()
        };

        match classify_response(&response, &[plan_tool()]) {
            AgentOutcome::ParsedContent { matched_tool, source, .. } => {
                assert!(matched_tool.is_none());
                assert_eq!(source, OutcomeSource::ContentJsonUnmatched);
            }
            other => panic!("Expected ParsedContent, got {other:?}"),
        }
    }

    #[test]
    fn whole_content_json_is_direct() {
        let response = BackendResponse {
            content: Some(r#"{"answer": 42}"#.into()),
            ..Default::default()
        };

        match classify_response(&response, &[]) {
            AgentOutcome::ParsedContent { data, source, matched_tool } => {
                assert_eq!(data["answer"], 42);
                assert_eq!(source, OutcomeSource::ContentDirectJson);
                assert!(matched_tool.is_none());
            }
            other => panic!("Expected ParsedContent, got {other:?}"),
        }
    }

    #[test]
    fn free_text_falls_back_to_raw() {
        let response = BackendResponse {
            content: Some("I could not produce a structured plan.".into()),
            ..Default::default()
        };

        match classify_response(&response, &[plan_tool()]) {
            AgentOutcome::RawText { text, source } => {
                assert_eq!(source, OutcomeSource::ContentText);
                assert!(text.contains("structured plan"));
            }
            other => panic!("Expected RawText, got {other:?}"),
        }
    }

    #[test]
    fn malformed_fenced_block_degrades_to_raw_text() {
        let response = BackendResponse {
            content: Some("```json\n{broken\n```".into()),
            ..Default::default()
        };
        assert!(matches!(
            classify_response(&response, &[plan_tool()]),
            AgentOutcome::RawText {
                source: OutcomeSource::ContentText,
                ..
            }
        ));
    }

    #[test]
    fn backend_error_indicator_is_failure() {
        let response = BackendResponse {
            error: Some("upstream 500".into()),
            ..Default::default()
        };
        assert!(classify_response(&response, &[]).is_failure());
    }

    #[test]
    fn empty_response_is_failure() {
        assert!(classify_response(&BackendResponse::default(), &[]).is_failure());
    }
}
