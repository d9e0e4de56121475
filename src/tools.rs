//! The `extract_entities` tool shared by every transport.

use serde::Serialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::{
    error::GlineError,
    model::{ExtractRequest, ModelRegistry},
};

pub const EXTRACT_ENTITIES: &str = "extract_entities";

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        name: EXTRACT_ENTITIES,
        description: "Extract named entities from text using a GLiNER model.",
        input_schema: json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text to extract entities from"
                },
                "labels": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Entity labels to look for, e.g. [\"person\", \"organization\"]"
                }
            },
            "required": ["text", "labels"]
        }),
    }]
}

/// Result of one tool call. Failures are reported in-band, flagged with
/// `is_error`, so the serving loop keeps running.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub is_error: bool,
    pub text: String,
}

impl ToolOutcome {
    fn ok(text: String) -> Self {
        Self {
            is_error: false,
            text,
        }
    }

    fn error(text: String) -> Self {
        warn!(%text, "tool call failed");
        Self {
            is_error: true,
            text,
        }
    }

    /// MCP `tools/call` result body.
    pub fn into_call_result(self) -> Value {
        json!({
            "content": [{ "type": "text", "text": self.text }],
            "isError": self.is_error,
        })
    }
}

pub async fn extract_entities(registry: &ModelRegistry, arguments: Value) -> ToolOutcome {
    let request: ExtractRequest = match serde_json::from_value(arguments) {
        Ok(request) => request,
        Err(e) => return ToolOutcome::error(format!("Invalid arguments: {e}")),
    };

    let entities = match registry.extract_entities(request).await {
        Ok(entities) => entities,
        Err(e @ (GlineError::BadRequest(_) | GlineError::Validation(_))) => {
            return ToolOutcome::error(format!("Invalid arguments: {e}"));
        }
        Err(e) => return ToolOutcome::error(format!("Inference error: {e}")),
    };

    match serde_json::to_string(&entities) {
        Ok(text) => ToolOutcome::ok(text),
        Err(e) => ToolOutcome::error(format!("Serialization error: {e}")),
    }
}
